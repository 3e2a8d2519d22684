use std::ops::Range;

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use crate::error::Error;
use crate::materialize::materialize;
use crate::parser::{
    self,
    ast::{Module, Statement, Target},
};
use crate::value::{Key, Value};

/// A top-level `NAME = literal` or `NAME['key'] = literal` binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target_name: String,
    pub subscript_key: Option<String>,
    pub value: Value,
    pub line: usize,
    /// Byte range of the right-hand side in the source.
    pub value_span: Range<usize>,
    /// The right-hand side also feeds other targets (`A = B = 1`).
    pub chained: bool,
}

/// Every indexable assignment of a module, in source order.
#[derive(Debug, Clone, Default)]
pub struct AssignmentIndex {
    entries: Vec<Assignment>,
}

impl AssignmentIndex {
    pub fn build(module: &Module) -> Self {
        let mut entries = Vec::new();
        for stmt in &module.statements {
            let Statement::Assign(assign) = stmt else {
                continue;
            };
            let value = materialize(&assign.value);
            let chained = assign.targets.len() > 1;
            for target in &assign.targets {
                let (target_name, subscript_key) = match target {
                    Target::Name(name) => (name.clone(), None),
                    Target::Subscript { name, key } => (name.clone(), Some(key.clone())),
                    Target::Other(text) => {
                        debug!("line {}: skipping target {text}", assign.line);
                        continue;
                    }
                };
                entries.push(Assignment {
                    target_name,
                    subscript_key,
                    value: value.clone(),
                    line: assign.line,
                    value_span: assign.value_span.clone(),
                    chained,
                });
            }
        }
        debug!("indexed {} assignments", entries.len());
        AssignmentIndex { entries }
    }

    /// Parse `source` and index it in one step.
    pub fn from_source(source: &str) -> Result<Self, Error> {
        let module = parser::parse(source)?;
        Ok(Self::build(&module))
    }

    pub fn entries(&self) -> &[Assignment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_name<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Assignment> + 'n
    where
        'a: 'n,
    {
        self.entries.iter().filter(move |a| a.target_name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.for_name(name).next().is_some()
    }

    /// The last `NAME = ...` assignment.
    pub fn last_plain(&self, name: &str) -> Option<&Assignment> {
        self.for_name(name).filter(|a| a.subscript_key.is_none()).last()
    }

    /// The last `NAME['key'] = ...` assignment.
    pub fn last_subscript(&self, name: &str, key: &str) -> Option<&Assignment> {
        self.for_name(name)
            .filter(|a| a.subscript_key.as_deref() == Some(key))
            .last()
    }

    /// The value `name` holds after all of its assignments ran in order.
    ///
    /// A plain assignment replaces the value; `NAME['k'] = v` inserts into
    /// the current dict, or starts a new `{k: v}` when there is none.
    pub fn effective_value(&self, name: &str) -> Option<Value> {
        let mut current: Option<Value> = None;
        for a in self.for_name(name) {
            match &a.subscript_key {
                None => current = Some(a.value.clone()),
                Some(key) => {
                    if let Some(Value::Dict(map)) = &mut current {
                        map.insert(Key::from(key.as_str()), a.value.clone());
                    } else {
                        debug!("line {}: {name}['{key}'] starts a new dict", a.line);
                        current = Some(Value::Dict(IndexMap::from([(
                            Key::from(key.as_str()),
                            a.value.clone(),
                        )])));
                    }
                }
            }
        }
        current
    }

    /// A JSON-friendly view of the index.
    pub fn listing(&self) -> Vec<ListingEntry> {
        self.entries
            .iter()
            .map(|a| {
                let unsupported = a.value.find_unsupported().is_some();
                ListingEntry {
                    name: a.target_name.clone(),
                    subscript_key: a.subscript_key.clone(),
                    line: a.line,
                    value: if unsupported { None } else { Some(a.value.clone()) },
                    unsupported: unsupported.then(|| a.value.repr()),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingEntry {
    pub name: String,
    pub subscript_key: Option<String>,
    pub line: usize,
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsupported: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Number;

    fn index(src: &str) -> AssignmentIndex {
        AssignmentIndex::from_source(src).unwrap()
    }

    fn int(i: i64) -> Value {
        Value::Number(Number::Int(i))
    }

    #[test]
    fn collects_in_source_order() {
        let idx = index("A = 1\nimport os\nB = 'x'\nA = 2\n");
        let names: Vec<_> = idx.entries().iter().map(|a| a.target_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "A"]);
        assert_eq!(idx.entries()[2].line, 4);
    }

    #[test]
    fn keeps_every_assignment_to_a_name() {
        let idx = index("A = 1\nA = 2\n");
        assert_eq!(idx.for_name("A").count(), 2);
        assert_eq!(idx.last_plain("A").unwrap().value, int(2));
        assert_eq!(idx.effective_value("A"), Some(int(2)));
    }

    #[test]
    fn chained_targets_share_value() {
        let idx = index("A = B = [1]\n");
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.effective_value("B"), Some(Value::List(vec![int(1)])));
    }

    #[test]
    fn last_lookups_outlive_the_name() {
        let idx = index("A = 1\nA['k'] = 2\nA = 3\n");
        let found = {
            let name = String::from("A");
            (idx.last_plain(&name), idx.last_subscript(&name, "k"))
        };
        assert_eq!(found.0.map(|a| a.line), Some(3));
        assert_eq!(found.1.map(|a| a.line), Some(2));
    }

    #[test]
    fn chained_targets_are_flagged() {
        let idx = index("A = B = 1\nC = 2\n");
        assert!(idx.entries()[0].chained && idx.entries()[1].chained);
        assert!(!idx.entries()[2].chained);
    }

    #[test]
    fn ignores_unindexable_targets() {
        let idx = index("a.b = 1\nc[0] = 2\nd, e = 3, 4\n");
        assert!(idx.is_empty());
    }

    #[test]
    fn subscript_assignment_merges_into_dict() {
        let idx = index("DB = {'a': 1}\nDB['b'] = 2\nDB['a'] = 3\n");
        let v = idx.effective_value("DB").unwrap();
        let map = v.as_dict().unwrap();
        assert_eq!(map[&Key::from("a")], int(3));
        assert_eq!(map[&Key::from("b")], int(2));
        assert_eq!(idx.last_subscript("DB", "a").unwrap().line, 3);
    }

    #[test]
    fn subscript_without_dict_is_wrapped() {
        let idx = index("DB = dict()\nDB['default'] = {'NAME': 'x'}\n");
        let v = idx.effective_value("DB").unwrap();
        let map = v.as_dict().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&Key::from("default")));
    }

    #[test]
    fn plain_assignment_resets_merged_keys() {
        let idx = index("DB = {}\nDB['a'] = 1\nDB = {'b': 2}\n");
        let v = idx.effective_value("DB").unwrap();
        assert!(!v.as_dict().unwrap().contains_key(&Key::from("a")));
    }

    #[test]
    fn missing_name() {
        let idx = index("A = 1\n");
        assert!(!idx.contains("B"));
        assert_eq!(idx.effective_value("B"), None);
    }

    #[test]
    fn listing_marks_unsupported() {
        let idx = index("A = 1\nB = {'x': os.getcwd()}\nC['k'] = None\n");
        let json = serde_json::to_value(idx.listing()).unwrap();
        assert_eq!(json[0]["name"], "A");
        assert_eq!(json[0]["value"], 1);
        assert!(json[0].get("unsupported").is_none());
        assert!(json[1]["value"].is_null());
        assert_eq!(json[1]["unsupported"], "{'x': os.getcwd()}");
        assert_eq!(json[2]["subscript_key"], "k");
    }
}
