pub mod ast;
pub mod lexer;

use log::debug;

use crate::error::Error;

use self::ast::{Assign, Expr, Module, Statement, Target};
use self::lexer::{syntax, Lexer, Pos, Spanned, StrKind, Token};

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const COMPOUND: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "def", "class",
    "async", "match", "case",
];

/// Parse a whole source file into its top-level statements.
pub fn parse(source: &str) -> Result<Module, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(source).parse_module(&tokens)
}

/// Parse a single standalone expression, e.g. a literal given on the command line.
pub fn parse_expression(source: &str) -> Result<Expr, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let lines: Vec<&[Spanned]> = logical_lines(&tokens).collect();
    match lines.as_slice() {
        [] => Err(syntax(Pos { line: 1, column: 1 }, "expected an expression")),
        [line] => {
            let line = match simple_statements(line)?.as_slice() {
                [single] => *single,
                [_, second, ..] => {
                    return Err(syntax(second[0].pos, "expected a single expression"))
                }
                [] => return Err(syntax(line[0].pos, "expected an expression")),
            };
            if let Some(&at) = assign_positions(line).first() {
                return Err(syntax(line[at].pos, "expected an expression, found '='"));
            }
            ExprParser::new(source, line).parse_rhs()
        }
        [_, second, ..] => Err(syntax(second[0].pos, "expected a single expression")),
    }
}

fn logical_lines(tokens: &[Spanned]) -> impl Iterator<Item = &[Spanned]> {
    tokens
        .split(|t| t.token == Token::Newline)
        .filter(|line| line.first().is_some_and(|t| t.token != Token::Eof))
}

/// Split a logical line into its `;`-separated simple statements. A single
/// trailing `;` is allowed.
fn simple_statements(line: &[Spanned]) -> Result<Vec<&[Spanned]>, Error> {
    let mut depth = 0usize;
    let mut statements = Vec::new();
    let mut from = 0;
    for (i, tok) in line.iter().enumerate() {
        match &tok.token {
            Token::Op("(" | "[" | "{") => depth += 1,
            Token::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
            Token::Op(";") if depth == 0 => {
                if i == from {
                    return Err(syntax(tok.pos, "invalid syntax"));
                }
                statements.push(&line[from..i]);
                from = i + 1;
            }
            _ => {}
        }
    }
    if from < line.len() {
        statements.push(&line[from..]);
    }
    Ok(statements)
}

/// Indices of the `=` tokens separating targets from the value.
fn assign_positions(line: &[Spanned]) -> Vec<usize> {
    let mut depth = 0usize;
    let mut positions = Vec::new();
    for (i, tok) in line.iter().enumerate() {
        match &tok.token {
            Token::Op("(" | "[" | "{") => depth += 1,
            Token::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
            Token::Op("=") if depth == 0 => positions.push(i),
            Token::Name(n) if depth == 0 && n == "lambda" => break,
            _ => {}
        }
    }
    positions
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub struct Parser<'a> {
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser { source }
    }

    pub fn parse_module(&self, tokens: &[Spanned]) -> Result<Module, Error> {
        let mut statements = Vec::new();
        let mut pending_block: Option<Pos> = None;
        let mut in_block = false;

        for line in logical_lines(tokens) {
            let first = &line[0];
            if first.pos.column > 1 {
                if pending_block.take().is_some() || in_block {
                    in_block = true;
                    continue;
                }
                return Err(syntax(first.pos, "unexpected indent"));
            }
            if let Some(header) = pending_block {
                return Err(expected_block(header));
            }
            in_block = false;
            if opens_block(line) {
                pending_block = Some(first.pos);
            }
            if starts_compound(line) {
                statements.push(Statement::Other {
                    line: first.pos.line,
                });
                continue;
            }
            for simple in simple_statements(line)? {
                statements.push(self.parse_statement(simple)?);
            }
        }

        if let Some(header) = pending_block {
            return Err(expected_block(header));
        }
        Ok(Module { statements })
    }

    fn parse_statement(&self, line: &[Spanned]) -> Result<Statement, Error> {
        let first = &line[0];
        let other = Statement::Other {
            line: first.pos.line,
        };
        match &first.token {
            Token::Name(word) if is_keyword(word) => return Ok(other),
            Token::Op("@") => return Ok(other),
            _ => {}
        }

        let splits = assign_positions(line);
        if splits.is_empty() {
            return Ok(other);
        }

        let mut segments = Vec::with_capacity(splits.len() + 1);
        let mut from = 0;
        for at in splits.iter().copied().chain(std::iter::once(line.len())) {
            let segment = &line[from..at];
            if segment.is_empty() {
                let pos = line.get(at).or(line.last()).map_or(first.pos, |t| t.pos);
                return Err(syntax(pos, "invalid syntax"));
            }
            segments.push(segment);
            from = at + 1;
        }

        let Some((value_tokens, target_segments)) = segments.split_last() else {
            return Ok(other);
        };
        let targets = target_segments
            .iter()
            .map(|seg| self.classify_target(seg))
            .collect();
        let value = ExprParser::new(self.source, value_tokens).parse_rhs()?;
        let value_span = value_tokens[0].start..value_tokens[value_tokens.len() - 1].end;

        Ok(Statement::Assign(Assign {
            targets,
            value,
            line: first.pos.line,
            value_span,
        }))
    }

    fn classify_target(&self, seg: &[Spanned]) -> Target {
        match seg {
            [only] => match &only.token {
                Token::Name(name) if !is_keyword(name) => return Target::Name(name.clone()),
                _ => {}
            },
            [base, open, key, close] => match (&base.token, &open.token, &key.token, &close.token) {
                (
                    Token::Name(name),
                    Token::Op("["),
                    Token::Str {
                        value,
                        kind: StrKind::Text,
                    },
                    Token::Op("]"),
                ) if !is_keyword(name) => {
                    return Target::Subscript {
                        name: name.clone(),
                        key: value.clone(),
                    }
                }
                _ => {}
            },
            _ => {}
        }
        let text = span_text(self.source, seg);
        debug!("target not indexable: {text}");
        Target::Other(text)
    }
}

fn starts_compound(line: &[Spanned]) -> bool {
    matches!(&line[0].token, Token::Name(w) if COMPOUND.contains(&w.as_str()))
}

fn opens_block(line: &[Spanned]) -> bool {
    starts_compound(line) && matches!(line.last().map(|t| &t.token), Some(Token::Op(":")))
}

fn expected_block(header: Pos) -> Error {
    syntax(
        header,
        format!("expected an indented block after statement on line {}", header.line),
    )
}

fn span_text(source: &str, tokens: &[Spanned]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => source[first.start..last.end].to_string(),
        _ => String::new(),
    }
}

/// Recursive-descent parser for one right-hand side.
///
/// Literal structure is parsed exactly; anything else is skipped up to the
/// next `,` `:` or closing bracket at the same depth and kept as
/// [`Expr::Other`]. Containers that turn out not to be literals (sets,
/// comprehensions, unpacking) collapse to a single `Other`.
struct ExprParser<'a> {
    source: &'a str,
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(source: &'a str, tokens: &'a [Spanned]) -> Self {
        ExprParser {
            source,
            tokens,
            pos: 0,
        }
    }

    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at(&self, op: &str) -> bool {
        matches!(self.current(), Some(Token::Op(o)) if *o == op)
    }

    fn at_terminator(&self) -> bool {
        matches!(
            self.current(),
            None | Some(Token::Op("," | ":" | ")" | "]" | "}"))
        )
    }

    fn error(&self, message: &str) -> Error {
        let pos = self
            .tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map_or(Pos { line: 1, column: 1 }, |t| t.pos);
        syntax(pos, message)
    }

    fn text(&self, start: usize, end: usize) -> String {
        span_text(self.source, &self.tokens[start..end])
    }

    /// The value side of an assignment: one element, or a bare tuple.
    fn parse_rhs(&mut self) -> Result<Expr, Error> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        while self.current().is_some() {
            items.push(self.parse_element()?);
            trailing_comma = false;
            match self.current() {
                None => break,
                Some(Token::Op(",")) => {
                    self.advance();
                    trailing_comma = true;
                }
                Some(_) => return Err(self.error("invalid syntax")),
            }
        }
        if items.len() == 1 && !trailing_comma {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Tuple(items))
        }
    }

    fn parse_element(&mut self) -> Result<Expr, Error> {
        let start = self.pos;
        if let Some(expr) = self.parse_literal()? {
            if self.at_terminator() {
                return Ok(expr);
            }
        }
        self.pos = start;
        self.skip_expression();
        if self.pos == start {
            return Err(self.error("invalid syntax"));
        }
        Ok(Expr::Other(self.text(start, self.pos)))
    }

    fn parse_literal(&mut self) -> Result<Option<Expr>, Error> {
        match self.current() {
            Some(Token::Str { .. }) => self.parse_strings(),
            Some(Token::Number(_) | Token::Op("-" | "+")) => Ok(self.parse_number()),
            Some(Token::Name(name)) => {
                let expr = match name.as_str() {
                    "True" => Expr::Bool(true),
                    "False" => Expr::Bool(false),
                    "None" => Expr::None,
                    _ => return Ok(None),
                };
                self.advance();
                Ok(Some(expr))
            }
            Some(Token::Op("[")) => {
                self.advance();
                Ok(self.parse_sequence("]")?.map(|(items, _)| Expr::List(items)))
            }
            Some(Token::Op("(")) => {
                self.advance();
                Ok(self.parse_sequence(")")?.map(|(mut items, trailing_comma)| {
                    if items.len() == 1 && !trailing_comma {
                        items.remove(0)
                    } else {
                        Expr::Tuple(items)
                    }
                }))
            }
            Some(Token::Op("{")) => {
                self.advance();
                self.parse_dict()
            }
            _ => Ok(None),
        }
    }

    fn parse_strings(&mut self) -> Result<Option<Expr>, Error> {
        let mut value = String::new();
        let mut bytes: Option<bool> = None;
        let mut formatted = false;
        while let Some(Token::Str { value: part, kind }) = self.current() {
            let is_bytes = *kind == StrKind::Bytes;
            if bytes.is_some_and(|b| b != is_bytes) {
                return Err(self.error("cannot mix bytes and nonbytes literals"));
            }
            bytes = Some(is_bytes);
            formatted |= *kind == StrKind::Format;
            value.push_str(part);
            self.advance();
        }
        if bytes == Some(true) || formatted {
            return Ok(None);
        }
        Ok(Some(Expr::Str(value)))
    }

    fn parse_number(&mut self) -> Option<Expr> {
        let mut negative = false;
        loop {
            match self.current() {
                Some(Token::Op("-")) => negative = !negative,
                Some(Token::Op("+")) => {}
                _ => break,
            }
            self.advance();
        }
        match self.current() {
            Some(Token::Number(text)) if !text.ends_with(['j', 'J']) => {
                self.advance();
                Some(Expr::Number {
                    text: text.clone(),
                    negative,
                })
            }
            _ => None,
        }
    }

    /// Elements up to `close`, which is consumed. `None` when the bracket
    /// does not hold a plain literal sequence.
    fn parse_sequence(&mut self, close: &str) -> Result<Option<(Vec<Expr>, bool)>, Error> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.at(close) {
                self.advance();
                return Ok(Some((items, trailing_comma)));
            }
            if self.at("*") || self.at("**") {
                return Ok(None);
            }
            let start = self.pos;
            items.push(self.parse_element()?);
            if self.is_comprehension(start) {
                return Ok(None);
            }
            trailing_comma = false;
            if self.at(",") {
                self.advance();
                trailing_comma = true;
            } else if !self.at(close) {
                return Ok(None);
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Option<Expr>, Error> {
        let mut entries = Vec::new();
        loop {
            if self.at("}") {
                self.advance();
                return Ok(Some(Expr::Dict(entries)));
            }
            if self.at("**") {
                return Ok(None);
            }
            let start = self.pos;
            let key = self.parse_element()?;
            if !self.at(":") {
                // A set display, or something stranger.
                return Ok(None);
            }
            self.advance();
            let value = self.parse_element()?;
            if self.is_comprehension(start) {
                return Ok(None);
            }
            entries.push((key, value));
            if self.at(",") {
                self.advance();
            } else if !self.at("}") {
                return Ok(None);
            }
        }
    }

    fn is_comprehension(&self, start: usize) -> bool {
        let mut depth = 0usize;
        self.tokens[start..self.pos].iter().any(|t| match &t.token {
            Token::Op("(" | "[" | "{") => {
                depth += 1;
                false
            }
            Token::Op(")" | "]" | "}") => {
                depth = depth.saturating_sub(1);
                false
            }
            Token::Name(n) => depth == 0 && n == "for",
            _ => false,
        })
    }

    fn skip_expression(&mut self) {
        let mut lambdas = 0usize;
        while let Some(tok) = self.current() {
            match tok {
                Token::Op("(" | "[" | "{") => self.skip_group(),
                Token::Name(n) if n == "lambda" => {
                    lambdas += 1;
                    self.advance();
                }
                Token::Op(":") if lambdas > 0 => {
                    lambdas -= 1;
                    self.advance();
                }
                _ if self.at_terminator() => break,
                _ => self.advance(),
            }
        }
    }

    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.current() {
            match tok {
                Token::Op("(" | "[" | "{") => depth += 1,
                Token::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
            if depth == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigns(source: &str) -> Vec<Assign> {
        parse(source)
            .unwrap()
            .statements
            .into_iter()
            .filter_map(|s| match s {
                Statement::Assign(a) => Some(a),
                Statement::Other { .. } => None,
            })
            .collect()
    }

    fn value_of(source: &str) -> Expr {
        assigns(source).remove(0).value
    }

    fn num(text: &str) -> Expr {
        Expr::Number {
            text: text.into(),
            negative: false,
        }
    }

    fn s(text: &str) -> Expr {
        Expr::Str(text.into())
    }

    #[test]
    fn parse_simple_assignment() {
        let a = assigns("DEBUG = False\n");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].targets, vec![Target::Name("DEBUG".into())]);
        assert_eq!(a[0].value, Expr::Bool(false));
        assert_eq!(a[0].line, 1);
    }

    #[test]
    fn parse_nested_tuple() {
        assert_eq!(
            value_of("ADMINS = (('Admin', 'example@example.com'),)\n"),
            Expr::Tuple(vec![Expr::Tuple(vec![s("Admin"), s("example@example.com")])])
        );
    }

    #[test]
    fn parse_grouping_is_not_a_tuple() {
        assert_eq!(value_of("A = (1)"), num("1"));
        assert_eq!(value_of("A = ()"), Expr::Tuple(vec![]));
        assert_eq!(value_of("A = 1, 2"), Expr::Tuple(vec![num("1"), num("2")]));
    }

    #[test]
    fn parse_multiline_dict() {
        let src = "DATABASES = {\n    'default': {\n        'PORT': 5432,\n        'HOST': 'localhost',\n    },\n}\n";
        assert_eq!(
            value_of(src),
            Expr::Dict(vec![(
                s("default"),
                Expr::Dict(vec![(s("PORT"), num("5432")), (s("HOST"), s("localhost"))])
            )])
        );
    }

    #[test]
    fn parse_negative_numbers() {
        assert_eq!(
            value_of("A = [-1, +2, --3]"),
            Expr::List(vec![
                Expr::Number {
                    text: "1".into(),
                    negative: true
                },
                num("2"),
                num("3"),
            ])
        );
    }

    #[test]
    fn parse_implicit_concatenation() {
        assert_eq!(value_of("A = ('abc'\n     'def')"), s("abcdef"));
    }

    #[test]
    fn computed_elements_are_kept_as_other() {
        let v = value_of("A = {'path': os.path.join(BASE_DIR, 'x'), 'n': 60 * 60, 'ok': 1}");
        assert_eq!(
            v,
            Expr::Dict(vec![
                (s("path"), Expr::Other("os.path.join(BASE_DIR, 'x')".into())),
                (s("n"), Expr::Other("60 * 60".into())),
                (s("ok"), num("1")),
            ])
        );
    }

    #[test]
    fn lambda_inside_dict() {
        let v = value_of("A = {'f': lambda x: x, 'g': 2}");
        assert_eq!(
            v,
            Expr::Dict(vec![
                (s("f"), Expr::Other("lambda x: x".into())),
                (s("g"), num("2")),
            ])
        );
    }

    #[test]
    fn non_literal_containers_collapse() {
        assert_eq!(value_of("A = {1, 2}"), Expr::Other("{1, 2}".into()));
        assert_eq!(
            value_of("A = [x for x in y]"),
            Expr::Other("[x for x in y]".into())
        );
        assert_eq!(
            value_of("A = {**B, 'c': 1}"),
            Expr::Other("{**B, 'c': 1}".into())
        );
        assert_eq!(value_of("A = [*B]"), Expr::Other("[*B]".into()));
        assert_eq!(value_of("A = b'raw'"), Expr::Other("b'raw'".into()));
        assert_eq!(value_of("A = f'{B}'"), Expr::Other("f'{B}'".into()));
        assert_eq!(value_of("A = 1j"), Expr::Other("1j".into()));
    }

    #[test]
    fn trailing_operators_make_other() {
        assert_eq!(value_of("A = 'a' + B"), Expr::Other("'a' + B".into()));
        assert_eq!(value_of("A = [1][0]"), Expr::Other("[1][0]".into()));
    }

    #[test]
    fn subscript_and_chained_targets() {
        let a = assigns("A = B = 1\nC['x'] = 2\nC[0] = 3\nD.e = 4\nF, G = 5, 6\n");
        assert_eq!(
            a[0].targets,
            vec![Target::Name("A".into()), Target::Name("B".into())]
        );
        assert_eq!(
            a[1].targets,
            vec![Target::Subscript {
                name: "C".into(),
                key: "x".into()
            }]
        );
        assert_eq!(a[2].targets, vec![Target::Other("C[0]".into())]);
        assert_eq!(a[3].targets, vec![Target::Other("D.e".into())]);
        assert_eq!(a[4].targets, vec![Target::Other("F, G".into())]);
    }

    #[test]
    fn compound_statements_are_skipped() {
        let src = "import os\n\ndef f(a=1):\n    X = 2\n    return a\n\nif DEBUG:\n    Y = 3\nelse:\n    Y = 4\n\nZ = 5\n";
        let module = parse(src).unwrap();
        let names: Vec<_> = module
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::Assign(a) => Some(a.targets.clone()),
                Statement::Other { .. } => None,
            })
            .collect();
        assert_eq!(names, vec![vec![Target::Name("Z".into())]]);
        assert_eq!(module.statements.len(), 5);
    }

    #[test]
    fn augmented_and_comparison_are_not_assignments() {
        let module = parse("A += [1]\nA == 2\nprint(a=1)\n").unwrap();
        assert!(module
            .statements
            .iter()
            .all(|s| matches!(s, Statement::Other { .. })));
    }

    #[test]
    fn value_span_covers_rhs() {
        let src = "X = 1\nNAME = {\n  'a': 1,\n}  # done\n";
        let a = assigns(src);
        assert_eq!(&src[a[1].value_span.clone()], "{\n  'a': 1,\n}");
    }

    #[test]
    fn unexpected_indent_is_error() {
        let err = parse("A = 1\n    B = 2\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }));
    }

    #[test]
    fn missing_block_is_error() {
        assert!(matches!(
            parse("if X:\nA = 1\n").unwrap_err(),
            Error::Syntax { line: 1, .. }
        ));
        assert!(parse("class A:\n").is_err());
    }

    #[test]
    fn empty_value_is_error() {
        assert!(matches!(parse("A = \n").unwrap_err(), Error::Syntax { .. }));
        assert!(matches!(parse("A = [1,,2]\n").unwrap_err(), Error::Syntax { .. }));
    }

    #[test]
    fn parse_standalone_expression() {
        assert_eq!(
            parse_expression("{'a': [1, None]}").unwrap(),
            Expr::Dict(vec![(s("a"), Expr::List(vec![num("1"), Expr::None]))])
        );
        assert!(parse_expression("").is_err());
        assert!(parse_expression("A = 1").is_err());
        assert!(parse_expression("1\n2").is_err());
        assert!(parse_expression("1; 2").is_err());
        assert_eq!(parse_expression("1;").unwrap(), num("1"));
    }

    #[test]
    fn semicolons_separate_statements() {
        let a = assigns("A = 1; B = 2\nC = 3;\nimport os; D = 'x'\n");
        let targets: Vec<_> = a.iter().map(|a| a.targets.clone()).collect();
        assert_eq!(
            targets,
            vec![
                vec![Target::Name("A".into())],
                vec![Target::Name("B".into())],
                vec![Target::Name("C".into())],
                vec![Target::Name("D".into())],
            ]
        );
        assert_eq!(a[0].value, num("1"));
        assert_eq!(a[1].value, num("2"));
        assert_eq!(a[2].value, num("3"));
        assert_eq!(a[3].value, s("x"));
    }

    #[test]
    fn empty_statement_is_error() {
        assert!(matches!(parse("A = 1;; B = 2\n").unwrap_err(), Error::Syntax { .. }));
    }

    #[test]
    fn one_line_compound_statement_is_skipped() {
        assert!(assigns("if DEBUG: A = 1; B = 2\n").is_empty());
    }
}
