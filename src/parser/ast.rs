use std::ops::Range;

/// A parsed source file: its top-level statements in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `target (= target)* = value`
    Assign(Assign),

    /// Anything else at module level: imports, `def`/`class`, control flow,
    /// expression statements, augmented or annotated assignments.
    Other { line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub targets: Vec<Target>,
    pub value: Expr,
    pub line: usize,
    /// Byte range of the right-hand side in the source.
    pub value_span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `NAME = ...`
    Name(String),

    /// `NAME['key'] = ...`
    Subscript { name: String, key: String },

    /// Attribute, tuple, starred, nested or non-string subscript targets.
    Other(String),
}

/// Literal expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Adjacent string literals, already concatenated and unescaped.
    Str(String),

    /// Number as written, with any leading unary minus folded in.
    Number { text: String, negative: bool },

    Bool(bool),

    None,

    List(Vec<Expr>),

    Tuple(Vec<Expr>),

    /// Entries in source order, duplicates included.
    Dict(Vec<(Expr, Expr)>),

    /// Any expression outside the literal grammar, kept as source text.
    Other(String),
}
