/// AST for placeholder suffix expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A key of the resolved mapping: `ENGINE`
    Name(String),

    /// Integer literal
    Int(i64),

    /// String literal
    Str(String),

    /// Unary negation: `-expr`
    Neg(Box<Expr>),

    /// Arithmetic: `expr op expr`
    BinOp(BinOp, Box<Expr>, Box<Expr>),

    /// Subscript: `expr[index]`
    Index(Box<Expr>, Box<Expr>),

    /// Slice: `expr[start:stop:step]`
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },

    /// Method call: `expr.rfind(".")`
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },

    /// Builtin call: `len(expr)`
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
}
