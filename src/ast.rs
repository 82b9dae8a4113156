//! Typed syntax tree consumed by the formatter
//!
//! The renderer never touches the raw tree-sitter CST. The [`lower`](crate::lower)
//! module converts it into the closed set of statement and expression kinds
//! defined here, so the rendering dispatch is an exhaustive `match` and a new
//! construct cannot be silently left unrendered.
//!
//! Ownership is strictly tree-shaped: every node exclusively owns its
//! children, and the tree is immutable once built.

/// A single source file (one tree-sitter `module`).
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `import a`, `import a as b`, `import a, b`
    Import { names: Vec<Alias> },
    /// `from mod import a, b as c` — `module` keeps any leading relative dots.
    ImportFrom { module: String, names: Vec<Alias> },
    /// A bare expression statement.
    Expr(Expr),
    /// `a = b = value`, optionally annotated (`x: int = 1`, `x: int`).
    ///
    /// Chained assignments are flattened into `targets`; `value` is absent
    /// only for annotation-only statements.
    Assign {
        targets: Vec<Expr>,
        annotation: Option<Expr>,
        value: Option<Expr>,
    },
    /// `target op= value`
    AugAssign { target: Expr, op: BinOp, value: Expr },
    Pass,
    Break,
    Continue,
    Return(Option<Expr>),
    /// `del a, b`
    Delete(Vec<Expr>),
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Assert {
        test: Expr,
        message: Option<Expr>,
    },
    /// `raise`, `raise exc`, `raise exc from cause`
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finally: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        elifs: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
}

impl Stmt {
    /// Definitions get blank-line separation from their siblings.
    pub fn is_definition(&self) -> bool {
        matches!(self, Stmt::FunctionDef(_) | Stmt::ClassDef(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    pub params: Parameters,
    pub returns: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    /// Base classes and class keywords (`metaclass=...`), in source order.
    pub bases: Vec<CallArg>,
    pub body: Vec<Stmt>,
}

/// An imported name with its optional `as` binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

/// One `except` clause of a `try` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub kind: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// One context manager of a `with` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expr,
    pub target: Option<Expr>,
}

/// The raw parameter buckets of a callable signature.
///
/// Mirrors how the grammar groups a signature: `defaults` right-aligns to the
/// combined `posonly` + `args` sequence, and `kw_defaults` aligns index-wise
/// with `kwonly` (absent entries mean no default). The renderer's ordering
/// algorithm reconstructs the name→default association from these buckets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    pub posonly: Vec<Param>,
    pub args: Vec<Param>,
    pub defaults: Vec<Expr>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kw_defaults: Vec<Option<Expr>>,
    pub kwarg: Option<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numbers, strings, `True`/`False`/`None`, `...` — kept verbatim from
    /// the source so literal values never change representation.
    Literal(String),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Bool {
        op: BoolOp,
        values: Vec<Expr>,
    },
    /// `a < b <= c`: `ops` and `comparators` align index-wise.
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<DictItem>),
    Call {
        func: Box<Expr>,
        args: Vec<CallArg>,
    },
    /// `*expr` in a target or display position.
    Starred(Box<Expr>),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    /// `value[a, b]` — multiple indices stay a bare comma list (slices are
    /// not valid inside parentheses).
    Subscript {
        value: Box<Expr>,
        indices: Vec<Expr>,
    },
    /// `lower:upper:step`, only valid inside a subscript.
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    /// `target := value`
    Named {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Explicit grouping parentheses preserved from the source.
    Paren(Box<Expr>),
    /// `body if test else orelse`
    Conditional {
        body: Box<Expr>,
        test: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// List/set/dict comprehensions and generator expressions. `value` is the
    /// mapped value of a dict comprehension, absent otherwise.
    Comprehension {
        kind: CompKind,
        element: Box<Expr>,
        value: Option<Box<Expr>>,
        generators: Vec<CompClause>,
    },
}

/// One key/value entry of a dict display; a `None` key is a `**splat`.
#[derive(Debug, Clone, PartialEq)]
pub struct DictItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

/// One argument of a call (or class-definition base list), in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Pos(Expr),
    Keyword { name: String, value: Expr },
    Star(Expr),
    DoubleStar(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompKind {
    List,
    Set,
    Dict,
    Generator,
}

/// One `for ... in ... [if ...]` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct CompClause {
    pub target: Expr,
    pub iter: Expr,
    pub conditions: Vec<Expr>,
}

/// Canonical symbol tables for the operator categories. Pure data: each
/// category maps exhaustively to its textual symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    UAdd,
    USub,
    Invert,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::UAdd => "+",
            UnaryOp::USub => "-",
            UnaryOp::Invert => "~",
        }
    }

    /// `not` is a word operator and needs a space before its operand.
    pub fn is_word(self) -> bool {
        matches!(self, UnaryOp::Not)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::MatMult => "@",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}
