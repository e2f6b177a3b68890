//! Abstract Syntax Tree definitions
//!
//! Represents the structure of programs after parsing.

use crate::token::Span;

/// Literal values written directly in source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

/// Expression nodes
#[derive(Debug, Clone)]
pub enum Expr {
    /// Number or string literal
    Literal { value: Literal, span: Span },

    /// Variable reference with optional member path: `a`, `lib.item`, `box.pos.x`
    Reference {
        name: String,
        members: Vec<String>,
        span: Span,
    },

    /// Binary operation: a + b, x * y. Unary minus is parsed as `0 - x`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },

    /// Function call: `f(a)`, `lib.f(a)`, `int(x)`
    Call {
        receiver: Option<String>,
        callee: String,
        args: Vec<Expr>,
        span: Span,
    },

    /// `cube("x,y,z":...)` with the raw vertex strings
    Cube { vertices: Vec<String>, span: Span },

    /// `mesh { vertices = [...] faces = [...] }`
    Mesh {
        vertices: Vec<[f64; 3]>,
        faces: Vec<FaceSpec>,
        span: Span,
    },

    /// `material { color = RED, roughness = 0.4 }`
    Material { properties: Vec<Property>, span: Span },

    /// `modifier.scale { base = a, factor = 2,2,2 }`
    Modifier {
        kind: String,
        properties: Vec<Property>,
        span: Span,
    },

    /// `group [a, b, c]`
    Group { children: Vec<String>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. } => *span,
            Expr::Reference { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::Cube { span, .. } => *span,
            Expr::Mesh { span, .. } => *span,
            Expr::Material { span, .. } => *span,
            Expr::Modifier { span, .. } => *span,
            Expr::Group { span, .. } => *span,
        }
    }

    pub fn number(value: f64, span: Span) -> Self {
        Expr::Literal { value: Literal::Number(value), span }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %
    Eq,  // ==
    Ne,  // !=
    Lt,  // <
    Le,  // <=
    Gt,  // >
    Ge,  // >=
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Mod => write!(f, "%"),
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::Ne => write!(f, "!="),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Ge => write!(f, ">="),
        }
    }
}

/// Material attached to a mesh face: `: name` or `: lib.item`
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialRef {
    Name(String),
    Library { library: String, item: String },
}

impl std::fmt::Display for MaterialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialRef::Name(name) => write!(f, "{}", name),
            MaterialRef::Library { library, item } => write!(f, "{}.{}", library, item),
        }
    }
}

/// One face of a mesh literal
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSpec {
    pub indices: Vec<usize>,
    pub material: Option<MaterialRef>,
}

/// `key = value` entry of a material or modifier block
#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Single(Expr),
    /// A key bound to a whole comma-separated value list
    List(Vec<Expr>),
}

/// Right-hand side of `obj.prop = ...`
#[derive(Debug, Clone)]
pub enum AssignValue {
    Expr(Expr),
    /// `x, y, z`
    Triple(Box<[Expr; 3]>),
    /// `@anchor` or `@anchor + x, y, z`
    Relative {
        anchor: String,
        offset: Option<Box<[Expr; 3]>>,
    },
}

/// Statement nodes
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `import X`, `import X as Y`, `import a, b from X`, `import a from X as Y`
    Import {
        names: Vec<String>,
        source: String,
        alias: Option<String>,
        span: Span,
    },

    /// `name = expr` or `local name = expr`
    Assignment {
        name: String,
        value: Expr,
        local: bool,
        span: Span,
    },

    /// `target.prop = value` or `target.(child).prop = value`
    PropertyAssignment {
        target: String,
        sub_target: Option<String>,
        property: String,
        value: AssignValue,
        span: Span,
    },

    /// `target.method(args [not excluded])`
    MethodCall {
        target: String,
        method: String,
        args: Vec<Expr>,
        exclude: Option<String>,
        span: Span,
    },

    /// `console.print(expr)`
    ConsolePrint { value: Expr, span: Span },

    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },

    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },

    /// `for i = start to end [step s] { }`, bounds inclusive
    For {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Import { span, .. } => *span,
            Stmt::Assignment { span, .. } => *span,
            Stmt::PropertyAssignment { span, .. } => *span,
            Stmt::MethodCall { span, .. } => *span,
            Stmt::ConsolePrint { span, .. } => *span,
            Stmt::If { span, .. } => *span,
            Stmt::While { span, .. } => *span,
            Stmt::For { span, .. } => *span,
        }
    }
}

/// A complete program
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    /// Top-level import statements, in source order
    pub fn imports(&self) -> impl Iterator<Item = &Stmt> {
        self.statements
            .iter()
            .filter(|stmt| matches!(stmt, Stmt::Import { .. }))
    }
}
