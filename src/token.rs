//! Token definitions for the scene language
//!
//! Tokens represent the atomic units of meaning in source code.

use std::fmt;

/// Location in source code for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self { start, end, line, column }
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),

    // Identifiers (letters, digits, `_`, leading `@` allowed)
    Ident(String),

    // Keywords
    Import,
    From,
    As,
    Cube,
    Material,
    Modifier,
    Group,
    Mesh,
    Not,
    Local,
    If,
    Else,
    While,
    For,
    To,
    Step,
    Int,
    Float,
    StringType,
    Bool,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Equal,        // =
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Bang,         // !

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    Eof,
}

impl TokenKind {
    /// Whether this kind is one of the reserved words
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Import
                | TokenKind::From
                | TokenKind::As
                | TokenKind::Cube
                | TokenKind::Material
                | TokenKind::Modifier
                | TokenKind::Group
                | TokenKind::Mesh
                | TokenKind::Not
                | TokenKind::Local
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::To
                | TokenKind::Step
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::StringType
                | TokenKind::Bool
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Import => write!(f, "import"),
            TokenKind::From => write!(f, "from"),
            TokenKind::As => write!(f, "as"),
            TokenKind::Cube => write!(f, "cube"),
            TokenKind::Material => write!(f, "material"),
            TokenKind::Modifier => write!(f, "modifier"),
            TokenKind::Group => write!(f, "group"),
            TokenKind::Mesh => write!(f, "mesh"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::Local => write!(f, "local"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::While => write!(f, "while"),
            TokenKind::For => write!(f, "for"),
            TokenKind::To => write!(f, "to"),
            TokenKind::Step => write!(f, "step"),
            TokenKind::Int => write!(f, "int"),
            TokenKind::Float => write!(f, "float"),
            TokenKind::StringType => write!(f, "string"),
            TokenKind::Bool => write!(f, "bool"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Equal => write!(f, "="),
            TokenKind::EqualEqual => write!(f, "=="),
            TokenKind::BangEqual => write!(f, "!="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its kind and location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, lexeme: String) -> Self {
        Self { kind, span, lexeme }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }

    /// The raw text of the token as it should be glued back together,
    /// with string quotes stripped.
    pub fn raw_text(&self) -> &str {
        match &self.kind {
            TokenKind::String(s) => s,
            _ => &self.lexeme,
        }
    }
}

/// Check if a string is a keyword and return the corresponding token kind
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    match ident {
        "import" => Some(TokenKind::Import),
        "from" => Some(TokenKind::From),
        "as" => Some(TokenKind::As),
        "cube" => Some(TokenKind::Cube),
        "material" => Some(TokenKind::Material),
        "modifier" => Some(TokenKind::Modifier),
        "group" => Some(TokenKind::Group),
        "mesh" => Some(TokenKind::Mesh),
        "not" => Some(TokenKind::Not),
        "local" => Some(TokenKind::Local),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "while" => Some(TokenKind::While),
        "for" => Some(TokenKind::For),
        "to" => Some(TokenKind::To),
        "step" => Some(TokenKind::Step),
        "int" => Some(TokenKind::Int),
        "float" => Some(TokenKind::Float),
        "string" => Some(TokenKind::StringType),
        "bool" => Some(TokenKind::Bool),
        _ => None,
    }
}
