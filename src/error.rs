//! Error types for the scene language
//!
//! Provides structured error handling with source locations. Syntax errors are
//! fatal for a file; everything else is reported per statement and execution
//! carries on.

use crate::token::Span;
use std::fmt;

/// Error kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Parser errors
    UnexpectedToken(String),
    ExpectedToken(String, String),
    ExpectedExpression,
    InvalidFace(String),
    PropertyArity(usize, usize),

    // Runtime errors
    UndefinedVariable(String),
    UndefinedMember(String, String),
    TypeMismatch(String, String),
    DivisionByZero,
    NotCallable(String),
    MissingObject(String),
    InvalidCube(usize),
    InvalidVertex(String),
    UnknownModifier(String),
    UnknownProperty(String),
    MissingProperty(String),
    FaceIndex(usize, usize),
    NotAChild(String, String),
    IterationLimit(usize),
    Library(String, String),

    // Module errors
    ModuleNotFound(String),
    ImportCycle(Vec<String>),
    FetchFailed(String, String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedToken(t) => write!(f, "unexpected token '{}'", t),
            ErrorKind::ExpectedToken(expected, got) => {
                write!(f, "{}, got '{}'", expected, got)
            }
            ErrorKind::ExpectedExpression => write!(f, "expected expression"),
            ErrorKind::InvalidFace(msg) => write!(f, "invalid face: {}", msg),
            ErrorKind::PropertyArity(keys, values) => {
                write!(f, "{} property names but {} values", keys, values)
            }
            ErrorKind::UndefinedVariable(name) => write!(f, "undefined variable '{}'", name),
            ErrorKind::UndefinedMember(owner, name) => {
                write!(f, "'{}' has no member '{}'", owner, name)
            }
            ErrorKind::TypeMismatch(expected, got) => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            ErrorKind::DivisionByZero => write!(f, "division by zero"),
            ErrorKind::NotCallable(name) => write!(f, "'{}' is not callable", name),
            ErrorKind::MissingObject(name) => write!(f, "no scene object named '{}'", name),
            ErrorKind::InvalidCube(count) => {
                write!(f, "cube needs exactly 8 vertices, got {}", count)
            }
            ErrorKind::InvalidVertex(text) => write!(f, "invalid vertex '{}'", text),
            ErrorKind::UnknownModifier(kind) => write!(f, "unknown modifier '{}'", kind),
            ErrorKind::UnknownProperty(name) => write!(f, "unknown property '{}'", name),
            ErrorKind::MissingProperty(name) => write!(f, "missing required property '{}'", name),
            ErrorKind::FaceIndex(index, count) => {
                write!(f, "face index {} out of range for {} vertices", index, count)
            }
            ErrorKind::NotAChild(child, group) => {
                write!(f, "'{}' is not a child of group '{}'", child, group)
            }
            ErrorKind::IterationLimit(max) => {
                write!(f, "loop exceeded {} iterations and was stopped", max)
            }
            ErrorKind::Library(func, msg) => write!(f, "{}: {}", func, msg),
            ErrorKind::ModuleNotFound(name) => write!(f, "module '{}' not found", name),
            ErrorKind::ImportCycle(chain) => {
                write!(f, "import cycle detected: {}", chain.join(" -> "))
            }
            ErrorKind::FetchFailed(url, msg) => write!(f, "failed to fetch '{}': {}", url, msg),
        }
    }
}

/// An error with location information
#[derive(Debug, Clone)]
pub struct SceneError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    pub source_line: Option<String>,
}

impl SceneError {
    pub fn new(kind: ErrorKind, span: Option<Span>) -> Self {
        Self {
            kind,
            span,
            source_line: None,
        }
    }

    /// Attach a span if the error does not carry one yet
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        if let Some(span) = &self.span {
            let lines: Vec<&str> = source.lines().collect();
            if span.line > 0 && span.line <= lines.len() {
                self.source_line = Some(lines[span.line - 1].to_string());
            }
        }
        self
    }

    /// Parse errors abort a whole file
    pub fn is_syntax(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnexpectedToken(_)
                | ErrorKind::ExpectedToken(..)
                | ErrorKind::ExpectedExpression
                | ErrorKind::InvalidFace(_)
                | ErrorKind::PropertyArity(..)
        )
    }

    fn label(&self) -> &'static str {
        if self.is_syntax() {
            "Syntax error"
        } else {
            "Error"
        }
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "[line {}:{}] {}: {}", span.line, span.column, self.label(), self.kind)?;

            if let Some(ref line) = self.source_line {
                write!(f, "\n  | {}", line)?;
                write!(f, "\n  | {}^", " ".repeat(span.column.saturating_sub(1)))?;
            }
        } else {
            write!(f, "{}: {}", self.label(), self.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for SceneError {}

/// Result type for scene language operations
pub type Result<T> = std::result::Result<T, SceneError>;

/// Prefix used for non-fatal diagnostics in the `errors` stream
pub const WARNING_PREFIX: &str = "Warning: ";
