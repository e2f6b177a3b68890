//! scenelang - a scene-description language
//!
//! Programs describe geometry, materials, transforms and grouping; compiling
//! one yields a scene graph plus a log and error stream.

pub mod token;
pub mod lexer;
pub mod parser;
pub mod ast;
pub mod value;
pub mod scene;
pub mod geometry;
pub mod environment;
pub mod interpreter;
pub mod stdlib;
pub mod loader;
pub mod error;

pub use error::{ErrorKind, Result, SceneError};
pub use interpreter::{CompileResult, Interpreter};
pub use lexer::{tokenize, Lexer};
pub use loader::{FileTable, LoaderConfig, ModuleLoader};
pub use parser::{parse, Parser};
pub use scene::{SceneGraph, SceneObject};
pub use value::Value;

/// Compile a standalone program: no workspace files, no network
pub fn compile(source: &str) -> CompileResult {
    ModuleLoader::offline(LoaderConfig::default()).compile(source, &FileTable::new())
}

/// Version of the scenelang language
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
