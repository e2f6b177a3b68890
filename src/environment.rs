//! Variable environment
//!
//! A stack of block frames over one file-level frame. Plain assignment updates
//! the nearest existing binding or creates a file-level one; `local` binds in
//! the innermost frame. Constants and imports are seeded hidden; a top-level
//! assignment to one of them publishes it. Every file-level binding except the
//! hidden ones makes up the exported scope of a module.

use std::collections::HashMap;
use std::f64::consts::{E, PI, TAU};

use crate::error::{ErrorKind, Result, SceneError};
use crate::scene::Vec3;
use crate::value::{Exports, Value};

/// Where a binding came from, which decides whether it is exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Constant or import; hidden until the file assigns it
    Seeded,
    /// `local` binding; always hidden
    Local,
    Assigned,
}

/// A binding in the environment
#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    origin: Origin,
}

/// Colour constants available to every program
pub const COLORS: &[(&str, &str)] = &[
    ("RED", "#ff0000"),
    ("GREEN", "#00ff00"),
    ("BLUE", "#0000ff"),
    ("WHITE", "#ffffff"),
    ("BLACK", "#000000"),
    ("YELLOW", "#ffff00"),
    ("CYAN", "#00ffff"),
    ("MAGENTA", "#ff00ff"),
    ("ORANGE", "#ffa500"),
    ("GRAY", "#808080"),
];

/// Variable environment with block scoping
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<HashMap<String, Binding>>,
}

impl Scope {
    /// Create an empty file-level scope
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Create a file-level scope seeded with the numeric, colour and axis constants
    pub fn with_constants() -> Self {
        let mut scope = Self::new();

        scope.define_seeded("PI".to_string(), Value::Number(PI));
        scope.define_seeded("TAU".to_string(), Value::Number(TAU));
        scope.define_seeded("E".to_string(), Value::Number(E));
        scope.define_seeded("true".to_string(), Value::Bool(true));
        scope.define_seeded("false".to_string(), Value::Bool(false));
        scope.define_seeded("nil".to_string(), Value::Nil);
        scope.define_seeded("ORIGIN".to_string(), Value::Vector(Vec3::ZERO));

        for (name, hex) in COLORS {
            scope.define_seeded(name.to_string(), Value::String(hex.to_string()));
        }
        for axis in ["X", "Y", "Z"] {
            scope.define_seeded(axis.to_string(), Value::String(axis.to_ascii_lowercase()));
        }

        scope
    }

    pub fn push_block(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Drop the innermost block frame. The file-level frame is never popped.
    pub fn pop_block(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// File-level binding hidden from importers unless reassigned
    pub fn define_seeded(&mut self, name: String, value: Value) {
        self.frames[0].insert(name, Binding { value, origin: Origin::Seeded });
    }

    /// `local name = value`
    pub fn define_local(&mut self, name: String, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, Binding { value, origin: Origin::Local });
        }
    }

    /// `name = value`
    pub fn assign(&mut self, name: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.get_mut(name) {
                binding.value = value;
                if binding.origin == Origin::Seeded {
                    binding.origin = Origin::Assigned;
                }
                return;
            }
        }
        self.frames[0].insert(name.to_string(), Binding { value, origin: Origin::Assigned });
    }

    /// Get a variable's value
    pub fn get(&self, name: &str) -> Result<Value> {
        self.lookup(name).cloned().ok_or_else(|| {
            SceneError::new(ErrorKind::UndefinedVariable(name.to_string()), None)
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .map(|binding| &binding.value)
    }

    /// The public file-level bindings
    pub fn exports(&self) -> Exports {
        self.frames[0]
            .iter()
            .filter(|(_, binding)| binding.origin == Origin::Assigned)
            .map(|(name, binding)| (name.clone(), binding.value.clone()))
            .collect()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_seeded_but_not_exported() {
        let scope = Scope::with_constants();
        assert_eq!(scope.get("PI").unwrap(), Value::Number(PI));
        assert_eq!(scope.get("RED").unwrap(), Value::String("#ff0000".to_string()));
        assert_eq!(scope.get("Y").unwrap(), Value::String("y".to_string()));
        assert!(scope.exports().is_empty());
    }

    #[test]
    fn test_undefined_variable() {
        let scope = Scope::new();
        let err = scope.get("missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedVariable("missing".to_string()));
    }

    #[test]
    fn test_assignment_in_block_reaches_file_scope() {
        let mut scope = Scope::new();
        scope.push_block();
        scope.assign("x", Value::Number(1.0));
        scope.pop_block();
        assert_eq!(scope.get("x").unwrap(), Value::Number(1.0));
        assert!(scope.exports().contains_key("x"));
    }

    #[test]
    fn test_local_shadows_and_disappears() {
        let mut scope = Scope::new();
        scope.assign("x", Value::Number(1.0));
        scope.push_block();
        scope.define_local("x".to_string(), Value::Number(2.0));
        scope.assign("x", Value::Number(3.0));
        assert_eq!(scope.get("x").unwrap(), Value::Number(3.0));
        scope.pop_block();
        assert_eq!(scope.get("x").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_top_level_local_is_private() {
        let mut scope = Scope::new();
        scope.define_local("hidden".to_string(), Value::Number(1.0));
        scope.assign("shown", Value::Number(2.0));
        let exports = scope.exports();
        assert!(!exports.contains_key("hidden"));
        assert!(exports.contains_key("shown"));
    }

    #[test]
    fn test_file_frame_is_never_popped() {
        let mut scope = Scope::new();
        scope.assign("x", Value::Nil);
        scope.pop_block();
        assert_eq!(scope.lookup("x"), Some(&Value::Nil));
    }

    #[test]
    fn test_reassigned_constant_is_exported() {
        let mut scope = Scope::with_constants();
        scope.assign("RED", Value::String("#123456".to_string()));
        scope.push_block();
        scope.assign("X", Value::Number(3.0));
        scope.pop_block();

        let exports = scope.exports();
        assert_eq!(exports.get("RED"), Some(&Value::String("#123456".to_string())));
        assert_eq!(exports.get("X"), Some(&Value::Number(3.0)));
        assert!(!exports.contains_key("BLUE"));
    }

    #[test]
    fn test_reassigned_local_stays_private() {
        let mut scope = Scope::new();
        scope.define_local("hidden".to_string(), Value::Number(1.0));
        scope.assign("hidden", Value::Number(2.0));
        assert_eq!(scope.get("hidden").unwrap(), Value::Number(2.0));
        assert!(scope.exports().is_empty());
    }
}
