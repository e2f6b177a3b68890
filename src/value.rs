//! Runtime value types

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::scene::{Material, SceneObject, Vec3};

/// Shared handle to a scene object; the scope and the scene graph point at the
/// same record so in-place mutations are visible through both.
pub type ObjectRef = Rc<RefCell<SceneObject>>;

/// Exported scope of a module
pub type Exports = BTreeMap<String, Value>;

/// Runtime values
#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,

    /// `{x, y, z}` record, usually returned by library functions
    Vector(Vec3),

    /// Value list bound to a single property key
    List(Vec<Value>),

    Material(Material),

    /// Geometry or group
    Object(ObjectRef),

    /// Exported scope of an imported module
    Module(Rc<Exports>),

    /// Built-in library function
    Native(NativeFn),
}

impl Value {
    pub fn object(object: SceneObject) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Vector(_) => "vector",
            Value::List(_) => "list",
            Value::Material(_) => "material",
            Value::Object(_) => "object",
            Value::Module(_) => "module",
            Value::Native(_) => "native function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// A vector, or a list of exactly three numbers
    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Value::Vector(v) => Some(*v),
            Value::List(items) if items.len() == 3 => {
                let x = items[0].as_number()?;
                let y = items[1].as_number()?;
                let z = items[2].as_number()?;
                Some(Vec3::new(x, y, z))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Vector(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Material(m) => write!(f, "<material {}>", m.color),
            Value::Object(obj) => write!(f, "{}", obj.borrow()),
            Value::Module(_) => write!(f, "<module>"),
            Value::Native(nf) => write!(f, "<native fn {}>", nf.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Material(a), Value::Material(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

/// Signature of a library function: positional arguments in, value or message out
pub type NativeFnPtr = dyn Fn(&[Value]) -> Result<Value, String>;

/// Native/built-in function
#[derive(Clone)]
pub struct NativeFn {
    pub name: String,
    pub func: Rc<NativeFnPtr>,
}

impl NativeFn {
    pub fn new(name: &str, func: impl Fn(&[Value]) -> Result<Value, String> + 'static) -> Self {
        Self {
            name: name.to_string(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}
