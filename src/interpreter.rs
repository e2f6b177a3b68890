//! Tree-walking interpreter
//!
//! Executes a parsed [`Program`] against a scope and a scene graph. Each
//! top-level statement runs in isolation: a runtime fault is recorded in the
//! error stream and execution moves on to the next statement.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::ast::{
    AssignValue, BinaryOp, Expr, FaceSpec, Literal, MaterialRef, Program, Property, PropertyValue,
    Stmt,
};
use crate::environment::Scope;
use crate::error::{ErrorKind, Result, SceneError, WARNING_PREFIX};
use crate::geometry::{self, Modifier};
use crate::scene::{Face, Material, SceneGraph, SceneObject, Shape, Vec3};
use crate::token::Span;
use crate::value::{Exports, ObjectRef, Value};

/// Hard cap on iterations of a single `while` or `for` loop
pub const MAX_LOOP_ITERATIONS: usize = 10_000;

/// Bindings produced by import resolution, merged into the scope before the
/// first statement runs
pub type ModuleTable = BTreeMap<String, Value>;

/// Everything a compile produces
#[derive(Debug, Default)]
pub struct CompileResult {
    pub scene_graph: SceneGraph,
    pub logs: Vec<String>,
    pub errors: Vec<String>,
    /// Exported scope, consumed when this file is an import target
    pub scope: Exports,
}

impl CompileResult {
    /// Result of a file that failed to parse
    pub fn failed(message: String) -> Self {
        Self {
            errors: vec![message],
            ..Self::default()
        }
    }

    /// Errors that are not warnings
    pub fn fatal_errors(&self) -> impl Iterator<Item = &String> {
        self.errors.iter().filter(|e| !e.starts_with(WARNING_PREFIX))
    }

    /// The scene graph as pretty JSON
    pub fn scene_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.scene_graph)
    }
}

/// Interpret a program with an already-resolved module table
pub fn interpret(program: &Program, modules: &ModuleTable) -> CompileResult {
    Interpreter::with_modules(modules).interpret(program)
}

/// The interpreter state
pub struct Interpreter {
    scope: Scope,
    objects: BTreeMap<String, ObjectRef>,
    logs: Vec<String>,
    errors: Vec<String>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            scope: Scope::with_constants(),
            objects: BTreeMap::new(),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Interpreter whose scope already holds the imported bindings
    pub fn with_modules(modules: &ModuleTable) -> Self {
        let mut interpreter = Self::new();
        for (name, value) in modules {
            interpreter.scope.define_seeded(name.clone(), value.clone());
        }
        interpreter
    }

    /// Run every statement and collect the results
    pub fn interpret(mut self, program: &Program) -> CompileResult {
        for stmt in &program.statements {
            if let Err(err) = self.execute(stmt) {
                let err = err.or_span(stmt.span());
                debug!("statement failed: {}", err);
                self.errors.push(err.to_string());
            }
        }

        let scene_graph = self
            .objects
            .iter()
            .map(|(name, object)| (name.clone(), object.borrow().clone()))
            .collect();

        CompileResult {
            scene_graph,
            logs: self.logs,
            errors: self.errors,
            scope: self.scope.exports(),
        }
    }

    // ==================== Statements ====================

    fn execute(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Import { source, .. } => {
                info!("import of '{}' was resolved before execution", source);
                Ok(())
            }

            Stmt::Assignment { name, value, local, span } => {
                let value = self.evaluate(value).map_err(|e| e.or_span(*span))?;
                let value = self.bind_object(name, value);
                if *local {
                    self.scope.define_local(name.clone(), value);
                } else {
                    self.scope.assign(name, value);
                }
                Ok(())
            }

            Stmt::PropertyAssignment { target, sub_target, property, value, span } => self
                .assign_property(target, sub_target.as_deref(), property, value)
                .map_err(|e| e.or_span(*span)),

            Stmt::MethodCall { target, method, args, exclude, span } => self
                .call_method(target, method, args, exclude.as_deref())
                .map_err(|e| e.or_span(*span)),

            Stmt::ConsolePrint { value, span } => {
                let value = self.evaluate(value).map_err(|e| e.or_span(*span))?;
                self.logs.push(value.to_string());
                Ok(())
            }

            Stmt::If { condition, then_branch, else_branch, span } => {
                let condition = self.evaluate(condition).map_err(|e| e.or_span(*span))?;
                if condition.is_truthy() {
                    self.execute_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body, span } => {
                let mut iterations = 0;
                loop {
                    let condition = self.evaluate(condition).map_err(|e| e.or_span(*span))?;
                    if !condition.is_truthy() {
                        break;
                    }
                    if iterations == MAX_LOOP_ITERATIONS {
                        self.iteration_limit(*span);
                        break;
                    }
                    self.execute_block(body)?;
                    iterations += 1;
                }
                Ok(())
            }

            Stmt::For { var, start, end, step, body, span } => {
                let start = self.evaluate_number(start).map_err(|e| e.or_span(*span))?;
                self.scope.assign(var, Value::Number(start));

                let mut iterations = 0;
                loop {
                    let current = self.loop_counter(var).map_err(|e| e.or_span(*span))?;
                    let end = self.evaluate_number(end).map_err(|e| e.or_span(*span))?;
                    let step = match step {
                        Some(step) => self.evaluate_number(step).map_err(|e| e.or_span(*span))?,
                        None => 1.0,
                    };

                    let finished = if step >= 0.0 { current > end } else { current < end };
                    if finished {
                        break;
                    }
                    if iterations == MAX_LOOP_ITERATIONS {
                        self.iteration_limit(*span);
                        break;
                    }

                    self.execute_block(body)?;
                    iterations += 1;

                    let current = self.loop_counter(var).map_err(|e| e.or_span(*span))?;
                    self.scope.assign(var, Value::Number(current + step));
                }
                Ok(())
            }
        }
    }

    fn execute_block(&mut self, stmts: &[Stmt]) -> Result<()> {
        self.scope.push_block();
        let result = stmts.iter().try_for_each(|stmt| {
            self.execute(stmt).map_err(|e| e.or_span(stmt.span()))
        });
        self.scope.pop_block();
        result
    }

    fn iteration_limit(&mut self, span: Span) {
        warn!("loop at line {} hit the iteration cap", span.line);
        let err = SceneError::new(ErrorKind::IterationLimit(MAX_LOOP_ITERATIONS), Some(span));
        self.errors.push(err.to_string());
    }

    fn loop_counter(&self, var: &str) -> Result<f64> {
        let value = self.scope.get(var)?;
        value.as_number().ok_or_else(|| type_mismatch("number loop counter", &value))
    }

    /// Store a scene object under `name`: a fresh copy stamped with the name,
    /// registered in the scene graph. Groups adopt their resolvable children.
    fn bind_object(&mut self, name: &str, value: Value) -> Value {
        let object = match value {
            Value::Object(object) => object,
            other => return other,
        };

        let mut copy = object.borrow().clone();
        copy.id = name.to_string();
        copy.parent = None;
        let children = copy.children().to_vec();

        let object = Rc::new(RefCell::new(copy));
        self.objects.insert(name.to_string(), Rc::clone(&object));

        for child in &children {
            match self.scope.lookup(child) {
                Some(Value::Object(child_object)) => {
                    child_object.borrow_mut().parent = Some(name.to_string());
                }
                _ => debug!("group '{}' child '{}' is not an object yet", name, child),
            }
        }

        Value::Object(object)
    }

    fn object_named(&self, name: &str) -> Result<ObjectRef> {
        match self.scope.lookup(name) {
            Some(Value::Object(object)) => Ok(Rc::clone(object)),
            _ => Err(SceneError::new(ErrorKind::MissingObject(name.to_string()), None)),
        }
    }

    fn assign_property(
        &mut self,
        target: &str,
        sub_target: Option<&str>,
        property: &str,
        value: &AssignValue,
    ) -> Result<()> {
        let mut object = self.object_named(target)?;

        if let Some(child) = sub_target {
            if !object.borrow().children().iter().any(|c| c == child) {
                return Err(SceneError::new(
                    ErrorKind::NotAChild(child.to_string(), target.to_string()),
                    None,
                ));
            }
            object = self.object_named(child)?;
        }

        match property {
            "pos" | "position" => {
                let pos = self.evaluate_position(value)?;
                object.borrow_mut().pos = pos;
            }
            "rot" | "rotation" => {
                let degrees = self.evaluate_vector(value)?;
                object.borrow_mut().rot = Vec3::new(
                    degrees.x.to_radians(),
                    degrees.y.to_radians(),
                    degrees.z.to_radians(),
                );
            }
            "scale" => {
                let scale = match value {
                    AssignValue::Expr(expr) => match self.evaluate(expr)? {
                        Value::Number(n) => Vec3::splat(n),
                        other => other
                            .as_vector()
                            .ok_or_else(|| type_mismatch("x, y, z or number", &other))?,
                    },
                    _ => self.evaluate_vector(value)?,
                };
                object.borrow_mut().scale = scale;
            }
            "material" => {
                let AssignValue::Expr(expr) = value else {
                    return Err(SceneError::new(
                        ErrorKind::TypeMismatch("material".to_string(), "coordinates".to_string()),
                        None,
                    ));
                };
                let material = self.material_value(expr)?;
                self.apply_material(&object, material);
            }
            other => {
                return Err(SceneError::new(ErrorKind::UnknownProperty(other.to_string()), None))
            }
        }

        Ok(())
    }

    /// Resolve the right-hand side of `obj.material = ...`. A string is taken
    /// as the name of a material in scope. Unresolvable values are warnings.
    fn material_value(&mut self, expr: &Expr) -> Result<Option<Material>> {
        let value = match self.evaluate(expr) {
            Ok(value) => value,
            Err(err) if matches!(err.kind, ErrorKind::UndefinedVariable(_) | ErrorKind::UndefinedMember(..)) => {
                self.warn(expr.span(), format!("material could not be resolved: {}", err.kind));
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let resolved = match &value {
            Value::Material(material) => Some(material.clone()),
            Value::String(name) => match self.scope.lookup(name) {
                Some(Value::Material(material)) => Some(material.clone()),
                _ => None,
            },
            Value::Nil => return Ok(None),
            _ => None,
        };

        if resolved.is_none() {
            self.warn(expr.span(), format!("'{}' is not a material", value));
        }
        Ok(resolved)
    }

    /// Groups pass the material on to their direct children
    fn apply_material(&mut self, object: &ObjectRef, material: Option<Material>) {
        let children = object.borrow().children().to_vec();
        if !object.borrow().is_group() {
            object.borrow_mut().material = material;
            return;
        }

        for child in children {
            match self.objects.get(&child) {
                Some(child_object) if !child_object.borrow().is_group() => {
                    child_object.borrow_mut().material = material.clone();
                }
                _ => debug!("material not applied to '{}'", child),
            }
        }
    }

    fn call_method(
        &mut self,
        target: &str,
        method: &str,
        args: &[Expr],
        exclude: Option<&str>,
    ) -> Result<()> {
        if let Some(Value::Module(exports)) = self.scope.lookup(target) {
            let exports = Rc::clone(exports);
            self.call_library(target, &exports, method, args)?;
            return Ok(());
        }

        match method {
            "rotate" => {
                let object = self.object_named(target)?;
                let degrees = match args.first() {
                    Some(arg) => self.evaluate_number(arg)?,
                    None => return Err(SceneError::new(ErrorKind::MissingProperty("angle".to_string()), None)),
                };
                let radians = degrees.to_radians();
                object.borrow_mut().rot.y += radians;

                if let Some(excluded) = exclude {
                    self.object_named(excluded)?.borrow_mut().rot.y -= radians;
                }
            }
            "move" => {
                let object = self.object_named(target)?;
                let values = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>>>()?;
                let offset = match values.as_slice() {
                    [single] => single.as_vector(),
                    _ => Value::List(values.clone()).as_vector(),
                }
                .ok_or_else(|| {
                    SceneError::new(
                        ErrorKind::TypeMismatch("x, y, z".to_string(), format!("{} arguments", values.len())),
                        None,
                    )
                })?;
                let mut object = object.borrow_mut();
                object.pos = object.pos.add(offset);
            }
            other => debug!("ignoring unknown method '{}' on '{}'", other, target),
        }

        Ok(())
    }

    // ==================== Expressions ====================

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),

            Expr::Reference { name, members, span } => {
                let mut value = self.scope.get(name).map_err(|e| e.or_span(*span))?;
                let mut owner = name.clone();
                for member in members {
                    value = member_of(&owner, &value, member).map_err(|e| e.or_span(*span))?;
                    owner = format!("{}.{}", owner, member);
                }
                Ok(value)
            }

            Expr::Binary { left, op, right, span } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(*op, left, right).map_err(|e| e.or_span(*span))
            }

            Expr::Call { receiver, callee, args, span } => {
                self.evaluate_call(receiver.as_deref(), callee, args).map_err(|e| e.or_span(*span))
            }

            Expr::Cube { vertices, span } => {
                let object = geometry::cube(vertices).map_err(|e| e.or_span(*span))?;
                Ok(Value::object(object))
            }

            Expr::Mesh { vertices, faces, span } => {
                let vertices: Vec<Vec3> = vertices.iter().map(|[x, y, z]| Vec3::new(*x, *y, *z)).collect();
                let faces = faces
                    .iter()
                    .map(|face| self.build_face(face, vertices.len(), *span))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::object(SceneObject::mesh(vertices, faces)))
            }

            Expr::Material { properties, span } => {
                let props = self.evaluate_properties(properties)?;
                build_material(&props).map_err(|e| e.or_span(*span)).map(Value::Material)
            }

            Expr::Modifier { kind, properties, span } => {
                let mut props = self.evaluate_properties(properties)?;
                let base_index = props
                    .iter()
                    .position(|(key, _)| key == "base")
                    .ok_or_else(|| SceneError::new(ErrorKind::MissingProperty("base".to_string()), Some(*span)))?;
                let (_, base) = props.remove(base_index);

                let base = match base {
                    Value::Object(base) => base,
                    other => {
                        return Err(type_mismatch("geometry or group for 'base'", &other).or_span(*span))
                    }
                };

                let mut clone = base.borrow().clone();
                clone.id.clear();
                clone.parent = None;

                let modifier = Modifier::from_properties(kind, &props).map_err(|e| e.or_span(*span))?;
                let modified = modifier.apply(clone).map_err(|e| e.or_span(*span))?;
                Ok(Value::object(modified))
            }

            Expr::Group { children, .. } => Ok(Value::object(SceneObject::group(children.clone()))),
        }
    }

    fn evaluate_number(&mut self, expr: &Expr) -> Result<f64> {
        let value = self.evaluate(expr)?;
        value.as_number().ok_or_else(|| type_mismatch("number", &value).or_span(expr.span()))
    }

    fn evaluate_vector(&mut self, value: &AssignValue) -> Result<Vec3> {
        match value {
            AssignValue::Triple(coords) => self.evaluate_triple(coords),
            AssignValue::Expr(expr) => {
                let value = self.evaluate(expr)?;
                value.as_vector().ok_or_else(|| type_mismatch("x, y, z", &value))
            }
            AssignValue::Relative { anchor, .. } => Err(SceneError::new(
                ErrorKind::TypeMismatch("x, y, z".to_string(), format!("relative position @{}", anchor)),
                None,
            )),
        }
    }

    fn evaluate_position(&mut self, value: &AssignValue) -> Result<Vec3> {
        match value {
            AssignValue::Relative { anchor, offset } => {
                let base = self.object_named(anchor)?.borrow().pos;
                let offset = match offset {
                    Some(coords) => self.evaluate_triple(coords)?,
                    None => Vec3::ZERO,
                };
                Ok(base.add(offset))
            }
            other => self.evaluate_vector(other),
        }
    }

    fn evaluate_triple(&mut self, coords: &[Expr; 3]) -> Result<Vec3> {
        let x = self.evaluate_number(&coords[0])?;
        let y = self.evaluate_number(&coords[1])?;
        let z = self.evaluate_number(&coords[2])?;
        Ok(Vec3::new(x, y, z))
    }

    fn evaluate_properties(&mut self, properties: &[Property]) -> Result<Vec<(String, Value)>> {
        properties
            .iter()
            .map(|prop| {
                let value = match &prop.value {
                    PropertyValue::Single(expr) => self.evaluate(expr)?,
                    PropertyValue::List(exprs) => Value::List(
                        exprs.iter().map(|e| self.evaluate(e)).collect::<Result<Vec<_>>>()?,
                    ),
                };
                Ok((prop.key.clone(), value))
            })
            .collect()
    }

    fn build_face(&mut self, face: &FaceSpec, vertex_count: usize, span: Span) -> Result<Face> {
        if let Some(&index) = face.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(SceneError::new(ErrorKind::FaceIndex(index, vertex_count), Some(span)));
        }

        let material = face
            .material
            .as_ref()
            .and_then(|reference| self.resolve_material_ref(reference, span));

        Ok(Face {
            indices: face.indices.clone(),
            material,
        })
    }

    /// Best effort: an unresolved reference is a warning and the face keeps no material
    fn resolve_material_ref(&mut self, reference: &MaterialRef, span: Span) -> Option<Material> {
        let resolved = match reference {
            MaterialRef::Name(name) => self.scope.lookup(name).cloned(),
            MaterialRef::Library { library, item } => match self.scope.lookup(library) {
                Some(Value::Module(exports)) => exports.get(item).cloned(),
                _ => None,
            },
        };

        match resolved {
            Some(Value::Material(material)) => Some(material),
            _ => {
                self.warn(span, format!("material '{}' could not be resolved; face left without material", reference));
                None
            }
        }
    }

    fn warn(&mut self, span: Span, message: String) {
        warn!("line {}: {}", span.line, message);
        self.errors.push(format!("{}[line {}] {}", WARNING_PREFIX, span.line, message));
    }

    fn evaluate_call(&mut self, receiver: Option<&str>, callee: &str, args: &[Expr]) -> Result<Value> {
        let args = args.iter().map(|arg| self.evaluate(arg)).collect::<Result<Vec<_>>>()?;

        match receiver {
            None => match callee {
                "int" | "float" | "string" | "bool" => coerce(callee, args.first().unwrap_or(&Value::Nil)),
                _ => match self.scope.get(callee)? {
                    Value::Native(function) => function
                        .call(&args)
                        .map_err(|msg| SceneError::new(ErrorKind::Library(callee.to_string(), msg), None)),
                    _ => Err(SceneError::new(ErrorKind::NotCallable(callee.to_string()), None)),
                },
            },
            Some(receiver) => match self.scope.get(receiver)? {
                Value::Module(exports) => invoke(receiver, &exports, callee, &args),
                _ => Err(SceneError::new(
                    ErrorKind::NotCallable(format!("{}.{}", receiver, callee)),
                    None,
                )),
            },
        }
    }

    fn call_library(&mut self, module: &str, exports: &Exports, name: &str, args: &[Expr]) -> Result<Value> {
        let args = args.iter().map(|arg| self.evaluate(arg)).collect::<Result<Vec<_>>>()?;
        invoke(module, exports, name, &args)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(module: &str, exports: &Exports, name: &str, args: &[Value]) -> Result<Value> {
    match exports.get(name) {
        Some(Value::Native(function)) => function.call(args).map_err(|msg| {
            SceneError::new(ErrorKind::Library(format!("{}.{}", module, name), msg), None)
        }),
        Some(_) => Err(SceneError::new(ErrorKind::NotCallable(format!("{}.{}", module, name)), None)),
        None => Err(SceneError::new(
            ErrorKind::UndefinedMember(module.to_string(), name.to_string()),
            None,
        )),
    }
}

fn type_mismatch(expected: &str, got: &Value) -> SceneError {
    SceneError::new(
        ErrorKind::TypeMismatch(expected.to_string(), got.type_name().to_string()),
        None,
    )
}

fn member_of(owner: &str, value: &Value, member: &str) -> Result<Value> {
    let found = match value {
        Value::Module(exports) => exports.get(member).cloned(),
        Value::Object(object) => {
            let object = object.borrow();
            match member {
                "pos" | "position" => Some(Value::Vector(object.pos)),
                "rot" | "rotation" => Some(Value::Vector(object.rot)),
                "scale" => Some(Value::Vector(object.scale)),
                "id" => Some(Value::String(object.id.clone())),
                "parent" => Some(object.parent.clone().map_or(Value::Nil, Value::String)),
                "shape" => Some(Value::String(object.kind_name().to_string())),
                "material" => Some(object.material.clone().map_or(Value::Nil, Value::Material)),
                "children" if object.is_group() => Some(Value::List(
                    object.children().iter().cloned().map(Value::String).collect(),
                )),
                "height" => match object.shape {
                    Shape::Pyramid { height, .. } => Some(Value::Number(height)),
                    _ => None,
                },
                _ => None,
            }
        }
        Value::Vector(v) => match member {
            "x" => Some(Value::Number(v.x)),
            "y" => Some(Value::Number(v.y)),
            "z" => Some(Value::Number(v.z)),
            _ => None,
        },
        Value::Material(m) => match member {
            "color" => Some(Value::String(m.color.clone())),
            "roughness" => Some(Value::Number(m.roughness)),
            "metalness" => Some(Value::Number(m.metalness)),
            "opacity" => Some(Value::Number(m.opacity)),
            "emissive" => Some(m.emissive.clone().map_or(Value::Nil, Value::String)),
            "wireframe" => Some(Value::Bool(m.wireframe)),
            _ => None,
        },
        Value::List(items) if member == "length" => Some(Value::Number(items.len() as f64)),
        _ => None,
    };

    found.ok_or_else(|| SceneError::new(ErrorKind::UndefinedMember(owner.to_string(), member.to_string()), None))
}

fn binary_op(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::Ne => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (*a, *b);
            Ok(match op {
                BinaryOp::Add => Value::Number(a + b),
                BinaryOp::Sub => Value::Number(a - b),
                BinaryOp::Mul => Value::Number(a * b),
                BinaryOp::Div | BinaryOp::Mod if b == 0.0 => {
                    return Err(SceneError::new(ErrorKind::DivisionByZero, None))
                }
                BinaryOp::Div => Value::Number(a / b),
                BinaryOp::Mod => Value::Number(a % b),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::Le => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::Ge => Value::Bool(a >= b),
                BinaryOp::Eq | BinaryOp::Ne => unreachable!("handled above"),
            })
        }
        (Value::String(_), _) | (_, Value::String(_)) if op == BinaryOp::Add => {
            Ok(Value::String(format!("{}{}", left, right)))
        }
        (Value::Vector(a), Value::Vector(b)) if op == BinaryOp::Add => Ok(Value::Vector(a.add(*b))),
        (Value::Vector(a), Value::Vector(b)) if op == BinaryOp::Sub => Ok(Value::Vector(a.sub(*b))),
        (Value::Vector(v), Value::Number(n)) | (Value::Number(n), Value::Vector(v))
            if op == BinaryOp::Mul =>
        {
            Ok(Value::Vector(v.scale(*n)))
        }
        (Value::Vector(v), Value::Number(n)) if op == BinaryOp::Div => {
            if *n == 0.0 {
                return Err(SceneError::new(ErrorKind::DivisionByZero, None));
            }
            Ok(Value::Vector(v.scale(1.0 / n)))
        }
        _ => Err(SceneError::new(
            ErrorKind::TypeMismatch(
                format!("operands for '{}'", op),
                format!("{} and {}", left.type_name(), right.type_name()),
            ),
            None,
        )),
    }
}

/// Built-in `int`, `float`, `string` and `bool` conversions
fn coerce(target: &str, value: &Value) -> Result<Value> {
    let number = |value: &Value| -> Result<f64> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| type_mismatch("numeric string", value)),
            other => Err(type_mismatch("number", other)),
        }
    };

    match target {
        "int" => Ok(Value::Number(number(value)?.trunc())),
        "float" => Ok(Value::Number(number(value)?)),
        "string" => Ok(Value::String(value.to_string())),
        _ => Ok(Value::Bool(value.is_truthy())),
    }
}

/// Compose a material from `material { ... }` properties on top of the defaults
fn build_material(props: &[(String, Value)]) -> Result<Material> {
    let mut material = Material::default();

    for (key, value) in props {
        match key.as_str() {
            "color" => material.color = color_value(value)?,
            "emissive" => material.emissive = Some(color_value(value)?),
            "roughness" => material.roughness = number_value(value)?,
            "metalness" => material.metalness = number_value(value)?,
            "opacity" => material.opacity = number_value(value)?,
            "wireframe" => material.wireframe = value.is_truthy(),
            other => return Err(SceneError::new(ErrorKind::UnknownProperty(other.to_string()), None)),
        }
    }

    Ok(material)
}

fn number_value(value: &Value) -> Result<f64> {
    value.as_number().ok_or_else(|| type_mismatch("number", value))
}

/// A colour string, or an `r, g, b` triple in 0..1 turned into hex
fn color_value(value: &Value) -> Result<String> {
    if let Value::String(s) = value {
        return Ok(s.clone());
    }
    let rgb = value.as_vector().ok_or_else(|| type_mismatch("colour", value))?;
    let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Ok(format!("#{:02x}{:02x}{:02x}", channel(rgb.x), channel(rgb.y), channel(rgb.z)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn run(source: &str) -> CompileResult {
        let program = parse(tokenize(source)).expect("parse failed");
        interpret(&program, &ModuleTable::new())
    }

    const UNIT_CUBE: &str = r#"cube("0,0,0":"1,0,0":"1,1,0":"0,1,0":"0,0,1":"1,0,1":"1,1,1":"0,1,1")"#;

    #[test]
    fn test_print_and_arithmetic() {
        let result = run("console.print(1 + 2 * 3)\nconsole.print(\"n=\" + (10 % 4))\nconsole.print(-2 - -3)");
        assert_eq!(result.logs, vec!["7", "n=2", "1"]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_comparisons_yield_booleans() {
        let result = run("console.print(2 > 1)\nconsole.print(1 == 2)\nconsole.print(\"a\" != \"b\")");
        assert_eq!(result.logs, vec!["true", "false", "true"]);
    }

    #[test]
    fn test_coercions() {
        let result = run("console.print(int(3.7))\nconsole.print(float(\"2.5\") * 2)\nconsole.print(string(4) + \"!\")\nconsole.print(bool(0))");
        assert_eq!(result.logs, vec!["3", "5", "4!", "false"]);
    }

    #[test]
    fn test_runtime_error_does_not_stop_program() {
        let result = run("console.print(missing)\nconsole.print(\"after\")\nx = 1 / 0\nconsole.print(\"end\")");
        assert_eq!(result.logs, vec!["after", "end"]);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("undefined variable 'missing'"));
        assert!(result.errors[0].contains("line 1"));
        assert!(result.errors[1].contains("division by zero"));
    }

    #[test]
    fn test_cube_becomes_scene_object() {
        let result = run(&format!("box = {}", UNIT_CUBE));
        let object = &result.scene_graph["box"];
        assert_eq!(object.id, "box");
        assert_eq!(object.vertices().len(), 8);
        assert_eq!(object.faces().len(), 6);
    }

    #[test]
    fn test_bad_cube_yields_no_object() {
        let result = run("box = cube(\"0,0,0\":\"1,0,0\")");
        assert!(result.scene_graph.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("exactly 8 vertices"));
    }

    #[test]
    fn test_for_loop_is_inclusive_with_step() {
        let result = run("for i = 10 to 0 step -5 { console.print(i) }");
        assert_eq!(result.logs, vec!["10", "5", "0"]);
    }

    #[test]
    fn test_while_loop() {
        let result = run("i = 0\nwhile i < 3 { i = i + 1 }\nconsole.print(i)");
        assert_eq!(result.logs, vec!["3"]);
    }

    #[test]
    fn test_iteration_cap() {
        let result = run("n = 0\nwhile 1 == 1 { n = n + 1 }\nconsole.print(n)");
        assert_eq!(result.logs, vec!["10000"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("10000 iterations"));
    }

    #[test]
    fn test_for_loop_cap() {
        let result = run("n = 0\nfor i = 1 to 5 step 0 { n = n + 1 }\nconsole.print(n)\nconsole.print(\"after\")");
        assert_eq!(result.logs, vec!["10000", "after"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("10000 iterations"));

        let result = run("n = 0\nfor i = 1 to 10000 { n = n + 1 }\nconsole.print(n)");
        assert_eq!(result.logs, vec!["10000"]);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn test_if_else_chain() {
        let result = run("x = 2\nif x == 1 { console.print(\"one\") } else if x == 2 { console.print(\"two\") } else { console.print(\"many\") }");
        assert_eq!(result.logs, vec!["two"]);
    }

    #[test]
    fn test_local_stays_in_block() {
        let result = run("x = 1\nif true { local x = 5\nconsole.print(x) }\nconsole.print(x)");
        assert_eq!(result.logs, vec!["5", "1"]);
    }

    #[test]
    fn test_property_assignment_and_move() {
        let result = run(&format!(
            "a = {}\nb = {}\na.pos = 1, 2, 3\nb.pos = @a + 0, 1, 0\nb.move(1, 0, 0)\na.scale = 2\na.rot = 0, 90, 0",
            UNIT_CUBE, UNIT_CUBE
        ));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let a = &result.scene_graph["a"];
        let b = &result.scene_graph["b"];
        assert_eq!(a.pos, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.pos, Vec3::new(2.0, 3.0, 3.0));
        assert_eq!(a.scale, Vec3::splat(2.0));
        assert!((a.rot.y - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_with_exclusion() {
        let result = run(&format!(
            "a = {}\nlamp = {}\ng = group[a, lamp]\ng.rotate(90 not lamp)\ng.spin(3)",
            UNIT_CUBE, UNIT_CUBE
        ));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let quarter = std::f64::consts::FRAC_PI_2;
        assert!((result.scene_graph["g"].rot.y - quarter).abs() < 1e-12);
        assert!((result.scene_graph["lamp"].rot.y + quarter).abs() < 1e-12);
    }

    #[test]
    fn test_group_sub_target() {
        let result = run(&format!(
            "a = {}\nb = {}\ng = group[a, b]\ng.(b).pos = 0, 5, 0\ng.(c).pos = 1, 1, 1",
            UNIT_CUBE, UNIT_CUBE
        ));
        assert_eq!(result.scene_graph["b"].pos, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("not a child"));
    }

    #[test]
    fn test_materials_on_faces_and_objects() {
        let result = run(
            "red = material { color = RED, roughness = 0.2 }\n\
             tri = mesh { vertices = [0,0,0; 1,0,0; 0,1,0;] faces = [0,1,2: red; 2,1,0: ghost;] }\n\
             tri.material = red",
        );
        let tri = &result.scene_graph["tri"];
        let faces = tri.faces();
        assert_eq!(faces[0].material.as_ref().map(|m| m.color.as_str()), Some("#ff0000"));
        assert_eq!(faces[1].material, None);
        assert_eq!(tri.material.as_ref().map(|m| m.roughness), Some(0.2));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with(WARNING_PREFIX));
        assert_eq!(result.fatal_errors().count(), 0);
    }

    #[test]
    fn test_group_material_reaches_children() {
        let result = run(&format!(
            "m = material {{ color = 0, 0, 1 }}\na = {}\ng = group[a]\ng.material = m",
            UNIT_CUBE
        ));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.scene_graph["a"].material.as_ref().map(|m| m.color.as_str()), Some("#0000ff"));
    }

    #[test]
    fn test_modifiers_clone_their_base() {
        let result = run(&format!(
            "a = {}\nbig = modifier.scale {{ base = a, factor = 2, 1, 1 }}\n\
             moved = modifier.translate {{ base = big, offset = 0, 3, 0 }}\n\
             turned = modifier.rotate {{ base = a; axis, angle = X, 90 }}\n\
             spike = modifier.pyramid {{ base = a, height = 2 }}",
            UNIT_CUBE
        ));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let graph = &result.scene_graph;
        assert_eq!(graph["a"].scale, Vec3::ONE);
        assert_eq!(graph["big"].scale, Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(graph["moved"].scale, Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(graph["moved"].pos, Vec3::new(0.0, 3.0, 0.0));
        assert!((graph["turned"].rot.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(graph["spike"].kind_name(), "pyramid");
        assert_eq!(graph["big"].id, "big");
    }

    #[test]
    fn test_rotate_modifier_parallel_lists() {
        let result = run(&format!(
            "a = {}\nturned = modifier.rotate {{ base = a, axis = X, Y, angle = 90, 45 }}",
            UNIT_CUBE
        ));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let rot = result.scene_graph["turned"].rot;
        assert!((rot.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((rot.y - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_face_index_out_of_range() {
        let result = run("m = mesh { vertices = [0,0,0; 1,0,0; 0,1,0;] faces = [0,1,5;] }");
        assert!(result.scene_graph.is_empty());
        assert!(result.errors[0].contains("out of range"));
    }

    #[test]
    fn test_member_access() {
        let result = run(&format!(
            "a = {}\na.pos = 4, 5, 6\nconsole.print(a.pos.y)\nconsole.print(a.shape)\nconsole.print(a.id)",
            UNIT_CUBE
        ));
        assert_eq!(result.logs, vec!["5", "mesh", "a"]);
    }

    #[test]
    fn test_exported_scope_skips_constants_and_locals() {
        let result = run("size = 2\nlocal secret = 3");
        assert_eq!(result.scope.len(), 1);
        assert_eq!(result.scope.get("size"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_unknown_property_is_an_error() {
        let result = run(&format!("a = {}\na.colour = 1", UNIT_CUBE));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("unknown property 'colour'"));
    }
}
