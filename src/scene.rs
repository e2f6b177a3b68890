//! Scene graph records produced by the interpreter
//!
//! These are the renderer-facing types. Object kinds are a closed set so a
//! consumer can match exhaustively on [`Shape`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The compiled output: top-level identifier to scene object
pub type SceneGraph = BTreeMap<String, SceneObject>;

/// A 3-component vector, serialized as `{x, y, z}`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Componentwise product
    pub fn mul(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn scale(self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut f64 {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Rotation / direction axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn parse(name: &str) -> Option<Axis> {
        match name.to_ascii_lowercase().as_str() {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Property names accepted by `material { ... }`
pub const MATERIAL_PROPERTIES: &[&str] = &["color", "emissive", "roughness", "metalness", "opacity", "wireframe"];

/// Surface description attached to faces or whole objects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub color: String,
    pub roughness: f64,
    pub metalness: f64,
    pub opacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive: Option<String>,
    pub wireframe: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: "#cccccc".to_string(),
            roughness: 0.5,
            metalness: 0.0,
            opacity: 1.0,
            emissive: None,
            wireframe: false,
        }
    }
}

/// A polygon of a mesh; indices refer to the owning object's vertices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub indices: Vec<usize>,
    pub material: Option<Material>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Shape-specific part of a scene object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    Mesh {
        vertices: Vec<Vec3>,
        faces: Vec<Face>,
    },
    Pyramid {
        vertices: Vec<Vec3>,
        height: f64,
        direction: Direction,
    },
    Group {
        children: Vec<String>,
    },
}

/// A node of the scene graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    pub id: String,
    pub parent: Option<String>,
    pub pos: Vec3,
    /// Radians
    pub rot: Vec3,
    pub scale: Vec3,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
    #[serde(flatten)]
    pub shape: Shape,
}

impl SceneObject {
    pub fn new(shape: Shape) -> Self {
        Self {
            id: String::new(),
            parent: None,
            pos: Vec3::ZERO,
            rot: Vec3::ZERO,
            scale: Vec3::ONE,
            material: None,
            shape,
        }
    }

    pub fn mesh(vertices: Vec<Vec3>, faces: Vec<Face>) -> Self {
        Self::new(Shape::Mesh { vertices, faces })
    }

    pub fn group(children: Vec<String>) -> Self {
        Self::new(Shape::Group { children })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.shape {
            Shape::Mesh { .. } => "mesh",
            Shape::Pyramid { .. } => "pyramid",
            Shape::Group { .. } => "group",
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.shape, Shape::Group { .. })
    }

    pub fn children(&self) -> &[String] {
        match &self.shape {
            Shape::Group { children } => children,
            _ => &[],
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        match &self.shape {
            Shape::Mesh { vertices, .. } | Shape::Pyramid { vertices, .. } => vertices,
            Shape::Group { .. } => &[],
        }
    }

    pub fn faces(&self) -> &[Face] {
        match &self.shape {
            Shape::Mesh { faces, .. } => faces,
            _ => &[],
        }
    }
}

impl fmt::Display for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "<{}>", self.kind_name())
        } else {
            write!(f, "<{} {}>", self.kind_name(), self.id)
        }
    }
}
