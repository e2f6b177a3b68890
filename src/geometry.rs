//! Geometry construction and modifiers
//!
//! Expands cube literals into meshes and applies the four modifier kinds to
//! cloned scene objects.

use crate::error::{ErrorKind, Result, SceneError};
use crate::scene::{Axis, Direction, Face, SceneObject, Shape, Vec3};
use crate::value::Value;

/// Vertex indices of the six quads of a cube, in the order the eight corner
/// vertices are written: bottom ring then top ring.
pub const CUBE_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
];

/// Parse an `"x,y,z"` vertex string
pub fn parse_vertex(text: &str) -> Result<Vec3> {
    let invalid = || SceneError::new(ErrorKind::InvalidVertex(text.to_string()), None);

    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let mut coords = [0.0; 3];
    for (coord, part) in coords.iter_mut().zip(&parts) {
        *coord = part.parse::<f64>().map_err(|_| invalid())?;
    }

    Ok(Vec3::new(coords[0], coords[1], coords[2]))
}

/// Build the mesh of a `cube(...)` literal from its eight vertex strings
pub fn cube(vertices: &[String]) -> Result<SceneObject> {
    if vertices.len() != 8 {
        return Err(SceneError::new(ErrorKind::InvalidCube(vertices.len()), None));
    }

    let vertices = vertices
        .iter()
        .map(|v| parse_vertex(v))
        .collect::<Result<Vec<_>>>()?;

    let faces = CUBE_FACES
        .iter()
        .map(|quad| Face {
            indices: quad.to_vec(),
            material: None,
        })
        .collect();

    Ok(SceneObject::mesh(vertices, faces))
}

/// One evaluated `modifier.<kind> { ... }` operation
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Pyramid { height: f64, direction: Direction },
    Scale(Vec3),
    Translate(Vec3),
    /// Axis and angle in degrees
    Rotate(Vec<(Axis, f64)>),
}

impl Modifier {
    /// Property names a modifier kind accepts besides `base`
    pub fn property_names(kind: &str) -> Option<&'static [&'static str]> {
        match kind {
            "pyramid" => Some(&["height", "direction"]),
            "scale" => Some(&["factor"]),
            "translate" => Some(&["offset"]),
            "rotate" => Some(&["axis", "angle"]),
            _ => None,
        }
    }

    /// Build a modifier from its evaluated properties (everything except `base`)
    pub fn from_properties(kind: &str, props: &[(String, Value)]) -> Result<Modifier> {
        let allowed = Self::property_names(kind)
            .ok_or_else(|| SceneError::new(ErrorKind::UnknownModifier(kind.to_string()), None))?;

        if let Some((key, _)) = props.iter().find(|(key, _)| !allowed.contains(&key.as_str())) {
            return Err(SceneError::new(ErrorKind::UnknownProperty(key.clone()), None));
        }

        let prop = |name: &str| find_prop(props, name);

        match kind {
            "pyramid" => {
                let height = match prop("height") {
                    Some(value) => expect_number("height", value)?,
                    None => 1.0,
                };
                let direction = match prop("direction") {
                    Some(value) => parse_direction(value)?,
                    None => Direction::Up,
                };
                Ok(Modifier::Pyramid { height, direction })
            }
            "scale" => {
                let value = prop("factor").ok_or_else(|| missing("factor"))?;
                let factor = match value {
                    Value::Number(n) => Vec3::splat(*n),
                    other => expect_vector("factor", other)?,
                };
                Ok(Modifier::Scale(factor))
            }
            "translate" => {
                let value = prop("offset").ok_or_else(|| missing("offset"))?;
                Ok(Modifier::Translate(expect_vector("offset", value)?))
            }
            _ => {
                let angles = prop("angle").ok_or_else(|| missing("angle"))?;
                let axes = prop("axis").cloned().unwrap_or_else(|| Value::String("y".to_string()));
                Ok(Modifier::Rotate(rotation_pairs(&axes, angles)?))
            }
        }
    }

    /// Apply to an already cloned object
    pub fn apply(&self, mut object: SceneObject) -> Result<SceneObject> {
        match self {
            Modifier::Pyramid { height, direction } => {
                let vertices = match &object.shape {
                    Shape::Mesh { vertices, .. } | Shape::Pyramid { vertices, .. } => vertices.clone(),
                    Shape::Group { .. } => {
                        return Err(SceneError::new(
                            ErrorKind::TypeMismatch("geometry".to_string(), "group".to_string()),
                            None,
                        ))
                    }
                };
                object.shape = Shape::Pyramid {
                    vertices,
                    height: *height,
                    direction: *direction,
                };
            }
            Modifier::Scale(factor) => object.scale = object.scale.mul(*factor),
            Modifier::Translate(offset) => object.pos = object.pos.add(*offset),
            Modifier::Rotate(pairs) => {
                for (axis, degrees) in pairs {
                    *object.rot.axis_mut(*axis) += degrees.to_radians();
                }
            }
        }
        Ok(object)
    }
}

fn find_prop<'a>(props: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    props.iter().find(|(key, _)| key == name).map(|(_, value)| value)
}

fn missing(name: &str) -> SceneError {
    SceneError::new(ErrorKind::MissingProperty(name.to_string()), None)
}

fn mismatch(expected: &str, got: &Value) -> SceneError {
    SceneError::new(
        ErrorKind::TypeMismatch(expected.to_string(), got.type_name().to_string()),
        None,
    )
}

fn expect_number(name: &str, value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| mismatch(&format!("number for '{}'", name), value))
}

fn expect_vector(name: &str, value: &Value) -> Result<Vec3> {
    value
        .as_vector()
        .ok_or_else(|| mismatch(&format!("x, y, z for '{}'", name), value))
}

fn parse_axis(value: &Value) -> Result<Axis> {
    match value {
        Value::String(s) => Axis::parse(s).ok_or_else(|| mismatch("axis x, y or z", value)),
        other => Err(mismatch("axis x, y or z", other)),
    }
}

fn parse_direction(value: &Value) -> Result<Direction> {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("up") => Ok(Direction::Up),
        Value::String(s) if s.eq_ignore_ascii_case("down") => Ok(Direction::Down),
        other => Err(mismatch("direction \"up\" or \"down\"", other)),
    }
}

/// Pair up a single axis/angle or parallel axis/angle lists
fn rotation_pairs(axes: &Value, angles: &Value) -> Result<Vec<(Axis, f64)>> {
    match (axes, angles) {
        (Value::List(axes), Value::List(angles)) => {
            if axes.len() != angles.len() {
                return Err(SceneError::new(
                    ErrorKind::TypeMismatch(
                        format!("{} angles", axes.len()),
                        format!("{}", angles.len()),
                    ),
                    None,
                ));
            }
            axes.iter()
                .zip(angles)
                .map(|(axis, angle)| -> Result<(Axis, f64)> {
                    Ok((parse_axis(axis)?, expect_number("angle", angle)?))
                })
                .collect()
        }
        (Value::List(_), other) => Err(mismatch("list of angles", other)),
        (axis, angle) => Ok(vec![(parse_axis(axis)?, expect_number("angle", angle)?)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_strings() -> Vec<String> {
        ["0,0,0", "1,0,0", "1,1,0", "0,1,0", "0,0,1", "1,0,1", "1,1,1", "0,1,1"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn props(entries: Vec<(&str, Value)>) -> Vec<(String, Value)> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_parse_vertex() {
        assert_eq!(parse_vertex(" 1, -2.5 ,3").unwrap(), Vec3::new(1.0, -2.5, 3.0));
        assert!(parse_vertex("1,2").is_err());
        assert!(parse_vertex("1,a,3").is_err());
    }

    #[test]
    fn test_cube_topology() {
        let object = cube(&unit_cube_strings()).unwrap();
        assert_eq!(object.vertices().len(), 8);
        let faces: Vec<Vec<usize>> = object.faces().iter().map(|f| f.indices.clone()).collect();
        assert_eq!(faces, vec![
            vec![0, 1, 2, 3],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ]);
    }

    #[test]
    fn test_cube_requires_eight_vertices() {
        let mut strings = unit_cube_strings();
        strings.pop();
        let err = cube(&strings).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCube(7));
    }

    #[test]
    fn test_scale_and_translate() {
        let base = cube(&unit_cube_strings()).unwrap();

        let scaled = Modifier::from_properties("scale", &props(vec![("factor", Value::Number(2.0))]))
            .unwrap()
            .apply(base.clone())
            .unwrap();
        assert_eq!(scaled.scale, Vec3::splat(2.0));

        let offset = Value::List(vec![Value::Number(1.0), Value::Number(0.0), Value::Number(-1.0)]);
        let moved = Modifier::from_properties("translate", &props(vec![("offset", offset)]))
            .unwrap()
            .apply(base)
            .unwrap();
        assert_eq!(moved.pos, Vec3::new(1.0, 0.0, -1.0));
    }

    #[test]
    fn test_rotate_with_parallel_lists() {
        let axes = Value::List(vec![Value::String("x".into()), Value::String("z".into())]);
        let angles = Value::List(vec![Value::Number(90.0), Value::Number(180.0)]);
        let modifier = Modifier::from_properties("rotate", &props(vec![("axis", axes), ("angle", angles)])).unwrap();
        let rotated = modifier.apply(SceneObject::group(vec![])).unwrap();
        assert!((rotated.rot.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((rotated.rot.z - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(rotated.rot.y, 0.0);
    }

    #[test]
    fn test_rotate_defaults_to_y_axis() {
        let modifier = Modifier::from_properties("rotate", &props(vec![("angle", Value::Number(180.0))])).unwrap();
        assert_eq!(modifier, Modifier::Rotate(vec![(Axis::Y, 180.0)]));
    }

    #[test]
    fn test_pyramid() {
        let base = cube(&unit_cube_strings()).unwrap();
        let modifier = Modifier::from_properties(
            "pyramid",
            &props(vec![("height", Value::Number(3.0)), ("direction", Value::String("down".into()))]),
        )
        .unwrap();
        let pyramid = modifier.apply(base).unwrap();
        assert_eq!(pyramid.kind_name(), "pyramid");
        assert!(matches!(pyramid.shape, Shape::Pyramid { height, direction: Direction::Down, .. } if height == 3.0));

        let err = modifier.apply(SceneObject::group(vec![])).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch(..)));
    }

    #[test]
    fn test_unknown_modifier_and_property() {
        let err = Modifier::from_properties("twist", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownModifier("twist".to_string()));

        let err = Modifier::from_properties("scale", &props(vec![("amount", Value::Number(1.0))])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownProperty("amount".to_string()));

        let err = Modifier::from_properties("translate", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingProperty("offset".to_string()));
    }
}
