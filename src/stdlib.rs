//! Built-in libraries
//!
//! `math`, `vector` and `random` are importable by name and resolve before any
//! workspace file or URL. Each library is an export table of native functions
//! (plus a few constants), the same shape a compiled module exports.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::scene::Vec3;
use crate::value::{Exports, NativeFn, Value};

/// Build every built-in library. `seed` drives the `random` library.
pub fn libraries(seed: u64) -> BTreeMap<String, Rc<Exports>> {
    let mut libs = BTreeMap::new();
    libs.insert("math".to_string(), Rc::new(math()));
    libs.insert("vector".to_string(), Rc::new(vector()));
    libs.insert("random".to_string(), Rc::new(random(seed)));
    libs
}

fn register(exports: &mut Exports, native: NativeFn) {
    exports.insert(native.name.clone(), Value::Native(native));
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!("{}() takes {} argument(s), got {}", name, expected, args.len()));
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> Result<f64, String> {
    value
        .as_number()
        .ok_or_else(|| format!("{}() expects numbers, got {}", name, value.type_name()))
}

fn vec3(name: &str, value: &Value) -> Result<Vec3, String> {
    value
        .as_vector()
        .ok_or_else(|| format!("{}() expects vectors, got {}", name, value.type_name()))
}

/// One-argument numeric function
fn unary(name: &'static str, f: fn(f64) -> f64) -> NativeFn {
    NativeFn::new(name, move |args| {
        arity(name, args, 1)?;
        Ok(Value::Number(f(number(name, &args[0])?)))
    })
}

/// Two-argument numeric function
fn binary(name: &'static str, f: fn(f64, f64) -> f64) -> NativeFn {
    NativeFn::new(name, move |args| {
        arity(name, args, 2)?;
        Ok(Value::Number(f(number(name, &args[0])?, number(name, &args[1])?)))
    })
}

fn math() -> Exports {
    let mut exports = Exports::new();

    let natives = vec![
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("asin", f64::asin),
        unary("acos", f64::acos),
        unary("atan", f64::atan),
        unary("sqrt", f64::sqrt),
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", f64::round),
        unary("radians", f64::to_radians),
        unary("degrees", f64::to_degrees),
        binary("atan2", f64::atan2),
        binary("pow", f64::powf),
        binary("min", f64::min),
        binary("max", f64::max),
        // clamp(x, lo, hi)
        NativeFn::new("clamp", |args| {
            arity("clamp", args, 3)?;
            let x = number("clamp", &args[0])?;
            let lo = number("clamp", &args[1])?;
            let hi = number("clamp", &args[2])?;
            if lo > hi {
                return Err(format!("clamp() lower bound {} exceeds upper bound {}", lo, hi));
            }
            Ok(Value::Number(x.clamp(lo, hi)))
        }),
        // lerp(a, b, t)
        NativeFn::new("lerp", |args| {
            arity("lerp", args, 3)?;
            let a = number("lerp", &args[0])?;
            let b = number("lerp", &args[1])?;
            let t = number("lerp", &args[2])?;
            Ok(Value::Number(a + (b - a) * t))
        }),
    ];

    for native in natives {
        register(&mut exports, native);
    }
    exports.insert("pi".to_string(), Value::Number(PI));
    exports.insert("tau".to_string(), Value::Number(TAU));
    exports
}

fn vector() -> Exports {
    let mut exports = Exports::new();

    let natives = vec![
        NativeFn::new("vec3", |args| {
            arity("vec3", args, 3)?;
            Ok(Value::Vector(Vec3::new(
                number("vec3", &args[0])?,
                number("vec3", &args[1])?,
                number("vec3", &args[2])?,
            )))
        }),
        NativeFn::new("add", |args| {
            arity("add", args, 2)?;
            Ok(Value::Vector(vec3("add", &args[0])?.add(vec3("add", &args[1])?)))
        }),
        NativeFn::new("sub", |args| {
            arity("sub", args, 2)?;
            Ok(Value::Vector(vec3("sub", &args[0])?.sub(vec3("sub", &args[1])?)))
        }),
        NativeFn::new("scale", |args| {
            arity("scale", args, 2)?;
            Ok(Value::Vector(vec3("scale", &args[0])?.scale(number("scale", &args[1])?)))
        }),
        NativeFn::new("dot", |args| {
            arity("dot", args, 2)?;
            Ok(Value::Number(vec3("dot", &args[0])?.dot(vec3("dot", &args[1])?)))
        }),
        NativeFn::new("cross", |args| {
            arity("cross", args, 2)?;
            Ok(Value::Vector(vec3("cross", &args[0])?.cross(vec3("cross", &args[1])?)))
        }),
        NativeFn::new("length", |args| {
            arity("length", args, 1)?;
            Ok(Value::Number(vec3("length", &args[0])?.length()))
        }),
        NativeFn::new("normalize", |args| {
            arity("normalize", args, 1)?;
            let v = vec3("normalize", &args[0])?;
            let len = v.length();
            if len == 0.0 {
                return Err("normalize() of a zero-length vector".to_string());
            }
            Ok(Value::Vector(Vec3::new(v.x / len, v.y / len, v.z / len)))
        }),
        NativeFn::new("distance", |args| {
            arity("distance", args, 2)?;
            let a = vec3("distance", &args[0])?;
            let b = vec3("distance", &args[1])?;
            Ok(Value::Number(a.sub(b).length()))
        }),
    ];

    for native in natives {
        register(&mut exports, native);
    }
    exports
}

/// Seeded so that identical inputs still produce identical scenes
fn random(seed: u64) -> Exports {
    let rng = Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed)));
    let mut exports = Exports::new();

    // random() in [0, 1)
    let state = Rc::clone(&rng);
    register(&mut exports, NativeFn::new("random", move |args| {
        arity("random", args, 0)?;
        Ok(Value::Number(state.borrow_mut().gen::<f64>()))
    }));

    // range(lo, hi) in [lo, hi)
    let state = Rc::clone(&rng);
    register(&mut exports, NativeFn::new("range", move |args| {
        arity("range", args, 2)?;
        let lo = number("range", &args[0])?;
        let hi = number("range", &args[1])?;
        if lo >= hi {
            return Err(format!("range() needs lo < hi, got {} and {}", lo, hi));
        }
        Ok(Value::Number(state.borrow_mut().gen_range(lo..hi)))
    }));

    // int(lo, hi) inclusive
    let state = rng;
    register(&mut exports, NativeFn::new("int", move |args| {
        arity("int", args, 2)?;
        let lo = number("int", &args[0])?.ceil() as i64;
        let hi = number("int", &args[1])?.floor() as i64;
        if lo > hi {
            return Err(format!("int() has no integer between {} and {}", lo, hi));
        }
        Ok(Value::Number(state.borrow_mut().gen_range(lo..=hi) as f64))
    }));

    exports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(lib: &Exports, name: &str, args: &[Value]) -> Result<Value, String> {
        match lib.get(name) {
            Some(Value::Native(f)) => f.call(args),
            other => panic!("{} is not a function: {:?}", name, other),
        }
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_math_functions() {
        let math = math();
        assert_eq!(call(&math, "sqrt", &[n(16.0)]), Ok(n(4.0)));
        assert_eq!(call(&math, "max", &[n(2.0), n(7.0)]), Ok(n(7.0)));
        assert_eq!(call(&math, "clamp", &[n(5.0), n(0.0), n(1.0)]), Ok(n(1.0)));
        assert_eq!(call(&math, "lerp", &[n(0.0), n(10.0), n(0.25)]), Ok(n(2.5)));
        let degrees = call(&math, "degrees", &[n(PI)]).unwrap().as_number().unwrap();
        assert!((degrees - 180.0).abs() < 1e-9);
        assert_eq!(math.get("pi"), Some(&n(PI)));
    }

    #[test]
    fn test_math_argument_errors() {
        let math = math();
        let err = call(&math, "sin", &[]).unwrap_err();
        assert!(err.contains("takes 1 argument"));
        let err = call(&math, "abs", &[Value::String("x".into())]).unwrap_err();
        assert!(err.contains("expects numbers"));
    }

    #[test]
    fn test_vector_functions() {
        let vector = vector();
        let x = Value::Vector(Vec3::new(1.0, 0.0, 0.0));
        let y = Value::List(vec![n(0.0), n(1.0), n(0.0)]);
        assert_eq!(call(&vector, "cross", &[x.clone(), y.clone()]), Ok(Value::Vector(Vec3::new(0.0, 0.0, 1.0))));
        assert_eq!(call(&vector, "dot", &[x.clone(), y]), Ok(n(0.0)));
        assert_eq!(
            call(&vector, "normalize", &[Value::Vector(Vec3::new(0.0, 3.0, 4.0))]),
            Ok(Value::Vector(Vec3::new(0.0, 0.6, 0.8)))
        );
        assert!(call(&vector, "normalize", &[Value::Vector(Vec3::ZERO)]).is_err());
        assert_eq!(call(&vector, "distance", &[x, Value::Vector(Vec3::new(4.0, 4.0, 0.0))]), Ok(n(5.0)));
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let draw = |seed| {
            let lib = random(seed);
            (0..5)
                .map(|_| call(&lib, "random", &[]).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
    }

    #[test]
    fn test_random_ranges() {
        let lib = random(42);
        for _ in 0..100 {
            let v = call(&lib, "range", &[n(2.0), n(3.0)]).unwrap().as_number().unwrap();
            assert!((2.0..3.0).contains(&v));
            let i = call(&lib, "int", &[n(1.0), n(6.0)]).unwrap().as_number().unwrap();
            assert!((1.0..=6.0).contains(&i) && i.fract() == 0.0);
        }
        assert!(call(&lib, "range", &[n(3.0), n(3.0)]).is_err());
    }

    #[test]
    fn test_library_table() {
        let libs = libraries(0);
        assert_eq!(libs.keys().cloned().collect::<Vec<_>>(), vec!["math", "random", "vector"]);
    }
}
