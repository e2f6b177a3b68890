use scenelang::compile;
use scenelang::interpreter::{interpret, ModuleTable, MAX_LOOP_ITERATIONS};
use scenelang::scene::{Shape, Vec3};
use scenelang::{parse, tokenize, LoaderConfig, ModuleLoader};
use scenelang::loader::FileTable;

const UNIT_CUBE: &str = r#"cube("0,0,0":"1,0,0":"1,1,0":"0,1,0":"0,0,1":"1,0,1":"1,1,1":"0,1,1")"#;

#[test]
fn test_cube_expands_to_six_quads() {
    let result = compile(&format!("box = {}", UNIT_CUBE));
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let cube = &result.scene_graph["box"];
    assert_eq!(cube.vertices().len(), 8);
    let faces: Vec<Vec<usize>> = cube.faces().iter().map(|f| f.indices.clone()).collect();
    assert_eq!(
        faces,
        vec![
            vec![0, 1, 2, 3],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ]
    );
}

#[test]
fn test_mesh_literal_and_print() {
    let source = r#"a = mesh{ vertices=[0,0,0;1,0,0;1,1,0;]; faces=[0,1,2;]; } console.print("ok")"#;
    let result = compile(source);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let mesh = &result.scene_graph["a"];
    assert_eq!(mesh.vertices().len(), 3);
    assert_eq!(mesh.faces().len(), 1);
    assert_eq!(mesh.faces()[0].indices, vec![0, 1, 2]);
    assert_eq!(result.logs, vec!["ok"]);
}

#[test]
fn test_for_loop_logs_in_order() {
    let result = compile("for i = 1 to 3 { console.print(i) }");
    assert_eq!(result.logs, vec!["1", "2", "3"]);
    assert!(result.errors.is_empty());
}

#[test]
fn test_infinite_while_stops_at_cap() {
    let result = compile("count = 0\nwhile 1 == 1 { count = count + 1 }\nconsole.print(count)\nconsole.print(\"after\")");
    assert_eq!(result.logs, vec![MAX_LOOP_ITERATIONS.to_string(), "after".to_string()]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("iterations"));
}

#[test]
fn test_empty_infinite_while() {
    let result = compile("while 1 == 1 { }");
    assert_eq!(result.errors.len(), 1);
}

#[test]
fn test_group_reparents_children() {
    let source = format!(
        "a = {cube}\nb = {cube}\ngrp = group[a, b]\na.pos = 1, 2, 3",
        cube = UNIT_CUBE
    );
    let result = compile(&source);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let graph = &result.scene_graph;
    assert_eq!(graph["grp"].children().to_vec(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(graph["a"].parent.as_deref(), Some("grp"));
    assert_eq!(graph["b"].parent.as_deref(), Some("grp"));
    assert_eq!(graph["a"].pos, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(graph["grp"].id, "grp");
}

/// Group links are wired when the group is assigned. Rebinding a child name
/// afterwards leaves the new object unparented.
#[test]
fn test_child_reassignment_is_not_relinked() {
    let source = format!(
        "a = {cube}\ngrp = group[a]\na = {cube}",
        cube = UNIT_CUBE
    );
    let result = compile(&source);

    let graph = &result.scene_graph;
    assert_eq!(graph["grp"].children().to_vec(), vec!["a".to_string()]);
    assert_eq!(graph["a"].parent, None);
}

#[test]
fn test_runtime_errors_are_contained() {
    let source = format!(
        "a = {cube}\nmissing.pos = 1, 1, 1\nbad = cube(\"0,0,0\")\nconsole.print(nothing)\na.move(0, 1, 0)\nconsole.print(a.pos)",
        cube = UNIT_CUBE
    );
    let result = compile(&source);
    assert_eq!(result.logs, vec!["(0, 1, 0)"]);
    assert_eq!(result.errors.len(), 3);
    assert!(result.errors[0].contains("line 2"));
    assert!(result.errors[1].contains("line 3"));
    assert!(result.errors[2].contains("line 4"));
    assert!(!result.scene_graph.contains_key("bad"));
}

#[test]
fn test_syntax_error_aborts_file() {
    let result = compile("console.print(1)\nx = mesh { vertices = [0,0,0;] faces = [0,1;] }");
    assert!(result.logs.is_empty());
    assert!(result.scene_graph.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("Syntax error"));
    assert!(result.errors[0].contains("line 2"));
}

#[test]
fn test_unresolved_face_material_is_warning() {
    let result = compile("m = mesh { vertices = [0,0,0; 1,0,0; 0,1,0;] faces = [0,1,2: lib.gold;] }");
    assert_eq!(result.scene_graph["m"].faces()[0].material, None);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Warning: "));
    assert_eq!(result.fatal_errors().count(), 0);
}

#[test]
fn test_modifier_pyramid_keeps_base_untouched() {
    let source = format!(
        "base = {cube}\nroof = modifier.pyramid {{ base = base, height = 2, direction = \"down\" }}\nroof.pos = @base + 0, 1, 0",
        cube = UNIT_CUBE
    );
    let result = compile(&source);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let graph = &result.scene_graph;
    assert_eq!(graph["base"].kind_name(), "mesh");
    assert!(matches!(graph["roof"].shape, Shape::Pyramid { height, .. } if height == 2.0));
    assert_eq!(graph["roof"].pos, Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_scene_graph_json_shape() {
    let source = format!(
        "red = material {{ color = RED }}\na = {cube}\na.material = red\ng = group[a]",
        cube = UNIT_CUBE
    );
    let result = compile(&source);
    let json: serde_json::Value = serde_json::from_str(&result.scene_json().unwrap()).unwrap();

    assert_eq!(json["a"]["shape"], "mesh");
    assert_eq!(json["a"]["parent"], "g");
    assert_eq!(json["a"]["faces"].as_array().map(Vec::len), Some(6));
    assert_eq!(json["a"]["material"]["color"], "#ff0000");
    assert_eq!(json["g"]["shape"], "group");
    assert_eq!(json["g"]["children"][0], "a");
    assert_eq!(json["g"]["scale"]["x"], 1.0);
}

#[test]
fn test_interpretation_is_deterministic() {
    let source = format!(
        "a = {cube}\nfor i = 1 to 4 {{ a.move(i, 0, 0)\nconsole.print(a.pos.x) }}\nb = modifier.rotate {{ base = a, angle = 45 }}\ng = group[a, b]",
        cube = UNIT_CUBE
    );
    let program = parse(tokenize(&source)).unwrap();

    let first = interpret(&program, &ModuleTable::new());
    let second = interpret(&program, &ModuleTable::new());
    assert_eq!(first.logs, second.logs);
    assert_eq!(first.scene_json().unwrap(), second.scene_json().unwrap());
}

#[test]
fn test_seeded_random_is_reproducible() {
    let source = "import random\nx = random.range(0, 10)\nconsole.print(x)";
    let config = LoaderConfig { seed: 99, ..LoaderConfig::default() };

    let mut loader = ModuleLoader::offline(config.clone());
    let first = loader.compile(source, &FileTable::new());
    let again = loader.compile(source, &FileTable::new());
    let fresh = ModuleLoader::offline(config).compile(source, &FileTable::new());

    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert_eq!(first.logs, again.logs);
    assert_eq!(first.logs, fresh.logs);
}

#[test]
fn test_unresolvable_import_does_not_crash() {
    let result = compile("import nowhere as n\nx = 1\nconsole.print(x)\nconsole.print(n)");
    assert_eq!(result.logs, vec!["1"]);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].contains("module 'nowhere' not found"));
    assert!(result.errors[1].contains("undefined variable 'n'"));
}
