use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use scenelang::error::{ErrorKind, Result, SceneError};
use scenelang::loader::{fallback_program, load_workspace, Fetch, FileTable};
use scenelang::value::Value;
use scenelang::{LoaderConfig, ModuleLoader};

/// Serves canned responses and counts requests per URL
#[derive(Clone, Default)]
struct StubFetcher {
    responses: HashMap<String, String>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl StubFetcher {
    fn serving(entries: &[(&str, &str)]) -> Self {
        Self {
            responses: entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            requests: Rc::default(),
        }
    }
}

impl Fetch for StubFetcher {
    fn fetch(&mut self, url: &str) -> Result<String> {
        self.requests.borrow_mut().push(url.to_string());
        self.responses.get(url).cloned().ok_or_else(|| {
            SceneError::new(ErrorKind::FetchFailed(url.to_string(), "404 Not Found".to_string()), None)
        })
    }
}

fn files(entries: &[(&str, &str)]) -> FileTable {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

const TREE_URL: &str = "https://assets.example.com/kit/tree.scene";

#[test]
fn test_url_import_is_fetched_once() {
    let stub = StubFetcher::serving(&[(TREE_URL, "height = 4\nconsole.print(\"tree loaded\")")]);
    let requests = Rc::clone(&stub.requests);
    let mut loader = ModuleLoader::with_fetcher(LoaderConfig::default(), stub);

    let source = format!(
        "import \"{url}\"\nimport height from \"{url}\" as h\nconsole.print(tree.height + h)",
        url = TREE_URL
    );
    let result = loader.compile(&source, &FileTable::new());
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.logs, vec!["8"]);

    // Module logs are not forwarded to the importer
    assert!(!result.logs.iter().any(|l| l == "tree loaded"));

    loader.compile(&source, &FileTable::new());
    assert_eq!(*requests.borrow(), vec![TREE_URL.to_string()]);
    assert_eq!(loader.cache().len(), 1);
    assert_eq!(loader.cache().hits(), 3);
}

#[test]
fn test_failed_fetch_is_cached_as_fallback() {
    let stub = StubFetcher::default();
    let requests = Rc::clone(&stub.requests);
    let mut loader = ModuleLoader::with_fetcher(LoaderConfig::default(), stub);

    let source = format!("import \"{}\" as t\nconsole.print(\"done\")", TREE_URL);
    let first = loader.compile(&source, &FileTable::new());
    assert_eq!(first.logs, vec!["done"]);
    assert_eq!(first.errors.len(), 1);
    assert!(first.errors[0].starts_with("Warning: "));
    assert!(first.errors[0].contains("404 Not Found"));

    let second = loader.compile(&source, &FileTable::new());
    assert_eq!(second.logs, vec!["done"]);
    assert_eq!(requests.borrow().len(), 1);
    assert!(fallback_program(TREE_URL).contains(TREE_URL));
}

#[test]
fn test_isolated_loaders_have_isolated_caches() {
    let stub = StubFetcher::serving(&[(TREE_URL, "height = 4")]);
    let requests = Rc::clone(&stub.requests);
    let source = format!("import \"{}\"", TREE_URL);

    ModuleLoader::with_fetcher(LoaderConfig::default(), stub.clone()).compile(&source, &FileTable::new());
    ModuleLoader::with_fetcher(LoaderConfig::default(), stub).compile(&source, &FileTable::new());
    assert_eq!(requests.borrow().len(), 2);
}

#[test]
fn test_transitive_imports_and_module_dir() {
    let workspace = files(&[
        ("main.scene", "import parts\nconsole.print(parts.wheel_count)"),
        ("lib/parts.scene", "import radius from sizes\nwheel_count = 4\nrim = radius * 2"),
        ("lib/sizes.scene", "radius = 0.5"),
    ]);
    let config = LoaderConfig {
        module_dir: "lib".to_string(),
        ..LoaderConfig::default()
    };
    let mut loader = ModuleLoader::offline(config);

    let result = loader.compile_file("main.scene", &workspace);
    assert_eq!(result.logs, vec!["4"]);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
}

#[test]
fn test_imported_objects_stay_out_of_importer_scene() {
    let workspace = files(&[(
        "props.scene",
        "crate = cube(\"0,0,0\":\"1,0,0\":\"1,1,0\":\"0,1,0\":\"0,0,1\":\"1,0,1\":\"1,1,1\":\"0,1,1\")",
    )]);
    let mut loader = ModuleLoader::offline(LoaderConfig::default());

    let result = loader.compile("import crate from props\nmine = crate\nmine.pos = 0, 2, 0", &workspace);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.scene_graph.keys().collect::<Vec<_>>(), vec!["mine"]);
    assert_eq!(result.scene_graph["mine"].id, "mine");
}

#[test]
fn test_cycle_through_three_files() {
    let workspace = files(&[
        ("a.scene", "import b\nfrom_a = 1"),
        ("b.scene", "import c\nfrom_b = 2"),
        ("c.scene", "import a\nfrom_c = 3"),
    ]);
    let mut loader = ModuleLoader::offline(LoaderConfig::default());

    let result = loader.compile_file("a.scene", &workspace);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("a.scene -> b.scene -> c.scene -> a.scene"));
    assert_eq!(result.scope.get("from_a"), Some(&Value::Number(1.0)));
}

#[test]
fn test_rebound_import_is_exported() {
    let workspace = files(&[
        ("consts.scene", "a = 1"),
        ("mid.scene", "import a from consts\na = a + 10\nb = a"),
    ]);
    let mut loader = ModuleLoader::offline(LoaderConfig::default());

    let result = loader.compile("import mid\nconsole.print(mid.b)\nconsole.print(mid.a)", &workspace);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.logs, vec!["11", "11"]);
}

#[test]
fn test_unassigned_import_is_not_reexported() {
    let workspace = files(&[
        ("consts.scene", "a = 1"),
        ("mid.scene", "import a from consts\nb = a"),
    ]);
    let mut loader = ModuleLoader::offline(LoaderConfig::default());

    let result = loader.compile("import mid\nconsole.print(mid.b)\nconsole.print(mid.a)", &workspace);
    assert_eq!(result.logs, vec!["1"]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("'mid' has no member 'a'"));
}

#[test]
fn test_missing_named_export() {
    let workspace = files(&[("consts.scene", "a = 1")]);
    let mut loader = ModuleLoader::offline(LoaderConfig::default());

    let result = loader.compile("import a, z from consts\nconsole.print(a)", &workspace);
    assert_eq!(result.logs, vec!["1"]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("'consts' has no member 'z'"));
}

#[test]
fn test_library_errors_surface_as_runtime_errors() {
    let mut loader = ModuleLoader::offline(LoaderConfig::default());
    let result = loader.compile(
        "import vector\nv = vector.vec3(1, 2)\nn = vector.normalize(vector.vec3(3, 0, 4))\nconsole.print(n)",
        &FileTable::new(),
    );
    assert_eq!(result.logs, vec!["(0.6, 0, 0.8)"]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("vector.vec3"));
}

#[test]
fn test_load_workspace_walks_directories() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.scene"), "import shapes").unwrap();
    fs::create_dir(dir.path().join("modules")).unwrap();
    fs::write(dir.path().join("modules").join("shapes.scene"), "size = 2").unwrap();
    fs::write(dir.path().join("notes.txt"), "not a scene").unwrap();
    fs::create_dir(dir.path().join(".cache")).unwrap();
    fs::write(dir.path().join(".cache").join("old.scene"), "x = 1").unwrap();

    let table = load_workspace(dir.path(), "scene").unwrap();
    assert_eq!(
        table.keys().cloned().collect::<Vec<_>>(),
        vec!["main.scene".to_string(), "modules/shapes.scene".to_string()]
    );

    let mut loader = ModuleLoader::offline(LoaderConfig::default());
    let result = loader.compile("import shapes\nconsole.print(shapes.size)", &table);
    assert_eq!(result.logs, vec!["2"]);
}
