//! Module loader
//!
//! Compiles a root file together with its transitive imports. Each import is
//! compiled recursively through the same pipeline and only its exported scope
//! is kept. Sources are resolved in order: built-in library, URL fetch
//! (memoized per loader), workspace file table.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::ast::{Program, Stmt};
use crate::error::{ErrorKind, Result, SceneError, WARNING_PREFIX};
use crate::interpreter::{interpret, CompileResult, ModuleTable};
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::stdlib;
use crate::token::Span;
use crate::value::{Exports, Value};

/// Workspace files: name (relative path) to source text
pub type FileTable = BTreeMap<String, String>;

/// Name the root source is compiled under
pub const MAIN_MODULE: &str = "<main>";

/// Source of remote module text
pub trait Fetch {
    fn fetch(&mut self, url: &str) -> Result<String>;
}

/// Refuses every request
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

impl Fetch for OfflineFetcher {
    fn fetch(&mut self, url: &str) -> Result<String> {
        Err(SceneError::new(
            ErrorKind::FetchFailed(url.to_string(), "network access is disabled".to_string()),
            None,
        ))
    }
}

/// Blocking HTTP(S) fetcher
#[cfg(feature = "net")]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "net")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

#[cfg(feature = "net")]
impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "net")]
impl Fetch for HttpFetcher {
    fn fetch(&mut self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| SceneError::new(ErrorKind::FetchFailed(url.to_string(), e.to_string()), None))
    }
}

/// URL to source text. Never evicted; fallbacks are cached too, so each URL
/// reaches the fetcher at most once per loader.
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: HashMap<String, String>,
    hits: usize,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, url: &str) -> Option<&String> {
        let entry = self.entries.get(url);
        if entry.is_some() {
            self.hits += 1;
        }
        entry
    }

    pub fn insert(&mut self, url: String, text: String) {
        self.entries.insert(url, text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// Loader settings
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Language file extension, without the dot
    pub extension: String,
    /// Conventional subdirectory searched for local modules
    pub module_dir: String,
    /// Substitute a stub module when a fetch fails instead of reporting an error
    pub fallback_on_fetch_error: bool,
    /// Seed for the `random` library
    pub seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: "scene".to_string(),
            module_dir: "modules".to_string(),
            fallback_on_fetch_error: true,
            seed: 0,
        }
    }
}

/// Compiles programs and their imports
pub struct ModuleLoader {
    config: LoaderConfig,
    fetcher: Box<dyn Fetch>,
    cache: FetchCache,
    libraries: BTreeMap<String, Rc<Exports>>,
    /// Modules currently being compiled, outermost first
    stack: Vec<String>,
}

impl ModuleLoader {
    /// Loader using the HTTP fetcher when the `net` feature is enabled
    pub fn new(config: LoaderConfig) -> Self {
        #[cfg(feature = "net")]
        let fetcher: Box<dyn Fetch> = Box::new(HttpFetcher::new());
        #[cfg(not(feature = "net"))]
        let fetcher: Box<dyn Fetch> = Box::new(OfflineFetcher);
        Self::from_parts(config, fetcher)
    }

    pub fn offline(config: LoaderConfig) -> Self {
        Self::from_parts(config, Box::new(OfflineFetcher))
    }

    pub fn with_fetcher(config: LoaderConfig, fetcher: impl Fetch + 'static) -> Self {
        Self::from_parts(config, Box::new(fetcher))
    }

    fn from_parts(config: LoaderConfig, fetcher: Box<dyn Fetch>) -> Self {
        let libraries = stdlib::libraries(config.seed);
        Self {
            config,
            fetcher,
            cache: FetchCache::new(),
            libraries,
            stack: Vec::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Compile root source text against a workspace file table
    pub fn compile(&mut self, source: &str, files: &FileTable) -> CompileResult {
        self.compile_root(MAIN_MODULE, source, files)
    }

    /// Compile root source text known to the workspace as `name`, so a
    /// module importing the root is reported as a cycle
    pub fn compile_root(&mut self, name: &str, source: &str, files: &FileTable) -> CompileResult {
        self.libraries = stdlib::libraries(self.config.seed);
        self.stack.clear();
        self.compile_unit(name, source, files)
    }

    /// Compile a file from the table as the root
    pub fn compile_file(&mut self, name: &str, files: &FileTable) -> CompileResult {
        match files.get(name) {
            Some(source) => self.compile_root(name, source, files),
            None => CompileResult::failed(
                SceneError::new(ErrorKind::ModuleNotFound(name.to_string()), None).to_string(),
            ),
        }
    }

    fn compile_unit(&mut self, key: &str, source: &str, files: &FileTable) -> CompileResult {
        let program = match parse(tokenize(source)) {
            Ok(program) => program,
            Err(e) => return CompileResult::failed(e.with_source(source).to_string()),
        };

        self.stack.push(key.to_string());
        let mut diagnostics = Vec::new();
        let modules = self.resolve_imports(&program, files, &mut diagnostics);
        self.stack.pop();

        let mut result = interpret(&program, &modules);
        diagnostics.append(&mut result.errors);
        result.errors = diagnostics;
        result
    }

    /// Resolve every top-level import and apply the binding policy
    fn resolve_imports(
        &mut self,
        program: &Program,
        files: &FileTable,
        diagnostics: &mut Vec<String>,
    ) -> ModuleTable {
        let mut table = ModuleTable::new();

        for stmt in program.imports() {
            let Stmt::Import { names, source, alias, span } = stmt else {
                continue;
            };

            let exports = match self.load_module(source, files, *span, diagnostics) {
                Ok(exports) => exports,
                Err(e) => {
                    if matches!(e.kind, ErrorKind::ModuleNotFound(_)) {
                        warn!("{}", e.kind);
                        diagnostics.push(format!("{}{} (line {})", WARNING_PREFIX, e.kind, span.line));
                    } else {
                        diagnostics.push(e.to_string());
                    }
                    continue;
                }
            };

            match (names.as_slice(), alias) {
                ([], alias) => {
                    let name = alias.clone().unwrap_or_else(|| self.bare_name(source));
                    debug!("binding module '{}' as '{}'", source, name);
                    table.insert(name, Value::Module(exports));
                }
                ([single], Some(alias)) => {
                    self.bind_export(&mut table, &exports, source, single, alias, *span, diagnostics);
                }
                (names, _) => {
                    for name in names {
                        self.bind_export(&mut table, &exports, source, name, name, *span, diagnostics);
                    }
                }
            }
        }

        table
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_export(
        &self,
        table: &mut ModuleTable,
        exports: &Exports,
        source: &str,
        name: &str,
        bind_as: &str,
        span: Span,
        diagnostics: &mut Vec<String>,
    ) {
        match exports.get(name) {
            Some(value) => {
                table.insert(bind_as.to_string(), value.clone());
            }
            None => {
                let err = SceneError::new(
                    ErrorKind::UndefinedMember(source.to_string(), name.to_string()),
                    Some(span),
                );
                diagnostics.push(err.to_string());
            }
        }
    }

    fn load_module(
        &mut self,
        source: &str,
        files: &FileTable,
        span: Span,
        diagnostics: &mut Vec<String>,
    ) -> Result<Rc<Exports>> {
        if let Some(library) = self.libraries.get(source) {
            debug!("import '{}' resolved to built-in library", source);
            return Ok(Rc::clone(library));
        }

        let (key, text) = if is_url(source) {
            self.check_cycle(source, span)?;
            let text = self.fetch_cached(source, span, diagnostics)?;
            (source.to_string(), text)
        } else {
            let (key, text) = self
                .resolve_local(source, files)
                .ok_or_else(|| SceneError::new(ErrorKind::ModuleNotFound(source.to_string()), Some(span)))?;
            self.check_cycle(&key, span)?;
            (key, text)
        };

        info!("compiling module '{}'", key);
        let result = self.compile_unit(&key, &text, files);

        for line in &result.logs {
            debug!("[{}] {}", key, line);
        }
        for error in &result.errors {
            diagnostics.push(format!("[{}] {}", source, error));
        }

        Ok(Rc::new(result.scope))
    }

    fn check_cycle(&self, key: &str, span: Span) -> Result<()> {
        if let Some(start) = self.stack.iter().position(|k| k == key) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(key.to_string());
            return Err(SceneError::new(ErrorKind::ImportCycle(chain), Some(span)));
        }
        Ok(())
    }

    fn fetch_cached(&mut self, url: &str, span: Span, diagnostics: &mut Vec<String>) -> Result<String> {
        if let Some(text) = self.cache.get(url) {
            debug!("fetch cache hit for '{}'", url);
            return Ok(text.clone());
        }

        match self.fetcher.fetch(url) {
            Ok(text) => {
                info!("fetched '{}' ({} bytes)", url, text.len());
                self.cache.insert(url.to_string(), text.clone());
                Ok(text)
            }
            Err(e) if self.config.fallback_on_fetch_error => {
                warn!("{}; substituting fallback module", e.kind);
                diagnostics.push(format!(
                    "{}[line {}] {}; using fallback module",
                    WARNING_PREFIX, span.line, e.kind
                ));
                let text = fallback_program(url);
                self.cache.insert(url.to_string(), text.clone());
                Ok(text)
            }
            Err(e) => Err(e.or_span(span)),
        }
    }

    /// Try the raw name, the name with the extension, then both under the
    /// module directory. Dotted names are also tried as paths.
    fn resolve_local(&self, name: &str, files: &FileTable) -> Option<(String, String)> {
        let mut bases = vec![name.to_string()];
        let slashed = name.replace('.', "/");
        if slashed != name {
            bases.push(slashed);
        }

        let ext = &self.config.extension;
        let dir = &self.config.module_dir;

        bases
            .iter()
            .flat_map(|base| {
                [
                    base.clone(),
                    format!("{}.{}", base, ext),
                    format!("{}/{}", dir, base),
                    format!("{}/{}.{}", dir, base, ext),
                ]
            })
            .find_map(|candidate| files.get(&candidate).map(|text| (candidate, text.clone())))
    }

    /// Binding name of a bare import: last path segment without the extension
    fn bare_name(&self, source: &str) -> String {
        let segment = source.trim_end_matches('/').rsplit('/').next().unwrap_or(source);
        let suffix = format!(".{}", self.config.extension);
        let segment = segment.strip_suffix(&suffix).unwrap_or(segment);
        segment.rsplit('.').next().unwrap_or(segment).to_string()
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Stand-in module text for an unreachable URL
pub fn fallback_program(url: &str) -> String {
    format!("console.print(\"Could not load module {}\")", url.replace('"', "'"))
}

/// Read every file with the given extension under `root` into a file table,
/// keyed by `/`-separated path relative to `root`
pub fn load_workspace(root: &Path, extension: &str) -> io::Result<FileTable> {
    let mut files = FileTable::new();
    walk(root, root, extension, &mut files)?;
    Ok(files)
}

fn walk(root: &Path, dir: &Path, extension: &str, files: &mut FileTable) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with('.'));
        if hidden {
            continue;
        }

        if path.is_dir() {
            walk(root, &path, extension, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, fs::read_to_string(&path)?);
        }
    }
    Ok(())
}
