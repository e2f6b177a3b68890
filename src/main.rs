//! scenelang CLI and REPL
//!
//! Usage:
//!   scenelang run <file.scene>     - Compile a scene file and print its output
//!   scenelang check <file.scene>   - Parse only
//!   scenelang repl                 - Start interactive REPL
//!   scenelang help                 - Show help message

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use colored::Colorize;
use log::debug;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use scenelang::error::WARNING_PREFIX;
use scenelang::loader::{load_workspace, FileTable};
use scenelang::{parse, tokenize, CompileResult, LoaderConfig, ModuleLoader, VERSION};

/// Options accepted by `run`
#[derive(Debug, Default)]
struct RunOptions {
    json: bool,
    offline: bool,
    seed: Option<u64>,
    module_dir: Option<String>,
}

impl RunOptions {
    fn loader_config(&self) -> LoaderConfig {
        let mut config = LoaderConfig::default();
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dir) = &self.module_dir {
            config.module_dir = dir.clone();
        }
        config
    }

    fn loader(&self) -> ModuleLoader {
        if self.offline {
            ModuleLoader::offline(self.loader_config())
        } else {
            ModuleLoader::new(self.loader_config())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "run" => {
            if args.len() < 3 {
                eprintln!("{}: missing file argument", "error".red());
                eprintln!("Usage: scenelang run <file.scene> [--json] [--offline] [--seed N] [--module-dir DIR]");
                process::exit(1);
            }
            let options = parse_options(&args[3..]);
            run_file(&args[2], &options);
        }
        "check" => {
            if args.len() < 3 {
                eprintln!("{}: missing file argument", "error".red());
                process::exit(1);
            }
            check_file(&args[2]);
        }
        "repl" => run_repl(&parse_options(&args[2..])),
        "help" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-v" => println!("scenelang {}", VERSION),
        _ => {
            // Assume it's a file
            if args[1].ends_with(".scene") {
                run_file(&args[1], &parse_options(&args[2..]));
            } else {
                eprintln!("{}: unknown command '{}'", "error".red(), args[1]);
                print_help();
                process::exit(1);
            }
        }
    }
}

fn parse_options(args: &[String]) -> RunOptions {
    let mut options = RunOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--offline" => options.offline = true,
            "--seed" => {
                let value = iter.next().and_then(|v| v.parse::<u64>().ok());
                match value {
                    Some(seed) => options.seed = Some(seed),
                    None => {
                        eprintln!("{}: --seed needs a non-negative integer", "error".red());
                        process::exit(1);
                    }
                }
            }
            "--module-dir" => match iter.next() {
                Some(dir) => options.module_dir = Some(dir.clone()),
                None => {
                    eprintln!("{}: --module-dir needs a directory", "error".red());
                    process::exit(1);
                }
            },
            other => {
                eprintln!("{}: unknown option '{}'", "error".red(), other);
                process::exit(1);
            }
        }
    }

    options
}

fn print_help() {
    println!("{}", "scenelang".cyan().bold());
    println!("A scene-description language");
    println!("{} {}\n", "Version".cyan(), VERSION);
    println!("{}", "USAGE:".yellow());
    println!("  scenelang run <file.scene>     Compile a file and print logs and errors");
    println!("  scenelang check <file.scene>   Parse a file without running it");
    println!("  scenelang repl                 Start interactive REPL");
    println!("  scenelang help                 Show this help message");
    println!("  scenelang version              Show version\n");
    println!("{}", "OPTIONS:".yellow());
    println!("  --json               Print the scene graph as JSON");
    println!("  --offline            Never fetch URL imports");
    println!("  --seed <n>           Seed for the random library");
    println!("  --module-dir <dir>   Directory searched for local modules\n");
    println!("{}", "LANGUAGE FEATURES:".yellow());
    println!("  box = cube(\"0,0,0\":...)      Cuboid from 8 vertices");
    println!("  red = material {{ color = RED }}");
    println!("  big = modifier.scale {{ base = box, factor = 2 }}");
    println!("  scene = group[box, big]      Parent objects under a group");
    println!("  box.pos = 1, 0, 0            Mutate a transform");
    println!("  console.print(box.pos)       Log a value");
}

fn read_source(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: cannot read file '{}': {}", "error".red(), path, e);
            process::exit(1);
        }
    }
}

/// The directory holding `path`, loaded as the workspace file table
fn workspace_for(path: &Path, extension: &str) -> FileTable {
    let root = workspace_root(path);

    match load_workspace(&root, extension) {
        Ok(files) => {
            debug!("loaded {} workspace file(s) from {}", files.len(), root.display());
            files
        }
        Err(e) => {
            eprintln!("{}: cannot read workspace '{}': {}", "warning".yellow(), root.display(), e);
            FileTable::new()
        }
    }
}

fn workspace_root(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_file(path: &str, options: &RunOptions) {
    let source = read_source(path);
    let mut loader = options.loader();
    let files = workspace_for(Path::new(path), &loader.config().extension);

    // The workspace is the file's own directory, so its key is the file name
    let result = match Path::new(path).file_name().and_then(|name| name.to_str()) {
        Some(name) if files.contains_key(name) => loader.compile_root(name, &source, &files),
        _ => loader.compile(&source, &files),
    };
    debug!("{} url module(s) cached, {} cache hit(s)", loader.cache().len(), loader.cache().hits());
    print_result(&result, 0, 0);

    if options.json {
        match result.scene_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: cannot serialize scene graph: {}", "error".red(), e);
                process::exit(1);
            }
        }
    } else if !result.scene_graph.is_empty() {
        println!("{} {}", "objects:".dimmed(), result.scene_graph.keys().cloned().collect::<Vec<_>>().join(", "));
    }

    if result.fatal_errors().next().is_some() {
        process::exit(1);
    }
}

fn check_file(path: &str) {
    let source = read_source(path);
    match parse(tokenize(&source)) {
        Ok(program) => {
            println!("{} {} statement(s)", "ok".green(), program.statements.len());
        }
        Err(e) => {
            eprintln!("{}", e.with_source(&source));
            process::exit(1);
        }
    }
}

/// Print logs and errors, skipping the first `logs_seen`/`errors_seen` entries
fn print_result(result: &CompileResult, logs_seen: usize, errors_seen: usize) {
    for line in result.logs.iter().skip(logs_seen) {
        println!("{}", line);
    }
    for error in result.errors.iter().skip(errors_seen) {
        if error.starts_with(WARNING_PREFIX) {
            eprintln!("{}", error.yellow());
        } else {
            eprintln!("{}", error.red());
        }
    }
}

fn run_repl(options: &RunOptions) {
    println!("{} {} - {}",
        "scenelang".cyan().bold(),
        VERSION.cyan(),
        "A scene-description language".dimmed()
    );
    println!("Type {} to exit, {} for help\n",
        "exit".yellow(),
        "help".yellow()
    );

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}: cannot start REPL: {}", "error".red(), e);
            process::exit(1);
        }
    };

    let mut loader = options.loader();
    let files = workspace_for(Path::new("./session.scene"), &loader.config().extension);

    // The session is recompiled as a whole; only new output is shown
    let mut session = String::new();
    let mut last = CompileResult::default();

    loop {
        match rl.readline(&format!("{} ", "scene>".green().bold())) {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Handle special commands
                match line {
                    "exit" | "quit" => {
                        println!("{}", "Goodbye!".cyan());
                        break;
                    }
                    "help" => {
                        print_repl_help();
                        continue;
                    }
                    "clear" => {
                        session.clear();
                        last = CompileResult::default();
                        println!("{}", "Session cleared.".dimmed());
                        continue;
                    }
                    "scene" => {
                        match last.scene_json() {
                            Ok(json) => println!("{}", json.cyan()),
                            Err(e) => eprintln!("{}", format!("{}", e).red()),
                        }
                        continue;
                    }
                    _ => {}
                }

                let candidate = format!("{}{}\n", session, line);

                // Reject lines that do not parse; the session stays as it was
                if let Err(e) = parse(tokenize(&candidate)) {
                    let e = e.with_source(&candidate);
                    eprintln!("{}", format!("{}", e).red());
                    continue;
                }

                let result = loader.compile(&candidate, &files);
                print_result(&result, last.logs.len(), last.errors.len());
                session = candidate;
                last = result;
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(err) => {
                eprintln!("{}: {:?}", "error".red(), err);
                break;
            }
        }
    }
}

fn print_repl_help() {
    println!("{}", "REPL Commands:".yellow());
    println!("  exit, quit   Exit the REPL");
    println!("  clear        Forget every statement entered so far");
    println!("  scene        Print the current scene graph as JSON");
    println!("  help         Show this help\n");
    println!("{}", "Language Examples:".yellow());
    println!("  import math");
    println!("  r = math.sqrt(2)");
    println!("  for i = 1 to 3 {{ console.print(i * r) }}");
    println!("  m = mesh {{ vertices = [0,0,0; 1,0,0; 0,1,0;] faces = [0,1,2;] }}");
    println!("  m.rot = 0, 45, 0");
}
