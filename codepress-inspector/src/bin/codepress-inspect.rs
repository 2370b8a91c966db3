use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use codepress_inspector::{
    FileWatcher, FsStore, InspectorConfig, Pipeline, PropValue, PropertyEdit,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Inspect and edit the properties of JSX elements in a project
#[derive(Parser, Debug)]
#[command(name = "codepress-inspect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to codepress.json in the project root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse every source file and list elements per file
    Scan {
        /// Print the instrumented source of each file
        #[arg(long)]
        print: bool,
    },

    /// Show the properties of one element as JSON
    Props { uid: String },

    /// Set one property and write the file back
    Set {
        uid: String,
        name: String,
        /// JSON value: a string, number, bool, null, {"code": "..."} or undefined
        value: String,
    },

    /// Keep the registry and component map up to date while files change
    Watch,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Project root not found: {}", cli.root.display()))?;
    let config = match &cli.config {
        Some(path) => InspectorConfig::load(path)?,
        None => InspectorConfig::discover(&root)?,
    };

    let store = FsStore::new(root.clone(), config.ignored_dirs.clone());
    let mut pipeline = Pipeline::new(config, store);
    let report = pipeline.load()?;
    for diagnostic in pipeline.diagnostics() {
        eprintln!("{}: {}", diagnostic.path.display(), diagnostic.message);
    }

    match cli.command {
        Command::Scan { print } => {
            for entry in pipeline.registry().entries() {
                println!(
                    "{} (v{}, {} elements)",
                    relative(&entry.path, &root),
                    entry.version,
                    entry.arena.len()
                );
                for (id, node) in entry.arena.iter() {
                    let depth = entry.arena.ancestors(id).len();
                    println!("  {}<{}> {}", "  ".repeat(depth), node.tag, node.uid);
                }
                if print {
                    println!("{}", entry.generated);
                }
            }
            println!(
                "{} files, {} failed, {} components",
                report.processed, report.failed, report.components
            );
        }
        Command::Props { uid } => {
            let selection = pipeline
                .inspect(&uid)
                .ok_or_else(|| anyhow!("No element with identifier '{}'", uid))?;
            println!("{}", serde_json::to_string_pretty(&selection)?);
        }
        Command::Set { uid, name, value } => {
            let value = parse_value(&value)?;
            let outcome = pipeline.apply_edit(&PropertyEdit { uid, name, value })?;
            if let Some(fallback) = &outcome.fallback {
                eprintln!("warning: {}", fallback);
            }
            println!(
                "{}: {:?} (version {})",
                relative(&outcome.path, &root),
                outcome.action,
                outcome.version
            );
        }
        Command::Watch => {
            let watcher = FileWatcher::new(&root)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(pipeline.watch(watcher, async {
                let _ = tokio::signal::ctrl_c().await;
            }));
        }
    }

    Ok(())
}

/// Values on the command line are JSON; `{"code": "..."}` is raw source and
/// `undefined` removes the property.
fn parse_value(raw: &str) -> Result<PropValue> {
    if raw == "undefined" {
        return Ok(PropValue::Undefined);
    }
    let json: serde_json::Value = match serde_json::from_str(raw) {
        Ok(json) => json,
        Err(_) => return Ok(PropValue::String(raw.to_string())),
    };
    Ok(match json {
        serde_json::Value::Null => PropValue::Null,
        serde_json::Value::Bool(b) => PropValue::Bool(b),
        serde_json::Value::Number(n) => PropValue::Number(
            n.as_f64().ok_or_else(|| anyhow!("Number out of range: {}", n))?,
        ),
        serde_json::Value::String(s) => PropValue::String(s),
        serde_json::Value::Object(obj) if obj.contains_key("code") => match obj.get("code") {
            Some(serde_json::Value::String(code)) => PropValue::code(code.clone()),
            _ => return Err(anyhow!("\"code\" must be a string")),
        },
        other => serde_json::from_value(other).context("Unsupported value")?,
    })
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
