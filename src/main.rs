//! wirestub - generates an RPC server dispatcher or a wasm client from a Rust file
//!
//! Reads one input file, generates the requested artifact in memory and writes it next
//! to the input (or wherever `--output` points). Nothing is written on failure.

use chrono::Local;
use clap::Parser;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wirestub::{GenerateError, GenerateOptions, Layout, Target};

#[derive(Parser, Debug)]
#[command(name = "wirestub")]
#[command(about = "Generate an RPC server dispatcher or wasm client from a file of Rust functions")]
struct Cli {
    /// Rust source file declaring the functions to expose
    #[arg(short, long)]
    input: PathBuf,

    /// Output file, `-` for stdout [default: <input dir>/<mode>_<prefix>_<input name>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log the function catalog and every generation step
    #[arg(short = 'D', long)]
    dbg: bool,

    /// Prefix given to server functions so the dispatcher can call them
    #[arg(long, default_value = wirestub::DEFAULT_PREFIX)]
    prefix: String,

    /// Put the server dispatcher in a `dispatch` submodule instead of renaming
    #[arg(long)]
    namespaced: bool,

    /// Module path generated code imports the runtime from
    #[arg(long, default_value = wirestub::DEFAULT_RUNTIME_PATH)]
    runtime: String,

    /// Artifact to generate
    #[arg(value_enum)]
    mode: Target,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.dbg {
        true => EnvFilter::new("wirestub=debug"),
        false => EnvFilter::try_from_default_env().unwrap_or_else(|_| "wirestub=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(&cli) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&cli.input).map_err(|source| CliError::Read {
        path: cli.input.clone(),
        source,
    })?;

    let options = GenerateOptions {
        target: cli.mode,
        layout: match cli.namespaced {
            true => Layout::Namespaced,
            false => Layout::Prefixed(cli.prefix.clone()),
        },
        runtime_path: cli.runtime.clone(),
        source_name: cli
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        timestamp: Some(Local::now()),
    };
    debug!(?options, "generating");
    let artifact = wirestub::generate_artifact(&source, &options)?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input, cli.mode, &cli.prefix));
    if output.as_os_str() == "-" {
        return io::stdout()
            .write_all(artifact.source.as_bytes())
            .map_err(|source| CliError::Write { path: output, source });
    }
    write_atomically(&output, &artifact.source).map_err(|source| CliError::Write {
        path: output.clone(),
        source,
    })?;
    info!("wrote {} artifact to {}", artifact.target, output.display());
    Ok(())
}

/// `<input dir>/<mode>_<prefix>_<input name>`
fn default_output(input: &Path, mode: Target, prefix: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{mode}_{prefix}_{name}"))
}

/// Writes through a temporary file in the destination directory so `path` either gets
/// the whole of `contents` or is left untouched.
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
