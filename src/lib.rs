//! Generates a matching RPC server and client from one file of plain Rust functions.
//!
//! The server artifact keeps the original functions and adds a `receive` dispatcher that
//! decodes a call and runs the matching function. The client artifact keeps only the
//! type declarations and replaces every function with a proxy that encodes the call,
//! plus a wrapper a JavaScript host can call with loosely typed arguments.
//!
//! Both artifacts link against [`runtime`].

pub mod catalog;
pub mod classify;
mod emit;
pub mod error;
mod projection;
mod rewrite;
pub mod runtime;

pub use catalog::{FunctionCatalog, FunctionSignature};
pub use error::GenerateError;

use chrono::{DateTime, Local};
use projection::RuntimePath;
use std::fmt;
use tracing::debug;

pub const DEFAULT_PREFIX: &str = "wirestub";
pub const DEFAULT_RUNTIME_PATH: &str = "::wirestub::runtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    Server,
    Client,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Target::Server => "server",
            Target::Client => "client",
        })
    }
}

/// Where the server dispatcher lives relative to the functions it calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Public functions are renamed `<prefix>_<name>` and `receive` sits next to them.
    Prefixed(String),
    /// Nothing is renamed; `receive` lives in a `dispatch` submodule.
    Namespaced,
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Prefixed(DEFAULT_PREFIX.to_owned())
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub target: Target,
    /// Ignored for the client.
    pub layout: Layout,
    /// Path generated code imports the runtime from.
    pub runtime_path: String,
    /// Named in the provenance header.
    pub source_name: Option<String>,
    /// Written to the provenance header when set.
    pub timestamp: Option<DateTime<Local>>,
}

impl GenerateOptions {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            layout: Layout::default(),
            runtime_path: DEFAULT_RUNTIME_PATH.to_owned(),
            source_name: None,
            timestamp: None,
        }
    }
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub target: Target,
    pub source: String,
}

/// Generates the artifact for `options.target` from the Rust source `source`.
///
/// Runs entirely in memory; on error nothing is produced.
pub fn generate(source: &str, options: &GenerateOptions) -> Result<String, GenerateError> {
    generate_artifact(source, options).map(|artifact| artifact.source)
}

pub fn generate_artifact(
    source: &str,
    options: &GenerateOptions,
) -> Result<GeneratedArtifact, GenerateError> {
    let file = syn::parse_file(source).map_err(GenerateError::Parse)?;
    let runtime = RuntimePath::parse(&options.runtime_path)?;
    if let (Target::Server, Layout::Prefixed(prefix)) = (options.target, &options.layout) {
        if syn::parse_str::<syn::Ident>(&format!("{prefix}_f")).is_err() {
            return Err(GenerateError::InvalidPrefix(prefix.clone()));
        }
    }
    let catalog = FunctionCatalog::build(&file.items)?;
    debug!(
        target = %options.target,
        functions = catalog.functions.len(),
        "built function catalog"
    );

    let projection = match options.target {
        Target::Server => projection::server::project(file, &catalog, &options.layout, &runtime)?,
        Target::Client => projection::client::project(file, &catalog, &runtime)?,
    };
    Ok(GeneratedArtifact {
        target: projection.target,
        source: emit::render(projection, options),
    })
}
