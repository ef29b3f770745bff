//! Loading: module text to a fully wired dependency graph.
//!
//! The loader builds the containment graph and inlines module calls; the
//! resolver adds every remaining edge (`depends`, parameter references,
//! cross-references, group serialization) and the result is validated
//! before it reaches the scheduler.

mod fetcher;
mod loader;
pub mod resolve;

pub use fetcher::{ContentFetcher, DirFetcher, MapFetcher};
pub use loader::Loader;

use crate::error::Result;
use graphkit::Graph;
use modfile::{Node, Value};
use std::path::Path;

/// Load, resolve, and validate the module at `path`. `overrides` seed
/// top-level params, CLI style.
pub fn load_file(path: &Path, overrides: &[(String, Value)]) -> Result<Graph<Node>> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let fetcher = DirFetcher::new(base);
    load_with(&fetcher, &name, overrides)
}

/// Load, resolve, and validate a module through an explicit fetcher.
pub fn load_source(
    fetcher: &dyn ContentFetcher,
    source: &str,
    overrides: &[(String, Value)],
) -> Result<Graph<Node>> {
    load_with(fetcher, source, overrides)
}

fn load_with(
    fetcher: &dyn ContentFetcher,
    source: &str,
    overrides: &[(String, Value)],
) -> Result<Graph<Node>> {
    let loader = Loader::new(fetcher);
    let graph = loader.load(source, overrides)?;
    let graph = resolve::resolve_dependencies(&graph)?;
    graph.validate()?;
    Ok(graph)
}
