//! Module content fetching.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Supplies module source text for `module` blocks. The engine only
/// knows source strings; where they come from (disk, an RPC host) is the
/// fetcher's business.
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<String>;
}

/// Fetches module sources as files relative to a base directory.
pub struct DirFetcher {
    base: PathBuf,
}

impl DirFetcher {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        DirFetcher { base: base.into() }
    }
}

impl ContentFetcher for DirFetcher {
    fn fetch(&self, source: &str) -> Result<String> {
        let path = self.base.join(source);
        std::fs::read_to_string(&path).map_err(|err| Error::Fetch {
            source_path: path.display().to_string(),
            message: err.to_string(),
        })
    }
}

/// Serves module sources from an in-memory map. Used by tests and by
/// embedders that already hold the text.
pub struct MapFetcher {
    sources: std::collections::HashMap<String, String>,
}

impl MapFetcher {
    pub fn new() -> Self {
        MapFetcher {
            sources: std::collections::HashMap::new(),
        }
    }

    pub fn insert(mut self, source: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.insert(source.into(), text.into());
        self
    }
}

impl Default for MapFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentFetcher for MapFetcher {
    fn fetch(&self, source: &str) -> Result<String> {
        self.sources
            .get(source)
            .cloned()
            .ok_or_else(|| Error::Fetch {
                source_path: source.to_string(),
                message: "no such module source".to_string(),
            })
    }
}
