//! Indexing configuration, read from `<repo>/.semgraph.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapters::swift_dump::SWIFTC_ENV;
use crate::error::IndexError;

pub const CONFIG_FILE: &str = ".semgraph.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Glob patterns a file must match (relative to the repo root). Empty means every supported file.
    pub include: Vec<String>,
    /// Glob patterns that remove files from the set.
    pub exclude: Vec<String>,
    /// Path to the Swift frontend.
    pub swiftc: Option<String>,
    /// Files larger than this are not indexed.
    pub max_file_bytes: u64,
    /// Extraction workers; 0 uses the rayon default.
    pub threads: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            include: Vec::new(),
            exclude: Vec::new(),
            swiftc: None,
            max_file_bytes: 2 * 1024 * 1024,
            threads: 0,
        }
    }
}

impl IndexConfig {
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Load the repo config, or defaults if there is none.
    pub fn load(root: &Path) -> Result<Self, IndexError> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| IndexError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, IndexError> {
        toml::from_str(content).map_err(|e| IndexError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// `SEMGRAPH_SWIFTC`, then the config value, then `swiftc` on `PATH`.
    pub fn swiftc_path(&self) -> PathBuf {
        std::env::var_os(SWIFTC_ENV)
            .map(PathBuf::from)
            .or_else(|| self.swiftc.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("swiftc"))
    }
}
