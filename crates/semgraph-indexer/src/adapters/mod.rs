//! Parse adapters and extension-based dispatch

pub mod swift_dump;
pub mod treesitter;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub use self::swift_dump::SwiftDumpParser;
pub use self::treesitter::{FileType, TreeSitterParser};
use crate::raw::ParseAdapter;

/// Maps file extensions to the adapter that parses them.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    by_extension: BTreeMap<String, Arc<dyn ParseAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.by_extension.iter().map(|(ext, a)| (ext, a.label())))
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swift through `swiftc`, Rust and Python through tree-sitter.
    pub fn with_defaults(swiftc: impl Into<std::path::PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register(&["swift"], Arc::new(SwiftDumpParser::new(swiftc)));
        registry.register(&["rs"], Arc::new(TreeSitterParser::new(FileType::Rust)));
        registry.register(&["py"], Arc::new(TreeSitterParser::new(FileType::Python)));
        registry
    }

    pub fn register(&mut self, extensions: &[&str], adapter: Arc<dyn ParseAdapter>) {
        for ext in extensions {
            self.by_extension.insert(ext.to_ascii_lowercase(), adapter.clone());
        }
    }

    /// Determine the adapter from the file extension.
    pub fn adapter_for(&self, path: &Path) -> Option<&Arc<dyn ParseAdapter>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.adapter_for(path).is_some()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(String::as_str)
    }

    /// Adapter name -> version, one entry per distinct adapter.
    pub fn versions(&self) -> BTreeMap<String, String> {
        self.by_extension
            .values()
            .map(|a| (a.name().to_string(), a.version().to_string()))
            .collect()
    }
}
