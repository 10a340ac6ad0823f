//! Per-file extraction records kept in the incremental cache

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Symbol, SymbolId};

/// Version stamped into the cache file.
pub const CACHE_FORMAT_VERSION: u32 = 2;

/// An unresolved call found inside a declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSite {
    /// Enclosing symbol the call is attributed to.
    pub caller: SymbolId,
    /// Bare callee name as written.
    pub callee: String,
    /// Receiver or path prefix, e.g. `self` in `self.run()` or `Config` in `Config::load()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<u32>,
    pub line: u32,
}

/// An assignment to a named stored value inside a declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationSite {
    pub writer: SymbolId,
    /// Name of the assigned value, e.g. `count` in `self.count += 1`.
    pub target: String,
    pub line: u32,
}

/// Everything extracted from one file, keyed by its content fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub fingerprint: String,
    /// Name and version of the parse adapter that produced this record.
    pub parser: String,
    pub parsed_at: String,
    pub symbols: Vec<Symbol>,
    pub call_sites: Vec<CallSite>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutation_sites: Vec<MutationSite>,
    /// Set when the latest parse failed and this record is an older one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// On-disk shape of the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub format_version: u32,
    /// Adapter name -> version label the records were produced with.
    #[serde(default)]
    pub parser_versions: BTreeMap<String, String>,
    pub content_digest: String,
    pub files: BTreeMap<String, FileRecord>,
}

impl CacheFile {
    pub fn new(content_digest: String, files: BTreeMap<String, FileRecord>) -> Self {
        CacheFile {
            format_version: CACHE_FORMAT_VERSION,
            parser_versions: BTreeMap::new(),
            content_digest,
            files,
        }
    }
}
