//! Persistence for the graph and cache files
//!
//! Both files live under `<repo>/.semgraph/` and are written with
//! write-temp-then-rename so a reader never sees a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::model::{FORMAT_VERSION, GraphSnapshot};
use crate::record::{CACHE_FORMAT_VERSION, CacheFile};

/// Index directory: .semgraph/
pub const INDEX_DIR: &str = ".semgraph";

/// Graph file
pub const GRAPH_FILE: &str = "graph.json";

/// Incremental cache file
pub const CACHE_FILE: &str = "file-cache.json";

pub fn index_dir(root: &Path) -> PathBuf {
    root.join(INDEX_DIR)
}

pub fn graph_path(root: &Path) -> PathBuf {
    index_dir(root).join(GRAPH_FILE)
}

pub fn cache_path(root: &Path) -> PathBuf {
    index_dir(root).join(CACHE_FILE)
}

pub fn ensure_index_dir(root: &Path) -> Result<PathBuf, StoreError> {
    let dir = index_dir(root);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
    }
    Ok(dir)
}

/// Pretty JSON with a trailing newline. Field order comes from the struct
/// definitions and every collection is pre-sorted, so equal values give equal bytes.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    let mut text = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;
    text.push('\n');
    Ok(text)
}

/// Write `value` to `path` atomically via a sibling temp file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let text = to_canonical_json(value)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(text.as_bytes()).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Json { path: path.to_path_buf(), source })
}

pub fn save_graph(root: &Path, snapshot: &GraphSnapshot) -> Result<PathBuf, StoreError> {
    ensure_index_dir(root)?;
    let path = graph_path(root);
    write_json_atomic(&path, snapshot)?;
    tracing::debug!("Graph saved: {}", path.display());
    Ok(path)
}

/// Load the graph file. `Ok(None)` when it does not exist yet.
pub fn load_graph(root: &Path) -> Result<Option<GraphSnapshot>, StoreError> {
    let path = graph_path(root);
    let Some(snapshot) = read_json::<GraphSnapshot>(&path)? else {
        return Ok(None);
    };
    if snapshot.meta.format_version != FORMAT_VERSION {
        return Err(StoreError::CorruptState {
            path,
            reason: format!(
                "format_version mismatch: expected {}, got {}",
                FORMAT_VERSION, snapshot.meta.format_version
            ),
        });
    }
    tracing::debug!("Graph loaded from: {}", path.display());
    Ok(Some(snapshot))
}

pub fn save_cache(root: &Path, cache: &CacheFile) -> Result<PathBuf, StoreError> {
    ensure_index_dir(root)?;
    let path = cache_path(root);
    write_json_atomic(&path, cache)?;
    tracing::debug!("Cache saved: {} ({} files)", path.display(), cache.files.len());
    Ok(path)
}

/// Load the cache file. `Ok(None)` when it does not exist yet.
pub fn load_cache(root: &Path) -> Result<Option<CacheFile>, StoreError> {
    let path = cache_path(root);
    let Some(cache) = read_json::<CacheFile>(&path)? else {
        return Ok(None);
    };
    if cache.format_version != CACHE_FORMAT_VERSION {
        return Err(StoreError::CorruptState {
            path,
            reason: format!(
                "cache format_version mismatch: expected {}, got {}",
                CACHE_FORMAT_VERSION, cache.format_version
            ),
        });
    }
    if let Some((key, record)) = cache.files.iter().find(|(key, record)| **key != record.path) {
        return Err(StoreError::CorruptState {
            path,
            reason: format!("cache key {key} holds record for {}", record.path),
        });
    }
    Ok(Some(cache))
}

/// Remove the whole index directory.
pub fn clear_index(root: &Path) -> Result<(), StoreError> {
    let dir = index_dir(root);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
    }
    Ok(())
}
