//! Source file discovery: a gitignore-aware walk filtered by adapter and globs

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::adapters::AdapterRegistry;
use crate::config::IndexConfig;
use crate::error::IndexError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Repo-relative, forward slashes.
    pub rel_path: String,
    pub abs_path: PathBuf,
}

fn glob_set(root: &Path, patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| IndexError::Config {
            path: IndexConfig::path(root),
            message: format!("bad glob `{}`: {}", pattern, e),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| IndexError::Config {
        path: IndexConfig::path(root),
        message: e.to_string(),
    })
}

/// Repo-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Every indexable file under `root`, sorted by relative path.
pub fn discover(root: &Path, config: &IndexConfig, registry: &AdapterRegistry) -> Result<Vec<SourceFile>, IndexError> {
    if !root.is_dir() {
        return Err(IndexError::Discovery {
            root: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let include = glob_set(root, &config.include)?;
    let exclude = glob_set(root, &config.exclude)?;

    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let abs_path = entry.into_path();
        if !registry.supports(&abs_path) {
            continue;
        }
        let Some(rel_path) = relative_path(root, &abs_path) else {
            continue;
        };
        if (!config.include.is_empty() && !include.is_match(&rel_path)) || exclude.is_match(&rel_path) {
            tracing::trace!("Excluded by config: {}", rel_path);
            continue;
        }

        match std::fs::metadata(&abs_path).map(|m| m.len()) {
            Ok(bytes) if bytes > config.max_file_bytes => {
                tracing::debug!("Skipping {} ({} bytes over limit)", rel_path, bytes);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Skipping {}: {}", rel_path, e);
                continue;
            }
        }

        files.push(SourceFile { rel_path, abs_path });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    tracing::debug!("Discovered {} files under {}", files.len(), root.display());
    Ok(files)
}
