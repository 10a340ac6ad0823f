//! Error types for parsing and indexing

use std::path::{Path, PathBuf};

use semgraph_core::StoreError;
use thiserror::Error;

/// Failure to turn one file into a parse tree. Never aborts a build.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frontend failed for {path}: {message}")]
    Frontend { path: PathBuf, message: String },

    #[error("syntax error in {path} at line {line}")]
    Syntax { path: PathBuf, line: u32 },

    #[error("no parse adapter for {0}")]
    Unsupported(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    pub fn too_deep(path: &Path) -> Self {
        ParseError::Frontend {
            path: path.to_path_buf(),
            message: format!("nesting too deep (more than {} levels)", crate::raw::MAX_NESTING_DEPTH),
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("file discovery failed under {root}: {message}")]
    Discovery { root: PathBuf, message: String },

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("indexing cancelled")]
    Cancelled,

    #[error("corrupt index state: {0}")]
    CorruptState(String),
}
