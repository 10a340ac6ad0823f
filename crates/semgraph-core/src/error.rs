//! Errors raised by the graph store

use std::path::PathBuf;

use crate::model::SymbolId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("corrupt state in {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("two symbols share the id {0}")]
    DuplicateSymbol(SymbolId),

    #[error("edge references unknown symbol {0}")]
    DanglingEdge(SymbolId),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }

    /// The persisted state cannot be trusted and should be rebuilt.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            StoreError::Json { .. }
                | StoreError::CorruptState { .. }
                | StoreError::DuplicateSymbol(_)
                | StoreError::DanglingEdge(_)
        )
    }
}
