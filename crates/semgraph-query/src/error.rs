//! Error types for graph queries

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}
