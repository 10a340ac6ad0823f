//! Parsing, symbol extraction and incremental graph construction

pub mod raw;
pub mod adapters;
pub mod extractor;
pub mod resolve;
pub mod builder;
pub mod discover;
pub mod config;
pub mod coordinator;
pub mod error;

#[cfg(test)]
pub mod tests;

pub use raw::{MAX_NESTING_DEPTH, ParseAdapter, RawNode};
pub use adapters::{AdapterRegistry, FileType, SwiftDumpParser, TreeSitterParser};
pub use extractor::{ExtractedFile, SymbolExtractor};
pub use builder::build_snapshot;
pub use config::IndexConfig;
pub use coordinator::{BuildMode, BuildOutcome, BuildReport, CancelFlag, Coordinator, FileFailure};
pub use error::{IndexError, ParseError};
