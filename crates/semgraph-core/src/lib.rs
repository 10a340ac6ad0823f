//! Semgraph Core: symbol graph data model, ids, culture tags and persistence

pub mod model;
pub mod record;
pub mod ids;
pub mod culture;
pub mod digest;
pub mod graph;
pub mod handle;
pub mod store;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use model::{
    CallEdge, CallSiteRef, Culture, EXTERNAL_PREFIX, FORMAT_VERSION, FileSummary, Freshness, GraphMeta, GraphSnapshot,
    MutationEdge, Resolution, Span, Symbol, SymbolId, SymbolKind, Visibility,
};
pub use record::{CACHE_FORMAT_VERSION, CacheFile, CallSite, FileRecord, MutationSite};
pub use ids::IdAssigner;
pub use culture::CultureInput;
pub use digest::{content_digest, fingerprint};
pub use graph::CallGraph;
pub use handle::SnapshotHandle;
pub use error::StoreError;
pub use store::{
    CACHE_FILE, GRAPH_FILE, INDEX_DIR, cache_path, clear_index, graph_path, index_dir, load_cache, load_graph,
    save_cache, save_graph, to_canonical_json,
};
