//! Swap-on-success handle over the current graph snapshot

use std::sync::{Arc, RwLock};

use crate::graph::CallGraph;

/// Shared pointer to the graph readers query against.
///
/// Readers take an `Arc` and keep querying it even if a refresh publishes a
/// newer graph in the meantime; nobody ever observes a half-built graph.
#[derive(Debug)]
pub struct SnapshotHandle {
    current: RwLock<Arc<CallGraph>>,
}

impl SnapshotHandle {
    pub fn new(graph: CallGraph) -> Self {
        SnapshotHandle {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    /// The graph in effect right now.
    pub fn current(&self) -> Arc<CallGraph> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Publish a new graph, returning the one it replaced.
    pub fn replace(&self, graph: CallGraph) -> Arc<CallGraph> {
        let next = Arc::new(graph);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}
