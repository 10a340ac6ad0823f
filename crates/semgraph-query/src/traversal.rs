//! Bounded breadth-first traversal over call edges

use std::collections::HashSet;

use semgraph_core::{CallGraph, Symbol};

use crate::error::QueryError;

/// Hard cap on traversal depth for every query.
pub const MAX_TRAVERSAL_DEPTH: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges backwards, towards callers.
    Callers,
    /// Follow edges forwards, towards callees.
    Callees,
}

#[derive(Debug, Clone, Copy)]
pub struct Reached<'g> {
    pub symbol: &'g Symbol,
    pub distance: u32,
}

#[derive(Debug, Clone)]
pub struct Traversal<'g> {
    /// Ordered by distance, then id. Start nodes are never included.
    pub reached: Vec<Reached<'g>>,
    /// More symbols lie beyond the requested depth.
    pub truncated: bool,
}

/// `None` means `default`; anything outside `1..=MAX_TRAVERSAL_DEPTH` is rejected.
pub fn check_depth(depth: Option<u32>, default: u32) -> Result<u32, QueryError> {
    let depth = depth.unwrap_or(default);
    if (1..=MAX_TRAVERSAL_DEPTH).contains(&depth) {
        Ok(depth)
    } else {
        Err(QueryError::InvalidArgument(format!(
            "depth must be between 1 and {}, got {}",
            MAX_TRAVERSAL_DEPTH, depth
        )))
    }
}

/// Walk `depth` hops from `starts`. Each symbol is reported once, at the
/// shallowest distance it was reached; neighbours are expanded in id order.
pub fn walk<'g>(graph: &'g CallGraph, starts: &[&'g Symbol], direction: Direction, depth: u32) -> Traversal<'g> {
    let mut seen: HashSet<&'g str> = starts.iter().map(|s| s.id.as_str()).collect();
    let mut frontier: Vec<&'g Symbol> = starts.to_vec();
    frontier.sort_by(|a, b| a.id.cmp(&b.id));
    let mut reached = Vec::new();

    for distance in 1..=depth {
        let mut next = Vec::new();
        for node in &frontier {
            for neighbor in neighbors(graph, node, direction) {
                if seen.insert(neighbor.id.as_str()) {
                    next.push(neighbor);
                }
            }
        }
        next.sort_by(|a, b| a.id.cmp(&b.id));
        reached.extend(next.iter().map(|&symbol| Reached { symbol, distance }));
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }

    let truncated = frontier.iter().any(|node| {
        neighbors(graph, node, direction)
            .into_iter()
            .any(|n| !seen.contains(n.id.as_str()))
    });
    tracing::trace!("Traversal reached {} symbols (truncated: {})", reached.len(), truncated);
    Traversal { reached, truncated }
}

fn neighbors<'g>(graph: &'g CallGraph, node: &Symbol, direction: Direction) -> Vec<&'g Symbol> {
    let pairs = match direction {
        Direction::Callers => graph.callers(node.id.as_str()),
        Direction::Callees => graph.callees(node.id.as_str()),
    };
    pairs.into_iter().map(|(symbol, _)| symbol).collect()
}
