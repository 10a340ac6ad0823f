//! Per-symbol impact metrics used to rank hotspots
//!
//! ```text
//! base  = direct * 1.0 + depth2 * 0.5 + fan_out * 0.7 + writes * 0.35 + (2.0 if public API)
//! score = base * culture multiplier
//! ```
//!
//! `depth2` counts every caller within two hops, direct callers included.
//! External stubs never count as callers or callees.

use std::collections::BTreeSet;

use semgraph_core::culture;
use semgraph_core::{CallGraph, Symbol};
use serde::Serialize;

use crate::traversal::{Direction, walk};

pub const DIRECT_CALLER_WEIGHT: f64 = 1.0;
pub const DEPTH2_CALLER_WEIGHT: f64 = 0.5;
pub const FAN_OUT_WEIGHT: f64 = 0.7;
pub const MUTATION_WEIGHT: f64 = 0.35;
pub const PUBLIC_API_BONUS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SymbolMetrics {
    pub direct_callers: usize,
    pub depth2_callers: usize,
    /// Distinct local callees.
    pub fan_out: usize,
    /// Distinct stored values this symbol writes.
    pub mutation_count: usize,
    pub public_api: bool,
    pub score: f64,
}

pub fn symbol_metrics(graph: &CallGraph, symbol: &Symbol) -> SymbolMetrics {
    let id = symbol.id.as_str();
    let direct_callers = graph
        .callers(id)
        .iter()
        .filter(|(caller, _)| !caller.external)
        .map(|(caller, _)| &caller.id)
        .collect::<BTreeSet<_>>()
        .len();
    let depth2_callers = walk(graph, &[symbol], Direction::Callers, 2).reached.len();
    let fan_out = graph
        .callees(id)
        .iter()
        .filter(|(callee, _)| !callee.external)
        .map(|(callee, _)| &callee.id)
        .collect::<BTreeSet<_>>()
        .len();
    let mutation_count = graph.writes_by(id).len();
    let public_api = symbol.public_api();

    let base = direct_callers as f64 * DIRECT_CALLER_WEIGHT
        + depth2_callers as f64 * DEPTH2_CALLER_WEIGHT
        + fan_out as f64 * FAN_OUT_WEIGHT
        + mutation_count as f64 * MUTATION_WEIGHT
        + if public_api { PUBLIC_API_BONUS } else { 0.0 };

    SymbolMetrics {
        direct_callers,
        depth2_callers,
        fan_out,
        mutation_count,
        public_api,
        score: round4(base * culture::multiplier(symbol.culture)),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
