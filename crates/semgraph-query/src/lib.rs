//! Semgraph Query: callers, callees, impact radius and refactor guardrails
//! over an immutable graph snapshot

pub mod engine;
pub mod traversal;
pub mod guardrail;
pub mod metrics;
pub mod tools;
pub mod error;


pub use engine::{
    CallSlice, EdgeStats, GraphSummary, GuardrailReport, ImpactReport, NodeRef, QueryEngine, SymbolMatch, TargetType,
};
pub use guardrail::Level;
pub use metrics::{SymbolMetrics, symbol_metrics};
pub use tools::{TOOL_NAMES, call_tool, tool_definitions};
pub use traversal::MAX_TRAVERSAL_DEPTH;
pub use error::QueryError;
