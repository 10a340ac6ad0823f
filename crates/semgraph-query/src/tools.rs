//! Tool surface: JSON schemas and dispatch for the six queries

use semgraph_core::{Culture, SymbolKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::engine::QueryEngine;
use crate::error::QueryError;
use crate::traversal::MAX_TRAVERSAL_DEPTH;

pub const TOOL_NAMES: &[&str] = &[
    "graph_summary",
    "find_symbol",
    "get_callers",
    "get_callees",
    "impact_radius",
    "refactor_guardrail",
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FindSymbolArgs {
    query: String,
    kind: Option<SymbolKind>,
    culture: Option<Culture>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SliceArgs {
    symbol_id: String,
    depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImpactArgs {
    target_id: String,
    target_type: String,
    depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SymbolArgs {
    symbol_id: String,
}

/// Name, description and JSON input schema of every tool.
pub fn tool_definitions() -> Vec<Value> {
    let depth = json!({ "type": "integer", "minimum": 1, "maximum": MAX_TRAVERSAL_DEPTH });
    vec![
        json!({
            "name": "graph_summary",
            "description": "Return graph counts, hotspot leaders, and freshness metadata.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "find_symbol",
            "description": "Lookup symbols by name with optional kind and culture filters.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "kind": {
                        "type": "string",
                        "enum": ["function", "method", "type", "property", "other"]
                    },
                    "culture": {
                        "type": "string",
                        "enum": ["Auditor", "View", "Law", "Citizen"]
                    },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200 }
                },
                "required": ["query"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_callers",
            "description": "Return the caller slice of a symbol up to a bounded depth.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "symbol_id": { "type": "string" },
                    "depth": depth
                },
                "required": ["symbol_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_callees",
            "description": "Return the callee slice of a symbol up to a bounded depth.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "symbol_id": { "type": "string" },
                    "depth": depth
                },
                "required": ["symbol_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "impact_radius",
            "description": "Compute the blast radius of a symbol or file by following callers.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "target_id": { "type": "string" },
                    "target_type": { "type": "string", "enum": ["symbol", "file"] },
                    "depth": depth
                },
                "required": ["target_id", "target_type"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "refactor_guardrail",
            "description": "Return a proceed/caution/block decision with evidence and do/don't guidance.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "symbol_id": { "type": "string" }
                },
                "required": ["symbol_id"],
                "additionalProperties": false
            }
        }),
    ]
}

/// Run tool `name` with JSON `args`. `null` args count as `{}`.
pub fn call_tool(engine: &QueryEngine, name: &str, args: Value) -> Result<Value, QueryError> {
    tracing::debug!("Tool call: {}", name);
    let args = if args.is_null() { json!({}) } else { args };

    let result = match name {
        "graph_summary" => {
            parse_args::<NoArgs>(name, args)?;
            serde_json::to_value(engine.graph_summary())?
        }
        "find_symbol" => {
            let a: FindSymbolArgs = parse_args(name, args)?;
            serde_json::to_value(engine.find_symbol(&a.query, a.kind, a.culture, a.limit)?)?
        }
        "get_callers" => {
            let a: SliceArgs = parse_args(name, args)?;
            serde_json::to_value(engine.get_callers(&a.symbol_id, a.depth)?)?
        }
        "get_callees" => {
            let a: SliceArgs = parse_args(name, args)?;
            serde_json::to_value(engine.get_callees(&a.symbol_id, a.depth)?)?
        }
        "impact_radius" => {
            let a: ImpactArgs = parse_args(name, args)?;
            serde_json::to_value(engine.impact_radius(&a.target_id, &a.target_type, a.depth)?)?
        }
        "refactor_guardrail" => {
            let a: SymbolArgs = parse_args(name, args)?;
            serde_json::to_value(engine.refactor_guardrail(&a.symbol_id)?)?
        }
        other => return Err(QueryError::InvalidArgument(format!("unknown tool '{}'", other))),
    };
    Ok(result)
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, QueryError> {
    serde_json::from_value(args).map_err(|e| QueryError::InvalidArgument(format!("{}: {}", tool, e)))
}
