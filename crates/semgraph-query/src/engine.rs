//! Read-only queries over one graph snapshot

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use semgraph_core::{
    CallGraph, CallEdge, Culture, Freshness, Resolution, SnapshotHandle, Symbol, SymbolId, SymbolKind, Visibility,
};
use serde::Serialize;

use crate::error::QueryError;
use crate::guardrail::{self, Assessment, GUARDRAIL_IMPACT_DEPTH, Level, RiskInputs};
use crate::metrics::{SymbolMetrics, symbol_metrics};
use crate::traversal::{Direction, Traversal, check_depth, walk};

pub const DEFAULT_CALL_DEPTH: u32 = 1;
pub const DEFAULT_IMPACT_DEPTH: u32 = 2;
pub const DEFAULT_FIND_LIMIT: usize = 50;
pub const MAX_FIND_LIMIT: usize = 200;
pub const HOTSPOT_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryCounts {
    pub files: usize,
    pub symbols: usize,
    pub external_symbols: usize,
    pub edges: usize,
    pub resolved_edges: usize,
    pub ambiguous_edges: usize,
    pub external_edges: usize,
    /// Distinct `(caller file, callee file)` pairs across files.
    pub cross_file_dependencies: usize,
    pub mutation_edges: usize,
    pub public_api_symbols: usize,
}

/// A symbol ranked by impact score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub symbol_id: SymbolId,
    pub name: String,
    pub file: String,
    pub culture: Culture,
    pub score: f64,
    pub direct_callers: usize,
    pub fan_out: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub format_version: u32,
    pub built_at: String,
    pub content_digest: String,
    pub freshness: Freshness,
    pub counts: SummaryCounts,
    pub symbols_by_kind: BTreeMap<SymbolKind, usize>,
    pub symbols_by_culture: BTreeMap<Culture, usize>,
    pub stale_files: Vec<String>,
    pub hotspots: Vec<Hotspot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMatch {
    pub id: SymbolId,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub culture: Culture,
    pub visibility: Visibility,
    pub public_api: bool,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<SymbolId>,
    /// The name equals the query, ignoring case.
    pub exact: bool,
}

/// A symbol reached by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRef {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub line: u32,
    pub culture: Culture,
    pub distance: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

impl NodeRef {
    fn new(symbol: &Symbol, distance: u32) -> Self {
        NodeRef {
            id: symbol.id.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind,
            file: symbol.file.clone(),
            line: symbol.span.line_start,
            culture: symbol.culture,
            distance,
            external: symbol.external,
        }
    }
}

/// Resolution breakdown of the edges directly touching a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeStats {
    pub resolved_edges: usize,
    pub ambiguous_edges: usize,
    pub external_edges: usize,
}

impl EdgeStats {
    fn from_edges<'a>(edges: impl IntoIterator<Item = &'a CallEdge>) -> Self {
        let mut stats = EdgeStats::default();
        for edge in edges {
            match edge.resolution {
                Resolution::Resolved => stats.resolved_edges += 1,
                Resolution::Ambiguous => stats.ambiguous_edges += 1,
                Resolution::External => stats.external_edges += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSlice {
    pub symbol_id: SymbolId,
    pub depth: u32,
    pub stats: EdgeStats,
    pub nodes: Vec<NodeRef>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Symbol,
    File,
}

impl FromStr for TargetType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symbol" => Ok(TargetType::Symbol),
            "file" => Ok(TargetType::File),
            other => Err(QueryError::InvalidArgument(format!(
                "target_type must be 'symbol' or 'file', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub target_id: String,
    pub target_type: TargetType,
    pub depth: u32,
    pub nodes: Vec<NodeRef>,
    pub culture_distribution: BTreeMap<Culture, usize>,
    pub files_touched: Vec<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailEvidence {
    pub callers: Vec<NodeRef>,
    pub impact: Vec<NodeRef>,
    pub culture_mix: BTreeMap<Culture, usize>,
    pub ambiguous_edges: usize,
    pub external_edges: usize,
    pub metrics: SymbolMetrics,
    /// Symbols assigning to this one, when it is a stored value.
    pub writers: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailReport {
    pub symbol_id: SymbolId,
    pub name: String,
    pub culture: Culture,
    pub level: Level,
    pub score: f64,
    pub hard_block: bool,
    pub direct_callers: usize,
    pub indirect_callers: usize,
    pub reasons: Vec<String>,
    pub evidence: GuardrailEvidence,
    #[serde(rename = "do")]
    pub dos: Vec<String>,
    #[serde(rename = "dont")]
    pub donts: Vec<String>,
}

/// Queries against a shared snapshot. Cheap to clone; safe to use from many threads.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    graph: Arc<CallGraph>,
}

impl QueryEngine {
    pub fn new(graph: Arc<CallGraph>) -> Self {
        QueryEngine { graph }
    }

    /// Engine over whatever snapshot `handle` currently publishes.
    pub fn from_handle(handle: &SnapshotHandle) -> Self {
        Self::new(handle.current())
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn graph_summary(&self) -> GraphSummary {
        let graph = &*self.graph;
        let meta = graph.meta();

        let mut file_pairs: BTreeSet<(&str, &str)> = BTreeSet::new();
        for edge in graph.edges().filter(|e| !e.external) {
            let caller_file = graph.symbol(edge.caller.as_str()).map(|s| s.file.as_str());
            let callee_file = graph.symbol(edge.callee.as_str()).map(|s| s.file.as_str());
            if let (Some(from), Some(to)) = (caller_file, callee_file) {
                if from != to {
                    file_pairs.insert((from, to));
                }
            }
        }

        let stats = EdgeStats::from_edges(graph.edges());
        let counts = SummaryCounts {
            files: graph.files().len(),
            symbols: graph.local_count(),
            external_symbols: graph.external_count(),
            edges: graph.edge_count(),
            resolved_edges: stats.resolved_edges,
            ambiguous_edges: stats.ambiguous_edges,
            external_edges: stats.external_edges,
            cross_file_dependencies: file_pairs.len(),
            mutation_edges: graph.mutation_count(),
            public_api_symbols: graph.symbols().filter(|s| !s.external && s.public_api()).count(),
        };

        let mut symbols_by_kind = BTreeMap::new();
        let mut symbols_by_culture = BTreeMap::new();
        let mut hotspots: Vec<Hotspot> = Vec::new();
        for symbol in graph.symbols().filter(|s| !s.external) {
            *symbols_by_kind.entry(symbol.kind).or_default() += 1;
            *symbols_by_culture.entry(symbol.culture).or_default() += 1;

            let metrics = symbol_metrics(graph, symbol);
            if metrics.score > 0.0 {
                hotspots.push(Hotspot {
                    symbol_id: symbol.id.clone(),
                    name: symbol.name.clone(),
                    file: symbol.file.clone(),
                    culture: symbol.culture,
                    score: metrics.score,
                    direct_callers: metrics.direct_callers,
                    fan_out: metrics.fan_out,
                });
            }
        }

        hotspots.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.symbol_id.cmp(&b.symbol_id)));
        hotspots.truncate(HOTSPOT_COUNT);

        GraphSummary {
            format_version: meta.format_version,
            built_at: meta.built_at.clone(),
            content_digest: meta.content_digest.clone(),
            freshness: meta.freshness,
            counts,
            symbols_by_kind,
            symbols_by_culture,
            stale_files: graph
                .files()
                .iter()
                .filter(|f| f.stale)
                .map(|f| f.path.clone())
                .collect(),
            hotspots,
        }
    }

    /// Case-insensitive name search: exact matches first, then substring matches.
    pub fn find_symbol(
        &self,
        query: &str,
        kind: Option<SymbolKind>,
        culture: Option<Culture>,
        limit: Option<usize>,
    ) -> Result<Vec<SymbolMatch>, QueryError> {
        let limit = limit.unwrap_or(DEFAULT_FIND_LIMIT);
        if !(1..=MAX_FIND_LIMIT).contains(&limit) {
            return Err(QueryError::InvalidArgument(format!(
                "limit must be between 1 and {}, got {}",
                MAX_FIND_LIMIT, limit
            )));
        }

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<SymbolMatch> = self
            .graph
            .names()
            .filter(|(name, _)| name.contains(needle.as_str()))
            .flat_map(|(name, symbols)| {
                let exact = name == needle;
                symbols.into_iter().map(move |symbol| (symbol, exact))
            })
            .filter(|(symbol, _)| kind.is_none_or(|k| symbol.kind == k))
            .filter(|(symbol, _)| culture.is_none_or(|c| symbol.culture == c))
            .map(|(symbol, exact)| SymbolMatch {
                id: symbol.id.clone(),
                name: symbol.name.clone(),
                qualified_name: symbol.qualified_name.clone(),
                kind: symbol.kind,
                culture: symbol.culture,
                visibility: symbol.visibility,
                public_api: symbol.public_api(),
                file: symbol.file.clone(),
                line: symbol.span.line_start,
                container: symbol.container.clone(),
                exact,
            })
            .collect();

        matches.sort_by(|a, b| {
            b.exact
                .cmp(&a.exact)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    pub fn get_callers(&self, symbol_id: &str, depth: Option<u32>) -> Result<CallSlice, QueryError> {
        self.call_slice(symbol_id, depth, Direction::Callers)
    }

    pub fn get_callees(&self, symbol_id: &str, depth: Option<u32>) -> Result<CallSlice, QueryError> {
        self.call_slice(symbol_id, depth, Direction::Callees)
    }

    /// Symbols affected by a change to `target_id`: everything that reaches it through callers.
    pub fn impact_radius(
        &self,
        target_id: &str,
        target_type: &str,
        depth: Option<u32>,
    ) -> Result<ImpactReport, QueryError> {
        let target_type: TargetType = target_type.parse()?;
        let depth = check_depth(depth, DEFAULT_IMPACT_DEPTH)?;

        let starts: Vec<&Symbol> = match target_type {
            TargetType::Symbol => vec![self.symbol(target_id)?],
            TargetType::File => {
                let symbols = self.graph.in_file(target_id);
                if symbols.is_empty() {
                    return Err(QueryError::NotFound(format!("file '{}'", target_id)));
                }
                symbols
            }
        };

        let traversal = walk(&self.graph, &starts, Direction::Callers, depth);
        let nodes = to_nodes(&traversal);
        let files_touched: BTreeSet<&str> = nodes.iter().map(|n| n.file.as_str()).collect();

        Ok(ImpactReport {
            target_id: target_id.to_string(),
            target_type,
            depth,
            culture_distribution: culture_mix(&nodes),
            files_touched: files_touched.into_iter().map(str::to_string).collect(),
            nodes,
            truncated: traversal.truncated,
        })
    }

    pub fn refactor_guardrail(&self, symbol_id: &str) -> Result<GuardrailReport, QueryError> {
        let symbol = self.symbol(symbol_id)?;

        let traversal = walk(&self.graph, &[symbol], Direction::Callers, GUARDRAIL_IMPACT_DEPTH);
        let impact = to_nodes(&traversal);
        let callers: Vec<NodeRef> = impact.iter().filter(|n| n.distance == 1).cloned().collect();
        let culture_mix = culture_mix(&impact);

        let touching = self
            .graph
            .callers(symbol_id)
            .into_iter()
            .chain(self.graph.callees(symbol_id))
            .map(|(_, edge)| edge);
        let stats = EdgeStats::from_edges(touching);

        let inputs = RiskInputs {
            direct: callers.len(),
            indirect: impact.len() - callers.len(),
            law: culture_mix.get(&Culture::Law).copied().unwrap_or(0),
            auditors: culture_mix.get(&Culture::Auditor).copied().unwrap_or(0),
            ambiguous: stats.ambiguous_edges,
            culture: symbol.culture,
        };
        let Assessment { level, score, hard_block, mut reasons } = guardrail::assess(&inputs);
        let metrics = symbol_metrics(&self.graph, symbol);
        if metrics.public_api {
            reasons.push("public API: callers outside the repository are not indexed".to_string());
        }
        let writers: Vec<SymbolId> = self
            .graph
            .writers_of(symbol_id)
            .into_iter()
            .map(|edge| edge.writer.clone())
            .collect();
        tracing::debug!("Guardrail for {}: {:?} (score {:.2})", symbol_id, level, score);

        Ok(GuardrailReport {
            symbol_id: symbol.id.clone(),
            name: symbol.name.clone(),
            culture: symbol.culture,
            level,
            score,
            hard_block,
            direct_callers: inputs.direct,
            indirect_callers: inputs.indirect,
            reasons,
            evidence: GuardrailEvidence {
                callers,
                impact,
                culture_mix,
                ambiguous_edges: stats.ambiguous_edges,
                external_edges: stats.external_edges,
                metrics,
                writers,
            },
            dos: guardrail::DO.iter().map(|s| s.to_string()).collect(),
            donts: guardrail::DONT.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn call_slice(&self, symbol_id: &str, depth: Option<u32>, direction: Direction) -> Result<CallSlice, QueryError> {
        let symbol = self.symbol(symbol_id)?;
        let depth = check_depth(depth, DEFAULT_CALL_DEPTH)?;

        let direct = match direction {
            Direction::Callers => self.graph.callers(symbol_id),
            Direction::Callees => self.graph.callees(symbol_id),
        };
        let stats = EdgeStats::from_edges(direct.into_iter().map(|(_, edge)| edge));
        let traversal = walk(&self.graph, &[symbol], direction, depth);

        Ok(CallSlice {
            symbol_id: symbol.id.clone(),
            depth,
            stats,
            nodes: to_nodes(&traversal),
            truncated: traversal.truncated,
        })
    }

    fn symbol(&self, id: &str) -> Result<&Symbol, QueryError> {
        self.graph
            .symbol(id)
            .ok_or_else(|| QueryError::NotFound(format!("symbol '{}'", id)))
    }
}

fn to_nodes(traversal: &Traversal<'_>) -> Vec<NodeRef> {
    traversal
        .reached
        .iter()
        .map(|r| NodeRef::new(r.symbol, r.distance))
        .collect()
}

fn culture_mix(nodes: &[NodeRef]) -> BTreeMap<Culture, usize> {
    let mut mix = BTreeMap::new();
    for node in nodes.iter().filter(|n| !n.external) {
        *mix.entry(node.culture).or_default() += 1;
    }
    mix
}
