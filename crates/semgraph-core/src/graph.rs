//! Call graph index over an immutable snapshot, backed by petgraph::DiGraph

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::StoreError;
use crate::model::*;

/// The loaded graph: the snapshot plus lookup indexes by id, name, kind,
/// culture and file. Never mutated after construction; share it behind an `Arc`.
pub struct CallGraph {
    snapshot: GraphSnapshot,
    /// Node weight is the position in `snapshot.symbols`, edge weight the
    /// position in `snapshot.edges`.
    inner: DiGraph<usize, usize>,
    by_id: HashMap<SymbolId, NodeIndex>,
    /// Lowercased name -> local symbols, in id order.
    by_name: BTreeMap<String, Vec<usize>>,
    by_kind: BTreeMap<SymbolKind, Vec<usize>>,
    by_culture: BTreeMap<Culture, Vec<usize>>,
    by_file: BTreeMap<String, Vec<usize>>,
    /// Writer / target id -> positions in `snapshot.mutations`.
    writes_by: HashMap<SymbolId, Vec<usize>>,
    writers_of: HashMap<SymbolId, Vec<usize>>,
}

impl std::fmt::Debug for CallGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl CallGraph {
    /// Index a snapshot. Fails if ids repeat or an edge (call or write) points at an unknown symbol.
    pub fn new(snapshot: GraphSnapshot) -> Result<Self, StoreError> {
        let mut inner = DiGraph::with_capacity(snapshot.symbols.len(), snapshot.edges.len());
        let mut by_id = HashMap::with_capacity(snapshot.symbols.len());
        let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_kind: BTreeMap<SymbolKind, Vec<usize>> = BTreeMap::new();
        let mut by_culture: BTreeMap<Culture, Vec<usize>> = BTreeMap::new();
        let mut by_file: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for (pos, symbol) in snapshot.symbols.iter().enumerate() {
            let idx = inner.add_node(pos);
            if by_id.insert(symbol.id.clone(), idx).is_some() {
                return Err(StoreError::DuplicateSymbol(symbol.id.clone()));
            }
            if symbol.external {
                continue;
            }
            by_name.entry(symbol.name.to_lowercase()).or_default().push(pos);
            by_kind.entry(symbol.kind).or_default().push(pos);
            by_culture.entry(symbol.culture).or_default().push(pos);
            by_file.entry(symbol.file.clone()).or_default().push(pos);
        }

        for (pos, edge) in snapshot.edges.iter().enumerate() {
            let source = *by_id
                .get(&edge.caller)
                .ok_or_else(|| StoreError::DanglingEdge(edge.caller.clone()))?;
            let target = *by_id
                .get(&edge.callee)
                .ok_or_else(|| StoreError::DanglingEdge(edge.callee.clone()))?;
            inner.add_edge(source, target, pos);
        }

        let mut writes_by: HashMap<SymbolId, Vec<usize>> = HashMap::new();
        let mut writers_of: HashMap<SymbolId, Vec<usize>> = HashMap::new();
        for (pos, edge) in snapshot.mutations.iter().enumerate() {
            for id in [&edge.writer, &edge.target] {
                if !by_id.contains_key(id) {
                    return Err(StoreError::DanglingEdge(id.clone()));
                }
            }
            writes_by.entry(edge.writer.clone()).or_default().push(pos);
            writers_of.entry(edge.target.clone()).or_default().push(pos);
        }

        Ok(CallGraph {
            snapshot,
            inner,
            by_id,
            by_name,
            by_kind,
            by_culture,
            by_file,
            writes_by,
            writers_of,
        })
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn meta(&self) -> &GraphMeta {
        &self.snapshot.meta
    }

    pub fn files(&self) -> &[FileSummary] {
        &self.snapshot.files
    }

    /// Get a symbol (local or external stub) by id.
    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.by_id.get(id).map(|&idx| self.weight(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All symbols, stubs included, in id order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.snapshot.symbols.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CallEdge> {
        self.snapshot.edges.iter()
    }

    /// Number of symbols declared in the repository (stubs excluded).
    pub fn local_count(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn external_count(&self) -> usize {
        self.snapshot.symbols.len() - self.local_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn mutations(&self) -> impl Iterator<Item = &MutationEdge> {
        self.snapshot.mutations.iter()
    }

    pub fn mutation_count(&self) -> usize {
        self.snapshot.mutations.len()
    }

    /// Writes performed by `id`, in target order.
    pub fn writes_by(&self, id: &str) -> Vec<&MutationEdge> {
        self.mutation_edges(self.writes_by.get(id))
    }

    /// Writes into `id`, in writer order.
    pub fn writers_of(&self, id: &str) -> Vec<&MutationEdge> {
        self.mutation_edges(self.writers_of.get(id))
    }

    /// Incoming edges with their caller, sorted by caller id.
    pub fn callers(&self, id: &str) -> Vec<(&Symbol, &CallEdge)> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Outgoing edges with their callee, sorted by callee id.
    pub fn callees(&self, id: &str) -> Vec<(&Symbol, &CallEdge)> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Local symbols whose lowercased name equals `lower_name`.
    pub fn named(&self, lower_name: &str) -> Vec<&Symbol> {
        self.collect(self.by_name.get(lower_name))
    }

    /// Lowercased names with their symbols, in name order.
    pub fn names(&self) -> impl Iterator<Item = (&str, Vec<&Symbol>)> {
        self.by_name
            .iter()
            .map(|(name, positions)| (name.as_str(), self.collect(Some(positions))))
    }

    pub fn of_kind(&self, kind: SymbolKind) -> Vec<&Symbol> {
        self.collect(self.by_kind.get(&kind))
    }

    pub fn in_culture(&self, culture: Culture) -> Vec<&Symbol> {
        self.collect(self.by_culture.get(&culture))
    }

    pub fn in_file(&self, path: &str) -> Vec<&Symbol> {
        self.collect(self.by_file.get(path))
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<(&Symbol, &CallEdge)> {
        let Some(&idx) = self.by_id.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<(&Symbol, &CallEdge)> = self
            .inner
            .edges_directed(idx, direction)
            .map(|edge_ref| {
                let other = match direction {
                    Direction::Incoming => edge_ref.source(),
                    Direction::Outgoing => edge_ref.target(),
                };
                (self.weight(other), &self.snapshot.edges[*edge_ref.weight()])
            })
            .collect();
        out.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        out
    }

    fn weight(&self, idx: NodeIndex) -> &Symbol {
        &self.snapshot.symbols[self.inner[idx]]
    }

    fn mutation_edges(&self, positions: Option<&Vec<usize>>) -> Vec<&MutationEdge> {
        let mut out: Vec<&MutationEdge> = positions
            .map(|p| p.iter().map(|&pos| &self.snapshot.mutations[pos]).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| (&a.writer, &a.target).cmp(&(&b.writer, &b.target)));
        out
    }

    fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<&Symbol> {
        positions
            .map(|p| p.iter().map(|&pos| &self.snapshot.symbols[pos]).collect())
            .unwrap_or_default()
    }
}
