//! Test utilities for building small graphs by hand

use crate::model::*;

/// A local function symbol in `file` named `name`.
pub fn function(file: &str, name: &str, culture: Culture) -> Symbol {
    Symbol {
        id: SymbolId::new(file, SymbolKind::Function, name),
        name: name.to_string(),
        qualified_name: name.to_string(),
        kind: SymbolKind::Function,
        file: file.to_string(),
        span: Span::new(1, 1, 2, 1),
        culture,
        visibility: Visibility::Internal,
        container: None,
        arity: Some(0),
        external: false,
    }
}

/// A resolved single-site edge between two symbols.
pub fn call(caller: &Symbol, callee: &Symbol) -> CallEdge {
    CallEdge {
        caller: caller.id.clone(),
        callee: callee.id.clone(),
        multiplicity: 1,
        resolution: if callee.external { Resolution::External } else { Resolution::Resolved },
        external: callee.external,
        sites: vec![CallSiteRef { file: caller.file.clone(), line: caller.span.line_start }],
    }
}

/// A resolved single-site write from `writer` to `target`.
pub fn write(writer: &Symbol, target: &Symbol) -> MutationEdge {
    MutationEdge {
        writer: writer.id.clone(),
        target: target.id.clone(),
        multiplicity: 1,
        resolution: Resolution::Resolved,
        sites: vec![CallSiteRef { file: writer.file.clone(), line: writer.span.line_start }],
    }
}

/// Wrap symbols and edges into a snapshot, sorted the way the builder sorts them.
pub fn snapshot(mut symbols: Vec<Symbol>, mut edges: Vec<CallEdge>) -> GraphSnapshot {
    symbols.sort_by(|a, b| a.id.cmp(&b.id));
    edges.sort_by(|a, b| (&a.caller, &a.callee).cmp(&(&b.caller, &b.callee)));
    let mut files: Vec<FileSummary> = Vec::new();
    for symbol in symbols.iter().filter(|s| !s.external) {
        match files.iter_mut().find(|f| f.path == symbol.file) {
            Some(file) => file.symbols += 1,
            None => files.push(FileSummary {
                path: symbol.file.clone(),
                fingerprint: crate::digest::fingerprint(symbol.file.as_bytes()),
                symbols: 1,
                stale: false,
            }),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    let mut snap = GraphSnapshot::empty("2024-01-01T00:00:00+00:00".to_string(), "digest".to_string());
    snap.meta.files_total = files.len();
    snap.files = files;
    snap.symbols = symbols;
    snap.edges = edges;
    snap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts_files() {
        let a = function("a.rs", "a", Culture::Citizen);
        let b = function("b.rs", "b", Culture::Citizen);
        let c = function("a.rs", "c", Culture::Citizen);
        let snap = snapshot(vec![a, b, c], vec![]);
        assert_eq!(snap.files.len(), 2);
        assert_eq!(snap.files[0].symbols, 2);
    }
}
