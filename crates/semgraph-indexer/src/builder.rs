//! Graph builder: merges file records into one deterministic snapshot

use std::collections::BTreeMap;

use semgraph_core::{
    CallEdge, CallSiteRef, FileRecord, FileSummary, Freshness, GraphMeta, GraphSnapshot, MutationEdge, Resolution,
    Symbol, SymbolId, FORMAT_VERSION, content_digest,
};

use crate::error::IndexError;
use crate::resolve::{Outcome, ResolutionIndex};

struct PendingEdge {
    sites: Vec<CallSiteRef>,
    resolution: Resolution,
}

/// Digest over the `(path, fingerprint)` pairs of a record set.
pub fn records_digest<'a>(records: impl IntoIterator<Item = &'a FileRecord>) -> String {
    content_digest(records.into_iter().map(|r| (r.path.as_str(), r.fingerprint.as_str())))
}

/// Merge per-file records into a snapshot.
///
/// Pure and order-independent: records are keyed by path before anything is
/// merged, symbols are emitted in id order and edges in (caller, callee) order.
/// Writes with no stored value of that name in the writer's file are dropped.
pub fn build_snapshot<'a, I>(records: I, built_at: String) -> Result<GraphSnapshot, IndexError>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let mut by_path: BTreeMap<&str, &FileRecord> = BTreeMap::new();
    for record in records {
        if by_path.insert(record.path.as_str(), record).is_some() {
            return Err(IndexError::CorruptState(format!("file {} recorded twice", record.path)));
        }
    }

    let mut symbols: BTreeMap<SymbolId, Symbol> = BTreeMap::new();
    for record in by_path.values() {
        for symbol in &record.symbols {
            if symbols.insert(symbol.id.clone(), symbol.clone()).is_some() {
                debug_assert!(false, "duplicate symbol id {}", symbol.id);
                return Err(IndexError::CorruptState(format!("duplicate symbol id {}", symbol.id)));
            }
        }
    }

    let mut pending: BTreeMap<(SymbolId, SymbolId), PendingEdge> = BTreeMap::new();
    let mut writes: BTreeMap<(SymbolId, SymbolId), PendingEdge> = BTreeMap::new();
    let mut stubs: BTreeMap<String, Symbol> = BTreeMap::new();
    {
        let index = ResolutionIndex::new(symbols.values());
        for record in by_path.values() {
            for site in &record.call_sites {
                let Some(caller) = symbols.get(&site.caller) else {
                    tracing::warn!("{}: call-site from unknown symbol {}", record.path, site.caller);
                    continue;
                };
                let at = CallSiteRef { file: record.path.clone(), line: site.line };

                match index.resolve(caller, site) {
                    Outcome::Resolved(callee) => {
                        add_site(&mut pending, &caller.id, callee, at, Resolution::Resolved);
                    }
                    Outcome::Ambiguous(candidates) => {
                        for callee in candidates {
                            add_site(&mut pending, &caller.id, callee, at.clone(), Resolution::Ambiguous);
                        }
                    }
                    Outcome::External => {
                        let stub = stubs
                            .entry(site.callee.clone())
                            .or_insert_with(|| Symbol::external_stub(&site.callee));
                        add_site(&mut pending, &caller.id, stub.id.clone(), at, Resolution::External);
                    }
                }
            }

            for site in &record.mutation_sites {
                let Some(writer) = symbols.get(&site.writer) else {
                    tracing::warn!("{}: write from unknown symbol {}", record.path, site.writer);
                    continue;
                };
                let at = CallSiteRef { file: record.path.clone(), line: site.line };

                match index.resolve_write(writer, site) {
                    Some(Outcome::Resolved(target)) => {
                        add_site(&mut writes, &writer.id, target, at, Resolution::Resolved);
                    }
                    Some(Outcome::Ambiguous(candidates)) => {
                        for target in candidates {
                            add_site(&mut writes, &writer.id, target, at.clone(), Resolution::Ambiguous);
                        }
                    }
                    Some(Outcome::External) | None => {
                        tracing::trace!("{}:{}: unmatched write to {}", record.path, site.line, site.target);
                    }
                }
            }
        }
    }

    for stub in stubs.into_values() {
        symbols.insert(stub.id.clone(), stub);
    }

    let edges: Vec<CallEdge> = pending
        .into_iter()
        .map(|((caller, callee), mut edge)| {
            edge.sites.sort();
            CallEdge {
                caller,
                callee,
                multiplicity: edge.sites.len() as u32,
                resolution: edge.resolution,
                external: edge.resolution == Resolution::External,
                sites: edge.sites,
            }
        })
        .collect();

    let mutations: Vec<MutationEdge> = writes
        .into_iter()
        .map(|((writer, target), mut edge)| {
            edge.sites.sort();
            MutationEdge {
                writer,
                target,
                multiplicity: edge.sites.len() as u32,
                resolution: edge.resolution,
                sites: edge.sites,
            }
        })
        .collect();

    let files: Vec<FileSummary> = by_path
        .values()
        .map(|record| FileSummary {
            path: record.path.clone(),
            fingerprint: record.fingerprint.clone(),
            symbols: record.symbols.len(),
            stale: record.stale,
        })
        .collect();

    let snapshot = GraphSnapshot {
        meta: GraphMeta {
            format_version: FORMAT_VERSION,
            built_at,
            content_digest: records_digest(by_path.values().copied()),
            files_total: files.len(),
            freshness: Freshness::default(),
        },
        files,
        symbols: symbols.into_values().collect(),
        edges,
        mutations,
    };

    tracing::debug!(
        "Built snapshot: {} files, {} symbols, {} edges, {} writes",
        snapshot.files.len(),
        snapshot.symbols.len(),
        snapshot.edges.len(),
        snapshot.mutations.len()
    );
    Ok(snapshot)
}

/// A merged edge is `resolved` if any of its sites resolved uniquely.
/// Shared by call and write edges.
fn add_site(
    pending: &mut BTreeMap<(SymbolId, SymbolId), PendingEdge>,
    caller: &SymbolId,
    callee: SymbolId,
    at: CallSiteRef,
    resolution: Resolution,
) {
    let edge = pending
        .entry((caller.clone(), callee))
        .or_insert_with(|| PendingEdge { sites: Vec::new(), resolution });
    edge.resolution = edge.resolution.min(resolution);
    edge.sites.push(at);
}
