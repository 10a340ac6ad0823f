//! Call-site resolution against the merged symbol table
//!
//! A call resolves against the first non-empty "reachable scope" tier:
//! qualifier match, callable siblings, same file, anywhere, then types named
//! like the callee (initializer calls). Arity narrows a tier when both sides
//! know it, unless that would empty it.
//!
//! Writes resolve only within the writer's file: stored values in the
//! writer's own container first, then anywhere in the file.

use std::collections::HashMap;

use semgraph_core::{CallSite, MutationSite, Symbol, SymbolId, SymbolKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(SymbolId),
    /// Several candidates in the best tier, sorted by id.
    Ambiguous(Vec<SymbolId>),
    External,
}

/// Lookup tables over local symbols. Built once per graph build.
pub struct ResolutionIndex<'a> {
    callables: HashMap<&'a str, Vec<&'a Symbol>>,
    types: HashMap<&'a str, Vec<&'a Symbol>>,
    values: HashMap<&'a str, Vec<&'a Symbol>>,
}

impl<'a> ResolutionIndex<'a> {
    /// `symbols` must already be in id order; candidate lists inherit it.
    pub fn new(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        let mut callables: HashMap<&'a str, Vec<&'a Symbol>> = HashMap::new();
        let mut types: HashMap<&'a str, Vec<&'a Symbol>> = HashMap::new();
        let mut values: HashMap<&'a str, Vec<&'a Symbol>> = HashMap::new();
        for symbol in symbols {
            if symbol.external {
                continue;
            }
            if symbol.kind.is_callable() {
                callables.entry(symbol.name.as_str()).or_default().push(symbol);
            } else if symbol.kind == SymbolKind::Type {
                types.entry(symbol.name.as_str()).or_default().push(symbol);
            } else {
                values.entry(symbol.name.as_str()).or_default().push(symbol);
            }
        }
        ResolutionIndex { callables, types, values }
    }

    /// Resolve a write to stored values. `None` when nothing in the writer's
    /// file carries the target name.
    pub fn resolve_write(&self, writer: &Symbol, site: &MutationSite) -> Option<Outcome> {
        let in_file: Vec<&Symbol> = self
            .values
            .get(site.target.as_str())
            .into_iter()
            .flatten()
            .copied()
            .filter(|v| v.file == writer.file)
            .collect();

        let writer_owner = owner_path(writer);
        let own: Vec<&Symbol> = in_file
            .iter()
            .copied()
            .filter(|v| owner_path(v) == writer_owner)
            .collect();
        let chosen = if own.is_empty() { in_file } else { own };

        match chosen.as_slice() {
            [] => None,
            [only] => Some(Outcome::Resolved(only.id.clone())),
            many => Some(Outcome::Ambiguous(many.iter().map(|v| v.id.clone()).collect())),
        }
    }

    pub fn resolve(&self, caller: &Symbol, site: &CallSite) -> Outcome {
        let named: &[&Symbol] = self
            .callables
            .get(site.callee.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let caller_owner = owner_path(caller);

        // 1. Qualifier names the container; `self`/`Self` is the caller's own.
        if let Some(qualifier) = site.qualifier.as_deref() {
            let wanted = match qualifier {
                "self" | "Self" => last_segment(caller_owner),
                other => other,
            };
            if !wanted.is_empty() {
                let tier: Vec<&Symbol> = named
                    .iter()
                    .copied()
                    .filter(|c| last_segment(owner_path(c)) == wanted)
                    .collect();
                if let Some(outcome) = pick(tier, site) {
                    return outcome;
                }
            }
        }

        // 2. Callable siblings in the caller's container.
        if !caller_owner.is_empty() {
            let tier: Vec<&Symbol> = named
                .iter()
                .copied()
                .filter(|c| owner_path(c) == caller_owner)
                .collect();
            if let Some(outcome) = pick(tier, site) {
                return outcome;
            }
        }

        // 3. Same file.
        let tier: Vec<&Symbol> = named.iter().copied().filter(|c| c.file == caller.file).collect();
        if let Some(outcome) = pick(tier, site) {
            return outcome;
        }

        // 4. Anywhere.
        if let Some(outcome) = pick(named.to_vec(), site) {
            return outcome;
        }

        // 5. Types named like the callee.
        let types = self
            .types
            .get(site.callee.as_str())
            .cloned()
            .unwrap_or_default();
        pick(types, site).unwrap_or(Outcome::External)
    }
}

/// Qualified name of the enclosing scope; empty at top level.
fn owner_path(symbol: &Symbol) -> &str {
    symbol
        .qualified_name
        .rsplit_once('.')
        .map(|(owner, _)| owner)
        .unwrap_or("")
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn pick(tier: Vec<&Symbol>, site: &CallSite) -> Option<Outcome> {
    if tier.is_empty() {
        return None;
    }
    let narrowed: Vec<&Symbol> = match site.arity {
        Some(arity) => tier
            .iter()
            .copied()
            .filter(|c| c.arity.is_none_or(|a| a == arity))
            .collect(),
        None => Vec::new(),
    };
    let chosen = if narrowed.is_empty() { tier } else { narrowed };

    Some(match chosen.as_slice() {
        [only] => Outcome::Resolved(only.id.clone()),
        many => Outcome::Ambiguous(many.iter().map(|s| s.id.clone()).collect()),
    })
}
