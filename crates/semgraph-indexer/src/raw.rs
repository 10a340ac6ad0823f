//! Language-neutral parse tree handed from adapters to the extractor

use std::collections::BTreeMap;
use std::path::Path;

use semgraph_core::Span;

use crate::error::ParseError;

/// Deepest parse tree an adapter hands on. Deeper files fail to parse.
pub const MAX_NESTING_DEPTH: usize = 1024;

/// One node of a parse tree, reduced to what extraction needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawNode {
    /// Grammar node kind, e.g. `func_decl` or `function_item`.
    pub kind: String,
    pub name: Option<String>,
    pub span: Option<Span>,
    /// Adapter-specific extras such as `signature`, `arity`, `labels`, `supertypes`.
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn new(kind: impl Into<String>) -> Self {
        RawNode {
            kind: kind.into(),
            name: None,
            span: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, child: RawNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Comma separated `supertypes` attribute, trimmed.
    pub fn supertypes(&self) -> Vec<String> {
        self.attr("supertypes")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Drop for RawNode {
    // Flattens the subtree so dropping never recurses.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// A compiler frontend or grammar that turns one file into a [`RawNode`] tree.
pub trait ParseAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// `path` is the file on disk, `source` its bytes.
    fn parse(&self, path: &Path, source: &[u8]) -> Result<RawNode, ParseError>;

    /// Label stored in cache records, e.g. `tree-sitter-rust/0.23`.
    fn label(&self) -> String {
        format!("{}/{}", self.name(), self.version())
    }
}
