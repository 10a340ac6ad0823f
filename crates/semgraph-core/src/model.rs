//! Core data structures for the symbol graph

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version stamped into the graph file. Bump on any shape change.
pub const FORMAT_VERSION: u32 = 2;

/// Prefix of every external stub id.
pub const EXTERNAL_PREFIX: &str = "external::";

/// Stable, structured identifier for a symbol.
///
/// The key is `<repo-relative path>::<qualified name>::<kind>`, optionally
/// followed by `#n` when the same key occurs more than once in a file.
/// Callers should treat it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(file_path: &str, kind: SymbolKind, qualified_name: &str) -> Self {
        SymbolId(format!("{}::{}::{}", file_path, qualified_name, kind.as_str()))
    }

    /// Id of the stub standing in for an unresolved callee.
    pub fn external(callee_name: &str) -> Self {
        SymbolId(format!("{EXTERNAL_PREFIX}{callee_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_external(&self) -> bool {
        self.0.starts_with(EXTERNAL_PREFIX)
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SymbolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SymbolId {
    fn from(value: &str) -> Self {
        SymbolId(value.to_string())
    }
}

/// Discriminates what kind of declaration a symbol represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Property,
    Other,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Type => "type",
            SymbolKind::Property => "property",
            SymbolKind::Other => "other",
        }
    }

    /// Functions and methods can be the target of a call.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// Coarse role a declaration plays in the codebase, derived once at extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Culture {
    /// Tests and other verification code.
    Auditor,
    /// Rendering / UI code.
    View,
    /// Configuration, policy and rules.
    Law,
    /// Everything else.
    Citizen,
}

impl Culture {
    pub const ALL: [Culture; 4] = [Culture::Auditor, Culture::View, Culture::Law, Culture::Citizen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Culture::Auditor => "Auditor",
            Culture::View => "View",
            Culture::Law => "Law",
            Culture::Citizen => "Citizen",
        }
    }
}

/// Declared access level, normalised across languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Reachable from outside the module or package (`pub`, `public`, `open`).
    Public,
    /// The language default where that is module- or crate-wide.
    #[default]
    Internal,
    Private,
}

impl Visibility {
    /// Map an access keyword (`pub`, `pub(crate)`, `public`, `fileprivate`, ...).
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim() {
            "pub" | "public" | "open" => Visibility::Public,
            "private" | "fileprivate" => Visibility::Private,
            _ => Visibility::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Internal => "internal",
            Visibility::Private => "private",
        }
    }
}

/// 1-based line/column range of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line_start: u32,
    pub col_start: u32,
    pub line_end: u32,
    pub col_end: u32,
}

impl Span {
    pub fn new(line_start: u32, col_start: u32, line_end: u32, col_end: u32) -> Self {
        Span { line_start, col_start, line_end, col_end }
    }
}

/// A single declaration in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    /// Repo-relative path with forward slashes. Empty for external stubs.
    pub file: String,
    pub span: Span,
    pub culture: Culture,
    #[serde(default)]
    pub visibility: Visibility,
    /// Nearest enclosing symbol, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<SymbolId>,
    /// Parameter count when the frontend exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub external: bool,
}

impl Symbol {
    /// Stub node representing a callee that could not be resolved inside the repo.
    pub fn external_stub(callee_name: &str) -> Self {
        Symbol {
            id: SymbolId::external(callee_name),
            name: callee_name.to_string(),
            qualified_name: callee_name.to_string(),
            kind: SymbolKind::Other,
            file: String::new(),
            span: Span::default(),
            culture: Culture::Citizen,
            visibility: Visibility::Internal,
            container: None,
            arity: None,
            external: true,
        }
    }

    /// Part of the public API of its module or package.
    pub fn public_api(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// How a call edge's callee was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Exactly one candidate in the best reachable scope.
    Resolved,
    /// Several equally scoped candidates; an edge exists to each of them.
    Ambiguous,
    /// No candidate in the repository; the callee is an external stub.
    External,
}

/// Where a call or write was written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallSiteRef {
    pub file: String,
    pub line: u32,
}

/// A directed caller → callee relation. Repeated call-sites collapse into one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: SymbolId,
    pub callee: SymbolId,
    pub multiplicity: u32,
    pub resolution: Resolution,
    pub external: bool,
    /// Sorted provenance for every collapsed call-site.
    pub sites: Vec<CallSiteRef>,
}

/// A symbol assigning to a stored value (property or global) declared in the same file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEdge {
    pub writer: SymbolId,
    pub target: SymbolId,
    pub multiplicity: u32,
    /// `resolved` or `ambiguous`; unmatched writes produce no edge.
    pub resolution: Resolution,
    pub sites: Vec<CallSiteRef>,
}

/// Per-file entry of the graph file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub fingerprint: String,
    pub symbols: usize,
    /// The last parse failed and the symbols come from an older record.
    #[serde(default, skip_serializing_if = "is_false")]
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub format_version: u32,
    pub built_at: String,
    /// Digest over the `(path, fingerprint)` pairs the graph was built from.
    pub content_digest: String,
    pub files_total: usize,
    #[serde(default)]
    pub freshness: Freshness,
}

/// Cost of the build that produced the graph's content. Kept, like
/// `built_at`, when a later build sees identical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Freshness {
    pub build_duration_ms: u64,
    pub files_reparsed: usize,
    pub files_reused: usize,
}

/// The full persisted graph: symbols, edges and the files they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub meta: GraphMeta,
    pub files: Vec<FileSummary>,
    pub symbols: Vec<Symbol>,
    pub edges: Vec<CallEdge>,
    /// Sorted by (writer, target).
    #[serde(default)]
    pub mutations: Vec<MutationEdge>,
}

impl GraphSnapshot {
    pub fn empty(built_at: String, content_digest: String) -> Self {
        GraphSnapshot {
            meta: GraphMeta {
                format_version: FORMAT_VERSION,
                built_at,
                content_digest,
                files_total: 0,
                freshness: Freshness::default(),
            },
            files: Vec::new(),
            symbols: Vec::new(),
            edges: Vec::new(),
            mutations: Vec::new(),
        }
    }
}
