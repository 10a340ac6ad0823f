//! Symbol extraction from raw parse trees
//!
//! A fixed pre-order walk over one file's [`RawNode`] tree. Node kinds from
//! every grammar map onto a closed [`NodeRole`] set; declarations become
//! symbols with ids and culture assigned, calls become unresolved
//! [`CallSite`]s attributed to the nearest enclosing symbol, and assignments
//! inside callables become [`MutationSite`]s.

use std::collections::BTreeSet;

use semgraph_core::culture::{self, CultureInput};
use semgraph_core::{
    CallSite, FileRecord, IdAssigner, MutationSite, Span, Symbol, SymbolId, SymbolKind, Visibility,
};

use crate::raw::RawNode;

/// What a declaration node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Type,
    Callable,
    /// Swift `init`; always a method.
    Initializer,
    /// Stored values: properties in a type, globals at top level.
    Value,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Decl(DeclKind),
    /// Adds members to a type declared elsewhere (`extension`, `impl`). A scope, not a symbol.
    Extension,
    Call,
    /// `target = value` and compound forms; the target is the first child.
    Assign,
    /// Swift `-dump-parse` operator sequence, where `assign_expr` has no children.
    Sequence,
    Transparent,
}

pub fn role_of(kind: &str) -> NodeRole {
    match kind {
        "class_decl" | "struct_decl" | "enum_decl" | "protocol_decl" | "actor_decl" | "typealias_decl"
        | "struct_item" | "enum_item" | "union_item" | "trait_item" | "type_item" | "class_definition" => {
            NodeRole::Decl(DeclKind::Type)
        }
        "func_decl" | "function_item" | "function_signature_item" | "function_definition" => {
            NodeRole::Decl(DeclKind::Callable)
        }
        "constructor_decl" => NodeRole::Decl(DeclKind::Initializer),
        "var_decl" | "const_item" | "static_item" | "field_declaration" => NodeRole::Decl(DeclKind::Value),
        "mod_item" => NodeRole::Decl(DeclKind::Module),
        "extension_decl" | "impl_item" => NodeRole::Extension,
        "call_expr" | "call_expression" | "call" => NodeRole::Call,
        "assign_expr" | "assignment_expression" | "compound_assignment_expr" | "assignment"
        | "augmented_assignment" => NodeRole::Assign,
        "sequence_expr" => NodeRole::Sequence,
        _ => NodeRole::Transparent,
    }
}

/// Declaration-shaped kinds that carry no symbol of their own.
const KNOWN_TRANSPARENT: &[&str] = &[
    "pattern_binding_decl",
    "param_decl",
    "accessor_decl",
    "import_decl",
    "top_level_code_decl",
    "enum_case_decl",
    "enum_element_decl",
    "let_declaration",
    "use_declaration",
    "extern_crate_declaration",
    "attribute_item",
    "inner_attribute_item",
    "decorated_definition",
];

const DECL_SUFFIXES: &[&str] = &["_decl", "_item", "_definition", "_declaration"];

fn is_unmodelled_declaration(kind: &str) -> bool {
    DECL_SUFFIXES.iter().any(|s| kind.ends_with(s)) && !KNOWN_TRANSPARENT.contains(&kind)
}

/// Call targets written as `receiver.name` or `Path::name`.
const MEMBER_KINDS: &[&str] = &[
    "unresolved_dot_expr",
    "member_ref_expr",
    "field_expression",
    "attribute",
    "member_expression",
    "scoped_identifier",
];

/// Call targets written as a bare name.
const REFERENCE_KINDS: &[&str] = &[
    "unresolved_decl_ref_expr",
    "declref_expr",
    "overloaded_decl_ref_expr",
    "unresolved_member_expr",
    "identifier",
];

const ARGUMENT_KINDS: &[&str] = &["argument_list", "arguments", "tuple_expr", "paren_expr"];

/// Everything one file contributed, before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFile {
    /// In traversal order.
    pub symbols: Vec<Symbol>,
    pub call_sites: Vec<CallSite>,
    pub mutation_sites: Vec<MutationSite>,
    /// Declaration kinds that were walked through without producing a symbol.
    pub skipped_kinds: BTreeSet<String>,
}

impl ExtractedFile {
    pub fn into_record(self, path: &str, fingerprint: String, parser: String, parsed_at: String) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            fingerprint,
            parser,
            parsed_at,
            symbols: self.symbols,
            call_sites: self.call_sites,
            mutation_sites: self.mutation_sites,
            stale: false,
        }
    }
}

/// Work item of the pre-order walk.
enum Step<'n> {
    Visit(&'n RawNode),
    CloseScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Type,
    Extension,
    Callable,
    Value,
    Module,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    name: String,
    /// Qualified-name segment: the signature for callables, else the name.
    segment: String,
    /// Index into `symbols`; `None` for extensions.
    symbol: Option<usize>,
}

pub struct SymbolExtractor<'a> {
    path: &'a str,
    ids: IdAssigner,
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    /// Symbol index -> qualified name of the extended type, patched to a container afterwards.
    extension_members: Vec<(usize, String)>,
    call_sites: Vec<CallSite>,
    mutation_sites: Vec<MutationSite>,
    skipped_kinds: BTreeSet<String>,
}

impl<'a> SymbolExtractor<'a> {
    /// Extract symbols and call-sites from one file. `path` is repo-relative.
    pub fn extract(path: &'a str, root: &RawNode) -> ExtractedFile {
        let mut extractor = SymbolExtractor {
            path,
            ids: IdAssigner::new(path),
            scopes: Vec::new(),
            symbols: Vec::new(),
            extension_members: Vec::new(),
            call_sites: Vec::new(),
            mutation_sites: Vec::new(),
            skipped_kinds: BTreeSet::new(),
        };
        extractor.walk(root);
        extractor.link_extension_members();

        let mut call_sites = extractor.call_sites;
        call_sites.sort();
        let mut mutation_sites = extractor.mutation_sites;
        mutation_sites.sort();
        tracing::debug!(
            "Extracted {} symbols, {} call-sites, {} writes from {}",
            extractor.symbols.len(),
            call_sites.len(),
            mutation_sites.len(),
            path
        );

        ExtractedFile {
            symbols: extractor.symbols,
            call_sites,
            mutation_sites,
            skipped_kinds: extractor.skipped_kinds,
        }
    }

    fn walk(&mut self, root: &RawNode) {
        let mut pending = vec![Step::Visit(root)];
        while let Some(step) = pending.pop() {
            match step {
                Step::Visit(node) => {
                    if self.enter(node) {
                        pending.push(Step::CloseScope);
                    }
                    pending.extend(node.children.iter().rev().map(Step::Visit));
                }
                Step::CloseScope => {
                    self.scopes.pop();
                }
            }
        }
    }

    /// Record what `node` itself contributes. Returns whether it opened a scope for its children.
    fn enter(&mut self, node: &RawNode) -> bool {
        match role_of(&node.kind) {
            NodeRole::Decl(decl) => self.declaration(node, decl),
            NodeRole::Extension => self.extension(node),
            NodeRole::Call => {
                self.call(node);
                false
            }
            NodeRole::Assign => self.assignment(node),
            NodeRole::Sequence => {
                self.sequence(node);
                false
            }
            NodeRole::Transparent => {
                if is_unmodelled_declaration(&node.kind) && self.skipped_kinds.insert(node.kind.clone()) {
                    tracing::warn!("{}: skipping unmodelled declaration kind `{}`", self.path, node.kind);
                }
                false
            }
        }
    }

    fn innermost(&self) -> Option<ScopeKind> {
        self.scopes.last().map(|s| s.kind)
    }

    fn in_type_body(&self) -> bool {
        matches!(self.innermost(), Some(ScopeKind::Type | ScopeKind::Extension))
    }

    fn enclosing_type(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find(|s| matches!(s.kind, ScopeKind::Type | ScopeKind::Extension))
            .map(|s| s.name.as_str())
    }

    fn qualified(&self, segment: &str) -> String {
        let mut parts: Vec<&str> = self.scopes.iter().map(|s| s.segment.as_str()).collect();
        parts.push(segment);
        parts.join(".")
    }

    /// Nearest scope that is a symbol, as an index into `symbols`.
    fn nearest_symbol(&self) -> Option<usize> {
        self.scopes.iter().rev().find_map(|s| s.symbol)
    }

    /// Nearest enclosing function or method, as an index into `symbols`.
    fn writer(&self) -> Option<usize> {
        self.nearest_symbol().filter(|&idx| self.symbols[idx].kind.is_callable())
    }

    fn declaration(&mut self, node: &RawNode, decl: DeclKind) -> bool {
        let Some(name) = node.name.clone().filter(|n| !n.is_empty()) else {
            tracing::trace!("{}: unnamed `{}`", self.path, node.kind);
            return false;
        };
        self.declare(node, decl, name)
    }

    fn declare(&mut self, node: &RawNode, decl: DeclKind, name: String) -> bool {
        let (kind, scope_kind, name) = match decl {
            DeclKind::Type => (SymbolKind::Type, ScopeKind::Type, name),
            DeclKind::Callable if self.in_type_body() => (SymbolKind::Method, ScopeKind::Callable, name),
            DeclKind::Callable => (SymbolKind::Function, ScopeKind::Callable, name),
            DeclKind::Initializer => (SymbolKind::Method, ScopeKind::Callable, "init".to_string()),
            DeclKind::Module => (SymbolKind::Other, ScopeKind::Module, name),
            DeclKind::Value => {
                let local = self.innermost() == Some(ScopeKind::Callable);
                if local || node.has_flag("implicit") || name.starts_with('$') {
                    return false;
                }
                let kind = if self.in_type_body() { SymbolKind::Property } else { SymbolKind::Other };
                (kind, ScopeKind::Value, name)
            }
        };

        let segment = match scope_kind {
            ScopeKind::Callable => node.attr("signature").unwrap_or(&name).to_string(),
            _ => name.clone(),
        };
        let qualified_name = self.qualified(&segment);
        let id = self.ids.assign(&qualified_name, kind);

        let supertypes = node.supertypes();
        let culture = culture::classify(&CultureInput {
            path: self.path,
            name: &name,
            kind,
            enclosing_type: self.enclosing_type(),
            supertypes: &supertypes,
        });

        let container = self.nearest_symbol().map(|idx| self.symbols[idx].id.clone());
        let index = self.symbols.len();
        if container.is_none() {
            if let Some(ext) = self.scopes.iter().rev().find(|s| s.kind == ScopeKind::Extension) {
                let owner = self.qualified_prefix_through(ext);
                self.extension_members.push((index, owner));
            }
        }

        self.symbols.push(Symbol {
            id,
            name: name.clone(),
            qualified_name,
            kind,
            file: self.path.to_string(),
            span: node.span.unwrap_or_default(),
            culture,
            visibility: node.attr("access").map(Visibility::from_keyword).unwrap_or_default(),
            container,
            arity: node.attr("arity").and_then(|a| a.parse().ok()),
            external: false,
        });

        self.scopes.push(Scope {
            kind: scope_kind,
            name,
            segment,
            symbol: Some(index),
        });
        true
    }

    /// Qualified name of the scope chain up to and including `target`.
    fn qualified_prefix_through(&self, target: &Scope) -> String {
        let mut parts = Vec::new();
        for scope in &self.scopes {
            parts.push(scope.segment.as_str());
            if std::ptr::eq(scope, target) {
                break;
            }
        }
        parts.join(".")
    }

    fn extension(&mut self, node: &RawNode) -> bool {
        let Some(name) = node.name.clone().filter(|n| !n.is_empty()) else {
            return false;
        };
        self.scopes.push(Scope {
            kind: ScopeKind::Extension,
            segment: name.clone(),
            name,
            symbol: None,
        });
        true
    }

    /// Members of an extension whose type is declared in the same file get that type as container.
    fn link_extension_members(&mut self) {
        for (index, owner) in std::mem::take(&mut self.extension_members) {
            let owner_id: Option<SymbolId> = self
                .symbols
                .iter()
                .find(|s| s.kind == SymbolKind::Type && s.qualified_name == owner)
                .map(|s| s.id.clone());
            self.symbols[index].container = owner_id;
        }
    }

    fn assignment(&mut self, node: &RawNode) -> bool {
        let Some(target) = node.children.first() else {
            return false;
        };
        match self.writer() {
            Some(writer) => {
                self.write(writer, target, node);
                false
            }
            None => self.assigned_value(node, target),
        }
    }

    /// Python declares module and class attributes by assigning them. Only
    /// the first assignment to a name declares it.
    fn assigned_value(&mut self, node: &RawNode, target: &RawNode) -> bool {
        let declares = node.kind == "assignment"
            && target.kind == "identifier"
            && (self.scopes.is_empty() || self.in_type_body());
        let Some(name) = target.name.clone().filter(|n| declares && !n.is_empty()) else {
            return false;
        };
        let kind = if self.in_type_body() { SymbolKind::Property } else { SymbolKind::Other };
        let qualified = self.qualified(&name);
        if self.symbols.iter().any(|s| s.kind == kind && s.qualified_name == qualified) {
            return false;
        }
        self.declare(node, DeclKind::Value, name)
    }

    fn sequence(&mut self, node: &RawNode) {
        let Some(writer) = self.writer() else {
            return;
        };
        for pair in node.children.windows(2) {
            if pair[1].kind == "assign_expr" && pair[1].children.is_empty() {
                self.write(writer, &pair[0], &pair[1]);
            }
        }
    }

    fn write(&mut self, writer: usize, target: &RawNode, node: &RawNode) {
        let Some(name) = assigned_name(target) else {
            tracing::trace!("{}: write target `{}` has no name", self.path, target.kind);
            return;
        };
        let writer = &self.symbols[writer];
        let line = target
            .span
            .or(node.span)
            .map(|s: Span| s.line_start)
            .unwrap_or(writer.span.line_start);

        self.mutation_sites.push(MutationSite {
            writer: writer.id.clone(),
            target: name,
            line,
        });
    }

    fn call(&mut self, node: &RawNode) {
        let Some(owner) = self.nearest_symbol() else {
            tracing::trace!("{}: call outside any declaration", self.path);
            return;
        };
        let Some(target) = node.children.first() else {
            return;
        };
        let Some((callee, qualifier)) = callee_of(target) else {
            tracing::trace!("{}: call target `{}` has no name", self.path, target.kind);
            return;
        };

        let caller = &self.symbols[owner];
        let line = target
            .span
            .or(node.span)
            .map(|s: Span| s.line_start)
            .unwrap_or(caller.span.line_start);

        self.call_sites.push(CallSite {
            caller: caller.id.clone(),
            callee,
            qualifier,
            arity: call_arity(node),
            line,
        });
    }
}

/// Callee name and optional qualifier of a call target.
fn callee_of(target: &RawNode) -> Option<(String, Option<String>)> {
    let name = target.name.clone().filter(|n| !n.is_empty())?;
    if MEMBER_KINDS.contains(&target.kind.as_str()) {
        let qualifier = target
            .children
            .first()
            .and_then(|receiver| receiver.name.as_deref())
            .map(last_segment);
        Some((name, qualifier))
    } else if REFERENCE_KINDS.contains(&target.kind.as_str()) {
        Some((name, None))
    } else {
        Some((last_segment(&name), None))
    }
}

/// The stored name a write lands on: the member in `a.b = ..`, else the bare name.
fn assigned_name(target: &RawNode) -> Option<String> {
    let kind = target.kind.as_str();
    if !MEMBER_KINDS.contains(&kind) && !REFERENCE_KINDS.contains(&kind) {
        return None;
    }
    match target.name.as_deref()? {
        "" | "self" | "_" => None,
        name => Some(last_segment(name)),
    }
}

fn last_segment(path: &str) -> String {
    path.rsplit("::")
        .next()
        .and_then(|p| p.rsplit('.').next())
        .unwrap_or(path)
        .to_string()
}

/// Argument count: from Swift labels when present, else the argument node's children.
fn call_arity(call: &RawNode) -> Option<u32> {
    let args = call
        .children
        .iter()
        .skip(1)
        .find(|c| ARGUMENT_KINDS.contains(&c.kind.as_str()));

    let labels = args
        .and_then(|a| a.attr("labels"))
        .or_else(|| call.attr("arg_labels"));
    if let Some(labels) = labels {
        return Some(labels.matches(':').count() as u32);
    }
    args.map(|a| a.children.len() as u32)
}
