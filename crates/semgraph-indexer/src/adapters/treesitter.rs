//! Tree-sitter adapter for Rust and Python sources

use std::path::Path;

use semgraph_core::Span;
use tree_sitter::{Language, Node, Parser};

use crate::error::ParseError;
use crate::raw::{MAX_NESTING_DEPTH, ParseAdapter, RawNode};

/// Supported tree-sitter grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Rust,
    Python,
}

impl FileType {
    /// Determine file type from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "rs" => Some(FileType::Rust),
            "py" => Some(FileType::Python),
            _ => None,
        }
    }

    /// Get the tree-sitter language for this file type
    pub fn language(&self) -> Language {
        match self {
            FileType::Rust => tree_sitter_rust::LANGUAGE.into(),
            FileType::Python => tree_sitter_python::LANGUAGE.into(),
        }
    }

    pub fn adapter_name(&self) -> &'static str {
        match self {
            FileType::Rust => "tree-sitter-rust",
            FileType::Python => "tree-sitter-python",
        }
    }

    /// Grammar crate version the node kinds were mapped against.
    pub fn grammar_version(&self) -> &'static str {
        match self {
            FileType::Rust => "0.23",
            FileType::Python => "0.23",
        }
    }
}

/// Parses one grammar. A fresh `Parser` is made per call; they are cheap
/// and not `Sync`, so nothing is shared between rayon workers.
#[derive(Debug, Clone)]
pub struct TreeSitterParser {
    file_type: FileType,
}

impl TreeSitterParser {
    pub fn new(file_type: FileType) -> Self {
        TreeSitterParser { file_type }
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

impl ParseAdapter for TreeSitterParser {
    fn name(&self) -> &str {
        self.file_type.adapter_name()
    }

    fn version(&self) -> &str {
        self.file_type.grammar_version()
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<RawNode, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.file_type.language())
            .map_err(|e| ParseError::Frontend {
                path: path.to_path_buf(),
                message: format!("failed to set language: {}", e),
            })?;

        let tree = parser.parse(source, None).ok_or_else(|| ParseError::Frontend {
            path: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::Syntax {
                path: path.to_path_buf(),
                line: first_error_line(root).unwrap_or(1),
            });
        }

        convert(root, source, self.file_type, path)
    }
}

/// Copy the named nodes of a tree into a [`RawNode`] tree, walking with a
/// cursor so deep nesting cannot exhaust the stack.
fn convert(root: Node, source: &[u8], file_type: FileType, path: &Path) -> Result<RawNode, ParseError> {
    let mut cursor = root.walk();
    // Nodes whose children are still being collected, outermost first.
    let mut open = vec![raw_node(root, source, file_type)];

    'walk: loop {
        if cursor.node().is_named() && cursor.goto_first_child() {
            open_node(&mut open, cursor.node(), source, file_type, path)?;
            continue;
        }

        // Close finished nodes until one has a next sibling.
        loop {
            if cursor.node().is_named() {
                let Some(done) = open.pop() else {
                    break 'walk;
                };
                match open.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Ok(done),
                }
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
        open_node(&mut open, cursor.node(), source, file_type, path)?;
    }

    Err(ParseError::Frontend {
        path: path.to_path_buf(),
        message: "parse tree walk ended early".to_string(),
    })
}

/// Anonymous tokens are skipped.
fn open_node(open: &mut Vec<RawNode>, node: Node, source: &[u8], file_type: FileType, path: &Path) -> Result<(), ParseError> {
    if !node.is_named() {
        return Ok(());
    }
    if open.len() >= MAX_NESTING_DEPTH {
        return Err(ParseError::too_deep(path));
    }
    open.push(raw_node(node, source, file_type));
    Ok(())
}

fn raw_node(node: Node, source: &[u8], file_type: FileType) -> RawNode {
    let mut raw = RawNode::new(node.kind());
    raw.name = node_name(node, source);
    raw.span = Some(span_of(node));
    annotate(&mut raw, node, source, file_type);
    raw
}

fn span_of(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(
        start.row as u32 + 1,
        start.column as u32 + 1,
        end.row as u32 + 1,
        end.column as u32 + 1,
    )
}

fn text(node: Node, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(str::to_string)
}

/// `crate::model::Graph<T>` -> `Graph`
fn type_base_name(raw: &str) -> String {
    let without_generics = raw.split('<').next().unwrap_or(raw);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim_start_matches('&')
        .trim()
        .to_string()
}

fn node_name(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() == "impl_item" {
        return node
            .child_by_field_name("type")
            .and_then(|t| text(t, source))
            .map(|t| type_base_name(&t));
    }
    for field in ["name", "field", "attribute"] {
        if let Some(child) = node.child_by_field_name(field) {
            return text(child, source);
        }
    }
    let leaf = node.named_child_count() == 0;
    if leaf && (node.kind().ends_with("identifier") || node.kind() == "self") {
        return text(node, source);
    }
    None
}

/// Rust items that can carry a `pub` modifier.
const RUST_VISIBLE_ITEMS: &[&str] = &[
    "function_item",
    "function_signature_item",
    "struct_item",
    "enum_item",
    "union_item",
    "trait_item",
    "type_item",
    "const_item",
    "static_item",
    "field_declaration",
    "mod_item",
];

/// Python has no modifiers: a single leading underscore marks a private name.
fn python_access(name: &str) -> &'static str {
    let dunder = name.starts_with("__") && name.ends_with("__");
    if name.starts_with('_') && !dunder { "private" } else { "public" }
}

/// Declaration arity, supertypes and access, which the extractor reads from attributes.
fn annotate(raw: &mut RawNode, node: Node, source: &[u8], file_type: FileType) {
    match file_type {
        FileType::Rust if RUST_VISIBLE_ITEMS.contains(&node.kind()) => {
            let mut cursor = node.walk();
            let modifier = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "visibility_modifier")
                .and_then(|c| text(c, source));
            raw.attrs
                .insert("access".to_string(), modifier.unwrap_or_else(|| "private".to_string()));
        }
        FileType::Python if matches!(node.kind(), "function_definition" | "class_definition") => {
            if let Some(name) = raw.name.as_deref() {
                raw.attrs.insert("access".to_string(), python_access(name).to_string());
            }
        }
        FileType::Python if node.kind() == "assignment" => {
            let target = node
                .child_by_field_name("left")
                .filter(|left| left.kind() == "identifier")
                .and_then(|left| text(left, source));
            if let Some(target) = target {
                raw.attrs.insert("access".to_string(), python_access(&target).to_string());
            }
        }
        _ => {}
    }

    match (file_type, node.kind()) {
        (FileType::Rust, "function_item" | "function_signature_item") => {
            if let Some(params) = node.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                let arity = params
                    .named_children(&mut cursor)
                    .filter(|p| p.kind() == "parameter")
                    .count();
                raw.attrs.insert("arity".to_string(), arity.to_string());
            }
        }
        (FileType::Python, "function_definition") => {
            if let Some(params) = node.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                let arity = params
                    .named_children(&mut cursor)
                    .filter(|p| !matches!(p.kind(), "keyword_separator" | "positional_separator"))
                    .filter(|p| {
                        let receiver = p.kind() == "identifier"
                            && matches!(p.utf8_text(source), Ok("self") | Ok("cls"));
                        !receiver
                    })
                    .count();
                raw.attrs.insert("arity".to_string(), arity.to_string());
            }
        }
        (FileType::Python, "class_definition") => {
            if let Some(bases) = node.child_by_field_name("superclasses") {
                let mut cursor = bases.walk();
                let names: Vec<String> = bases
                    .named_children(&mut cursor)
                    .filter(|b| matches!(b.kind(), "identifier" | "attribute"))
                    .filter_map(|b| text(b, source))
                    .map(|b| b.rsplit('.').next().unwrap_or(&b).to_string())
                    .collect();
                if !names.is_empty() {
                    raw.attrs.insert("supertypes".to_string(), names.join(","));
                }
            }
        }
        _ => {}
    }
}

/// Line of the first error or missing node, following `has_error` down the tree.
fn first_error_line(root: Node) -> Option<u32> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row as u32 + 1);
        }
        if !node.has_error() || !cursor.goto_first_child() {
            return None;
        }
        while !cursor.node().has_error() {
            if !cursor.goto_next_sibling() {
                return None;
            }
        }
    }
}
