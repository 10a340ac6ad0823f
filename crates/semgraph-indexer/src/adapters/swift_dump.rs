//! Swift adapter over `swiftc -dump-parse`
//!
//! The frontend prints its untyped AST as an S-expression, one node per
//! parenthesised group:
//!
//! ```text
//! (func_decl range=[/repo/Logic.swift:3:5 - line:5:5] "helper(value:)"
//!   (brace_stmt ...))
//! ```
//!
//! The first quoted string becomes the node name, `key=value` pairs and bare
//! flags become attributes, and `range=[...]` becomes the span. The untyped
//! dump omits access modifiers, so declarations take theirs from the first
//! line of their source range.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use semgraph_core::Span;

use crate::error::ParseError;
use crate::raw::{MAX_NESTING_DEPTH, ParseAdapter, RawNode};

pub const SWIFT_ADAPTER: &str = "swiftc";
pub const SWIFT_DUMP_VERSION: &str = "dump-parse-v1";

/// Environment override for the frontend binary.
pub const SWIFTC_ENV: &str = "SEMGRAPH_SWIFTC";

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":(\d+):(\d+) - line:(\d+):(\d+)").expect("valid swift range regex")
});

static ACCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(public|private|fileprivate|internal|open)\b").expect("valid swift access regex")
});

/// Declarations whose name is a full signature such as `run(with:)`.
const SIGNATURE_KINDS: &[&str] = &["func_decl", "constructor_decl", "subscript_decl"];

#[derive(Debug, Clone)]
pub struct SwiftDumpParser {
    swiftc: PathBuf,
}

impl SwiftDumpParser {
    pub fn new(swiftc: impl Into<PathBuf>) -> Self {
        SwiftDumpParser { swiftc: swiftc.into() }
    }

    pub fn swiftc(&self) -> &Path {
        &self.swiftc
    }
}

impl ParseAdapter for SwiftDumpParser {
    fn name(&self) -> &str {
        SWIFT_ADAPTER
    }

    fn version(&self) -> &str {
        SWIFT_DUMP_VERSION
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<RawNode, ParseError> {
        tracing::debug!("swiftc -dump-parse {}", path.display());
        let output = Command::new(&self.swiftc)
            .arg("-dump-parse")
            .arg(path)
            .output()
            .map_err(|e| ParseError::Frontend {
                path: path.to_path_buf(),
                message: format!("could not run {}: {}", self.swiftc.display(), e),
            })?;

        if !output.status.success() {
            return Err(ParseError::Frontend {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut root = if stdout.trim().is_empty() {
            // Some toolchains print the dump on stderr.
            parse_dump(path, &String::from_utf8_lossy(&output.stderr))?
        } else {
            parse_dump(path, &stdout)?
        };
        annotate_access(&mut root, source);
        Ok(root)
    }
}

/// Copy the access keyword on each declaration's first source line into an `access` attribute.
pub fn annotate_access(root: &mut RawNode, source: &[u8]) {
    let source = String::from_utf8_lossy(source);
    let lines: Vec<&str> = source.lines().collect();

    let mut pending: Vec<&mut RawNode> = vec![root];
    while let Some(node) = pending.pop() {
        if node.kind.ends_with("_decl") {
            let keyword = node
                .span
                .and_then(|span| (span.line_start as usize).checked_sub(1))
                .and_then(|index| lines.get(index))
                .and_then(|line| ACCESS_RE.captures(line))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
            if let Some(keyword) = keyword {
                node.attrs.insert("access".to_string(), keyword);
            }
        }
        pending.extend(node.children.iter_mut());
    }
}

// ── S-expression reader ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Quoted(String),
    /// Bare word; quoted and bracketed parts are kept inline, quotes stripped.
    Atom(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '"' | '\'' => {
                let (text, next) = read_quoted(&chars, i);
                tokens.push(Token::Quoted(text));
                i = next;
            }
            _ => {
                let mut atom = String::new();
                while i < chars.len() {
                    let c = chars[i];
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    match c {
                        '"' | '\'' => {
                            let (text, next) = read_quoted(&chars, i);
                            atom.push_str(&text);
                            i = next;
                        }
                        '[' => {
                            while i < chars.len() && chars[i] != ']' {
                                atom.push(chars[i]);
                                i += 1;
                            }
                            if i < chars.len() {
                                atom.push(']');
                                i += 1;
                            }
                        }
                        _ => {
                            atom.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }
    tokens
}

/// Read a quoted string starting at `start`; returns the unescaped text and the next index.
fn read_quoted(chars: &[char], start: usize) -> (String, usize) {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return (text, i + 1),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    (text, i)
}

/// Node under construction.
struct Pending {
    node: RawNode,
    positional: Option<String>,
}

impl Pending {
    fn new(kind: String) -> Self {
        Pending { node: RawNode::new(kind), positional: None }
    }

    fn atom(&mut self, atom: &str) {
        match atom.split_once('=') {
            Some(("range", value)) => {
                if let Some(span) = parse_range(value) {
                    self.node.span = Some(span);
                }
            }
            Some((key, value)) => {
                self.node.attrs.entry(key.to_string()).or_insert_with(|| value.to_string());
            }
            None => {
                self.node.attrs.entry(atom.to_string()).or_insert_with(|| "true".to_string());
            }
        }
    }

    fn finish(mut self) -> RawNode {
        let name = self
            .positional
            .take()
            .or_else(|| self.node.attr("name").map(str::to_string))
            .or_else(|| self.node.attr("field").map(str::to_string))
            .or_else(|| self.node.attr("decl").and_then(decl_base_name));

        if let Some(name) = name {
            if SIGNATURE_KINDS.contains(&self.node.kind.as_str()) && name.contains('(') {
                let base = name.split('(').next().unwrap_or_default().trim().to_string();
                self.node.attrs.insert("arity".to_string(), signature_arity(&name).to_string());
                self.node.attrs.insert("signature".to_string(), name);
                self.node.name = Some(base);
            } else {
                self.node.name = Some(name);
            }
        }
        self.node
    }
}

/// Parse the text printed by `swiftc -dump-parse` into a tree.
pub fn parse_dump(path: &Path, text: &str) -> Result<RawNode, ParseError> {
    let unbalanced = || ParseError::Frontend {
        path: path.to_path_buf(),
        message: "unbalanced parentheses in -dump-parse output".to_string(),
    };

    let mut stack: Vec<Pending> = Vec::new();
    let mut roots: Vec<RawNode> = Vec::new();
    let mut tokens = tokenize(text).into_iter().peekable();

    while let Some(token) = tokens.next() {
        match token {
            Token::Open => {
                let kind = match tokens.next() {
                    Some(Token::Atom(kind)) => kind,
                    _ => return Err(unbalanced()),
                };
                if stack.len() >= MAX_NESTING_DEPTH {
                    return Err(ParseError::too_deep(path));
                }
                stack.push(Pending::new(kind));
            }
            Token::Close => {
                let node = stack.pop().ok_or_else(unbalanced)?.finish();
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(node),
                    None => roots.push(node),
                }
            }
            Token::Quoted(text) => {
                if let Some(current) = stack.last_mut() {
                    current.positional.get_or_insert(text);
                }
            }
            Token::Atom(atom) => {
                // Diagnostics outside any node are ignored.
                let Some(current) = stack.last_mut() else {
                    continue;
                };
                if atom == "inherits:" {
                    // `inherits: Base, Proto` continues while items end with a comma.
                    let mut supertypes = Vec::new();
                    while let Some(Token::Atom(next)) = tokens.peek() {
                        if next.contains('=') {
                            break;
                        }
                        let more = next.ends_with(',');
                        supertypes.push(next.trim_end_matches(',').to_string());
                        tokens.next();
                        if !more {
                            break;
                        }
                    }
                    current.node.attrs.insert("supertypes".to_string(), supertypes.join(","));
                } else {
                    current.atom(&atom);
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(unbalanced());
    }

    match roots.len() {
        0 => Err(ParseError::Frontend {
            path: path.to_path_buf(),
            message: "empty -dump-parse output".to_string(),
        }),
        1 => Ok(roots.remove(0)),
        _ => {
            let mut file = RawNode::new("source_file");
            file.children = roots;
            Ok(file)
        }
    }
}

fn parse_range(value: &str) -> Option<Span> {
    let caps = RANGE_RE.captures(value)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    Some(Span::new(num(1)?, num(2)?, num(3)?, num(4)?))
}

/// `Module.(file).Logic.run(with:)@/path:3:5` -> `run`.
fn decl_base_name(decl: &str) -> Option<String> {
    let decl = decl.split('@').next().unwrap_or(decl);
    let last = decl.rsplit('.').find(|part| !part.is_empty())?;
    let base = last.split('(').next().unwrap_or(last).trim();
    (!base.is_empty()).then(|| base.to_string())
}

/// Number of argument labels in `name(a:b:)`.
fn signature_arity(signature: &str) -> usize {
    match (signature.find('('), signature.rfind(')')) {
        (Some(open), Some(close)) if close > open => signature[open + 1..close].matches(':').count(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"(source_file "/repo/Sources/Logic.swift"
  (class_decl range=[/repo/Sources/Logic.swift:1:1 - line:9:1] "LogicController" inherits: UIViewController, Runnable
    (func_decl range=[/repo/Sources/Logic.swift:2:3 - line:4:3] "helper(value:)" interface type='(Int) -> ()'
      (parameter_list
        (parameter "value" apiName=value))
      (brace_stmt range=[/repo/Sources/Logic.swift:2:30 - line:4:3]
        (call_expr type='<null>' arg_labels=_:
          (unresolved_dot_expr type='<null>' field='run' function_ref=unapplied
            (unresolved_decl_ref_expr type='<null>' name=self function_ref=unapplied))
          (argument_list labels=_:
            (argument
              (integer_literal_expr type='<null>' value=1))))))
    (var_decl range=[/repo/Sources/Logic.swift:5:7 - line:5:7] "count" let)))
"#;

    #[test]
    fn test_parse_dump_structure() {
        let root = parse_dump(Path::new("Logic.swift"), DUMP).unwrap();
        assert_eq!(root.kind, "source_file");
        assert_eq!(root.name.as_deref(), Some("/repo/Sources/Logic.swift"));

        let class = &root.children[0];
        assert_eq!(class.kind, "class_decl");
        assert_eq!(class.name.as_deref(), Some("LogicController"));
        assert_eq!(class.span, Some(Span::new(1, 1, 9, 1)));
        assert_eq!(class.supertypes(), vec!["UIViewController", "Runnable"]);

        let func = &class.children[0];
        assert_eq!(func.name.as_deref(), Some("helper"));
        assert_eq!(func.attr("signature"), Some("helper(value:)"));
        assert_eq!(func.attr("arity"), Some("1"));
        assert_eq!(func.attr("type"), Some("(Int) -> ()"));

        let var = &class.children[1];
        assert_eq!(var.name.as_deref(), Some("count"));
        assert!(var.has_flag("let"));
    }

    #[test]
    fn test_call_nodes_take_field_and_name_attrs() {
        let root = parse_dump(Path::new("Logic.swift"), DUMP).unwrap();
        let call = &root.children[0].children[0].children[1].children[0];
        assert_eq!(call.kind, "call_expr");

        let target = &call.children[0];
        assert_eq!(target.name.as_deref(), Some("run"));
        assert_eq!(target.children[0].name.as_deref(), Some("self"));
        assert_eq!(call.children[1].attr("labels"), Some("_:"));
    }

    #[test]
    fn test_declref_name_is_last_component() {
        assert_eq!(decl_base_name("Core.(file).Logic.run(with:)@/a.swift:3:5").as_deref(), Some("run"));
        assert_eq!(decl_base_name("Swift.print").as_deref(), Some("print"));
    }

    #[test]
    fn test_signature_arity() {
        assert_eq!(signature_arity("run()"), 0);
        assert_eq!(signature_arity("helper(value:)"), 1);
        assert_eq!(signature_arity("move(from:to:)"), 2);
    }

    #[test]
    fn test_access_comes_from_source_line() {
        let source = "open class LogicController: UIViewController, Runnable {\n  private func helper(value: Int) {\n    run(1)\n  }\n  let count = 0\n}\n";
        let mut root = parse_dump(Path::new("Logic.swift"), DUMP).unwrap();
        annotate_access(&mut root, source.as_bytes());

        let class = &root.children[0];
        assert_eq!(class.attr("access"), Some("open"));
        assert_eq!(class.children[0].attr("access"), Some("private"));
        // No keyword on the line: left to the default.
        assert_eq!(class.children[1].attr("access"), None);
        assert_eq!(root.attr("access"), None);
    }

    #[test]
    fn test_escaped_quotes() {
        let root = parse_dump(Path::new("a.swift"), r#"(string_literal_expr "say \"hi\"")"#).unwrap();
        assert_eq!(root.name.as_deref(), Some(r#"say "hi""#));
    }

    #[test]
    fn test_unbalanced_dump_is_error() {
        let err = parse_dump(Path::new("a.swift"), "(source_file (func_decl \"f()\"").unwrap_err();
        assert!(matches!(err, ParseError::Frontend { .. }));
        assert!(parse_dump(Path::new("a.swift"), "  ").is_err());
    }

    #[test]
    fn test_nesting_depth_is_capped() {
        let depth = MAX_NESTING_DEPTH + 1;
        let dump = format!("{}{}", "(paren_expr ".repeat(depth), ")".repeat(depth));
        let err = parse_dump(Path::new("a.swift"), &dump).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"));

        let depth = MAX_NESTING_DEPTH;
        let dump = format!("{}{}", "(paren_expr ".repeat(depth), ")".repeat(depth));
        assert!(parse_dump(Path::new("a.swift"), &dump).is_ok());
    }

    #[test]
    fn test_missing_frontend_is_reported() {
        let parser = SwiftDumpParser::new("/nonexistent/swiftc");
        let err = parser.parse(Path::new("a.swift"), b"").unwrap_err();
        assert!(matches!(err, ParseError::Frontend { .. }));
    }
}
