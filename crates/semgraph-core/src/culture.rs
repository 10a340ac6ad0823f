//! Culture classification for declarations
//!
//! Every symbol gets exactly one tag, decided once at extraction time from its
//! path and its name/shape. Rules are checked in order and the first match wins:
//! Auditor, View, Law, then Citizen as the default.

use crate::model::{Culture, SymbolKind};

const AUDITOR_DIRS: &[&str] = &["tests", "test"];
const VIEW_DIRS: &[&str] = &["ui", "views"];
const LAW_DIRS: &[&str] = &["config", "configs", "policy", "rules"];

const VIEW_NAME_SUFFIXES: &[&str] = &["ViewController", "View", "Screen"];
const VIEW_SUPERTYPES: &[&str] = &["View", "UIView", "UIViewController", "NSView", "NSViewController"];
const VIEW_FUNCTIONS: &[&str] = &["body", "render", "makeui"];
const LAW_NAME_SUFFIXES: &[&str] = &["Config", "Configuration", "Constants", "Policy", "Rules", "Settings"];

/// What the classifier knows about a declaration.
#[derive(Debug, Clone, Copy)]
pub struct CultureInput<'a> {
    /// Repo-relative path, forward slashes.
    pub path: &'a str,
    pub name: &'a str,
    pub kind: SymbolKind,
    /// Name of the nearest enclosing type or extension, if any.
    pub enclosing_type: Option<&'a str>,
    /// Declared supertypes / conformances of the declaration itself.
    pub supertypes: &'a [String],
}

pub fn classify(input: &CultureInput<'_>) -> Culture {
    if is_auditor(input) {
        Culture::Auditor
    } else if is_view(input) {
        Culture::View
    } else if is_law(input) {
        Culture::Law
    } else {
        Culture::Citizen
    }
}

/// Weight applied to risk scores for code of a given culture.
pub fn multiplier(culture: Culture) -> f64 {
    match culture {
        Culture::Law => 1.4,
        Culture::Citizen => 1.0,
        Culture::View => 0.8,
        Culture::Auditor => 0.2,
    }
}

fn is_auditor(input: &CultureInput<'_>) -> bool {
    if has_dir_segment(input.path, AUDITOR_DIRS) {
        return true;
    }
    let stem = file_stem(input.path);
    if AUDITOR_DIRS.iter().any(|d| stem.eq_ignore_ascii_case(d))
        || stem.ends_with("Test")
        || stem.ends_with("Tests")
        || stem.ends_with("_test")
        || stem.ends_with("_tests")
        || stem.starts_with("test_")
    {
        return true;
    }
    type_names(input).any(|name| name.ends_with("Tests"))
}

fn is_view(input: &CultureInput<'_>) -> bool {
    if has_dir_segment(input.path, VIEW_DIRS) {
        return true;
    }
    if type_names(input).any(|name| VIEW_NAME_SUFFIXES.iter().any(|s| name.ends_with(s))) {
        return true;
    }
    if input
        .supertypes
        .iter()
        .any(|s| VIEW_SUPERTYPES.contains(&s.as_str()))
    {
        return true;
    }
    input.kind.is_callable() && VIEW_FUNCTIONS.contains(&input.name.to_lowercase().as_str())
}

fn is_law(input: &CultureInput<'_>) -> bool {
    if has_dir_segment(input.path, LAW_DIRS) {
        return true;
    }
    type_names(input).any(|name| LAW_NAME_SUFFIXES.iter().any(|s| name.ends_with(s)))
}

/// The declaration's own name when it is a type, plus the enclosing type name.
fn type_names<'a>(input: &CultureInput<'a>) -> impl Iterator<Item = &'a str> {
    let own = (input.kind == SymbolKind::Type).then_some(input.name);
    own.into_iter().chain(input.enclosing_type)
}

fn has_dir_segment(path: &str, dirs: &[&str]) -> bool {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    segments
        .iter()
        .any(|segment| dirs.iter().any(|d| segment.eq_ignore_ascii_case(d)))
}

fn file_stem(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}
