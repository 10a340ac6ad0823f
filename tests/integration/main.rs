//! Integration tests for semgraph
//!
//! These tests index small scratch repositories end to end and query the result.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use semgraph_core::{Culture, Freshness, GraphSnapshot, Resolution, graph_path, load_graph, to_canonical_json};
use semgraph_indexer::{CancelFlag, Coordinator, IndexConfig};
use semgraph_query::{Level, QueryEngine, call_tool};
use serde_json::json;
use tempfile::TempDir;

const FILES: &[(&str, &str)] = &[
    (
        "app/store.py",
        "class Store:\n    def save(self):\n        self.flush()\n        helper()\n\n    def flush(self):\n        pass\n\n\ndef helper():\n    return limit()\n",
    ),
    ("config/settings.py", "def limit():\n    return 10\n"),
    (
        "tests/test_store.py",
        "from app.store import Store\n\n\ndef test_save():\n    Store().save()\n",
    ),
    ("ui/panel.py", "def render():\n    return 1\n"),
    ("src/lib.rs", "pub fn entry() {\n    run_external(1);\n}\n"),
    ("README.md", "# not indexed\n"),
];

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (rel, content) in files {
        write(dir.path(), rel, content);
    }
    dir
}

fn coordinator(root: &Path) -> Coordinator {
    Coordinator::new(root, IndexConfig::default())
}

fn engine(root: &Path) -> QueryEngine {
    QueryEngine::new(Arc::new(coordinator(root).load_for_query().unwrap()))
}

/// The persisted graph with its timestamp and build costs blanked out.
fn normalized(root: &Path) -> String {
    let mut snapshot: GraphSnapshot = load_graph(root).unwrap().unwrap();
    snapshot.meta.built_at = String::new();
    snapshot.meta.freshness = Freshness::default();
    to_canonical_json(&snapshot).unwrap()
}

fn ids(root: &Path) -> Vec<String> {
    let snapshot = load_graph(root).unwrap().unwrap();
    snapshot.symbols.into_iter().map(|s| s.id.0).collect()
}

#[test]
fn test_build_is_deterministic() {
    let forward = repo(FILES);
    let reversed: Vec<(&str, &str)> = FILES.iter().rev().copied().collect();
    let backward = repo(&reversed);

    coordinator(forward.path()).build(&CancelFlag::new()).unwrap();
    coordinator(backward.path()).build(&CancelFlag::new()).unwrap();

    assert_eq!(normalized(forward.path()), normalized(backward.path()));
}

#[test]
fn test_call_graph_end_to_end() {
    let dir = repo(FILES);
    let outcome = coordinator(dir.path()).build(&CancelFlag::new()).unwrap();
    assert_eq!(outcome.report.files_total, 5);
    assert!(outcome.report.failures.is_empty());

    let graph = outcome.graph;
    let edge = |caller: &str, callee: &str| {
        graph
            .edges()
            .find(|e| e.caller.as_str() == caller && e.callee.as_str() == callee)
            .map(|e| e.resolution)
    };
    assert_eq!(
        edge("app/store.py::Store.save::method", "app/store.py::Store.flush::method"),
        Some(Resolution::Resolved)
    );
    assert_eq!(
        edge("app/store.py::Store.save::method", "app/store.py::helper::function"),
        Some(Resolution::Resolved)
    );
    assert_eq!(
        edge("app/store.py::helper::function", "config/settings.py::limit::function"),
        Some(Resolution::Resolved)
    );
    assert_eq!(
        edge("tests/test_store.py::test_save::function", "app/store.py::Store.save::method"),
        Some(Resolution::Resolved)
    );
    assert_eq!(
        edge("src/lib.rs::entry::function", "external::run_external"),
        Some(Resolution::External)
    );
}

#[test]
fn test_culture_tags() {
    let dir = repo(FILES);
    let graph = coordinator(dir.path()).build(&CancelFlag::new()).unwrap().graph;
    let culture = |id: &str| graph.symbol(id).map(|s| s.culture);

    assert_eq!(culture("tests/test_store.py::test_save::function"), Some(Culture::Auditor));
    assert_eq!(culture("ui/panel.py::render::function"), Some(Culture::View));
    assert_eq!(culture("config/settings.py::limit::function"), Some(Culture::Law));
    assert_eq!(culture("app/store.py::Store.save::method"), Some(Culture::Citizen));
}

#[test]
fn test_refresh_matches_full_build() {
    let dir = repo(FILES);
    let root = dir.path();
    coordinator(root).build(&CancelFlag::new()).unwrap();

    write(root, "config/settings.py", "def limit():\n    return clamp(10)\n\n\ndef clamp(value):\n    return value\n");
    let refreshed = coordinator(root).refresh(&CancelFlag::new()).unwrap();
    assert_eq!(refreshed.report.files_reparsed, 1);
    assert_eq!(refreshed.report.files_reused, 4);
    let incremental = normalized(root);

    coordinator(root).clear().unwrap();
    coordinator(root).build(&CancelFlag::new()).unwrap();
    assert_eq!(incremental, normalized(root));
}

#[test]
fn test_ids_survive_unrelated_edits() {
    let dir = repo(FILES);
    let root = dir.path();
    coordinator(root).build(&CancelFlag::new()).unwrap();
    let before = ids(root);

    let edited = "import os\n\n\ndef first():\n    return 0\n\n\nclass Store:\n    def save(self):\n        self.flush()\n        helper()\n        return True\n\n    def flush(self):\n        pass\n\n\ndef helper():\n    return limit()\n";
    write(root, "app/store.py", edited);
    coordinator(root).refresh(&CancelFlag::new()).unwrap();
    let after = ids(root);

    for id in &before {
        assert!(after.contains(id), "{} disappeared", id);
    }
    assert!(after.contains(&"app/store.py::first::function".to_string()));
}

#[test]
fn test_rename_changes_only_the_renamed_id() {
    let dir = repo(&[
        ("src/a.rs", "fn a() {\n    b();\n}\n\nfn b() {}\n\nfn c() {\n    log_event(1);\n}\n"),
        ("src/main.rs", "fn main() {\n    a();\n    c();\n}\n"),
    ]);
    let root = dir.path();
    coordinator(root).build(&CancelFlag::new()).unwrap();
    let before = load_graph(root).unwrap().unwrap();

    write(root, "src/a.rs", "fn a() {\n    bb();\n}\n\nfn bb() {}\n\nfn c() {\n    log_event(1);\n}\n");
    coordinator(root).refresh(&CancelFlag::new()).unwrap();
    let after = load_graph(root).unwrap().unwrap();

    let ids = |snapshot: &GraphSnapshot| -> Vec<String> { snapshot.symbols.iter().map(|s| s.id.0.clone()).collect() };
    let (old, new) = (ids(&before), ids(&after));
    for kept in ["src/a.rs::a::function", "src/a.rs::c::function", "src/main.rs::main::function"] {
        assert!(old.contains(&kept.to_string()) && new.contains(&kept.to_string()), "{} changed", kept);
    }
    assert!(old.contains(&"src/a.rs::b::function".to_string()));
    assert!(!new.contains(&"src/a.rs::b::function".to_string()));
    assert!(new.contains(&"src/a.rs::bb::function".to_string()));

    let from_a: Vec<&str> = after
        .edges
        .iter()
        .filter(|e| e.caller.as_str() == "src/a.rs::a::function")
        .map(|e| e.callee.as_str())
        .collect();
    assert_eq!(from_a, vec!["src/a.rs::bb::function"]);

    // Every edge not touching the renamed function serializes identically.
    let untouched = |snapshot: &GraphSnapshot| -> Vec<String> {
        snapshot
            .edges
            .iter()
            .filter(|e| !e.callee.as_str().starts_with("src/a.rs::b"))
            .map(|e| serde_json::to_string(e).unwrap())
            .collect()
    };
    assert_eq!(untouched(&before).len(), 3);
    assert_eq!(untouched(&before), untouched(&after));
}

#[test]
fn test_writes_and_public_api_end_to_end() {
    let dir = repo(&[(
        "src/counter.rs",
        "pub struct Counter {\n    pub total: u32,\n}\n\nimpl Counter {\n    pub fn bump(&mut self) {\n        self.total += 1;\n    }\n}\n",
    )]);
    let engine = engine(dir.path());

    let summary = engine.graph_summary();
    assert_eq!(summary.counts.mutation_edges, 1);
    assert_eq!(summary.counts.public_api_symbols, 3);
    assert_eq!(summary.freshness.files_reparsed, 1);
    assert_eq!(summary.hotspots[0].symbol_id.as_str(), "src/counter.rs::Counter.bump::method");

    let guardrail = engine.refactor_guardrail("src/counter.rs::Counter.total::property").unwrap();
    let writers: Vec<&str> = guardrail.evidence.writers.iter().map(|w| w.as_str()).collect();
    assert_eq!(writers, vec!["src/counter.rs::Counter.bump::method"]);
    assert!(guardrail.evidence.metrics.public_api);
}

#[test]
fn test_empty_repository() {
    let dir = TempDir::new().unwrap();
    let outcome = coordinator(dir.path()).build(&CancelFlag::new()).unwrap();
    assert_eq!(outcome.report.files_total, 0);
    assert!(graph_path(dir.path()).exists());

    let engine = QueryEngine::new(Arc::new(outcome.graph));
    let summary = engine.graph_summary();
    assert_eq!(summary.counts.symbols, 0);
    assert_eq!(summary.counts.edges, 0);
    assert!(summary.hotspots.is_empty());
    assert!(engine.find_symbol("anything", None, None, None).unwrap().is_empty());
}

#[test]
fn test_queries_over_indexed_repo() {
    let dir = repo(FILES);
    let engine = engine(dir.path());

    let callers = engine
        .get_callers("config/settings.py::limit::function", Some(3))
        .unwrap();
    let reached: Vec<(&str, u32)> = callers.nodes.iter().map(|n| (n.id.as_str(), n.distance)).collect();
    assert_eq!(
        reached,
        vec![
            ("app/store.py::helper::function", 1),
            ("app/store.py::Store.save::method", 2),
            ("tests/test_store.py::test_save::function", 3),
        ]
    );

    let impact = engine.impact_radius("app/store.py", "file", None).unwrap();
    assert_eq!(impact.files_touched, vec!["tests/test_store.py".to_string()]);
    assert_eq!(impact.culture_distribution.get(&Culture::Auditor), Some(&1));

    let guardrail = engine.refactor_guardrail("config/settings.py::limit::function").unwrap();
    assert_eq!(guardrail.level, Level::Proceed);
    assert!(!guardrail.hard_block);
    assert_eq!(guardrail.direct_callers, 1);
    assert_eq!(guardrail.indirect_callers, 1);
}

#[test]
fn test_tool_dispatch_over_indexed_repo() {
    let dir = repo(FILES);
    let engine = engine(dir.path());

    let found = call_tool(&engine, "find_symbol", json!({ "query": "save", "culture": "Citizen" })).unwrap();
    assert_eq!(found[0]["id"], json!("app/store.py::Store.save::method"));

    let summary = call_tool(&engine, "graph_summary", json!({})).unwrap();
    assert_eq!(summary["counts"]["files"], json!(5));
    assert_eq!(summary["counts"]["external_symbols"], json!(1));

    let err = call_tool(&engine, "get_callees", json!({ "symbol_id": "app/store.py::helper::function", "depth": 9 }));
    assert!(err.is_err());
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_semgraph"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("semgraph"));
    assert!(stdout.contains("refactoring guardrails"));
}

#[test]
fn test_cli_build_and_query() {
    let dir = repo(FILES);
    let root = dir.path().to_str().unwrap();

    let build = Command::new(env!("CARGO_BIN_EXE_semgraph"))
        .args(["--root", root, "build"])
        .output()
        .expect("Failed to execute command");
    assert!(build.status.success());
    let report: serde_json::Value = serde_json::from_slice(&build.stdout).unwrap();
    assert_eq!(report["mode"], json!("full"));
    assert_eq!(report["files_reparsed"], json!(5));

    let query = Command::new(env!("CARGO_BIN_EXE_semgraph"))
        .args([
            "--root",
            root,
            "query",
            "get_callers",
            "--args",
            r#"{"symbol_id": "app/store.py::helper::function"}"#,
        ])
        .output()
        .expect("Failed to execute command");
    assert!(query.status.success());
    let result: serde_json::Value = serde_json::from_slice(&query.stdout).unwrap();
    assert_eq!(result["nodes"][0]["id"], json!("app/store.py::Store.save::method"));

    let bad = Command::new(env!("CARGO_BIN_EXE_semgraph"))
        .args(["--root", root, "query", "get_callers", "--args", "{}"])
        .output()
        .expect("Failed to execute command");
    assert!(!bad.status.success());
}
