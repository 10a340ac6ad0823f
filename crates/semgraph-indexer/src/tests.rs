//! Unit tests for semgraph-indexer module

use std::path::Path;

use semgraph_core::{FileRecord, Resolution, fingerprint, graph_path, load_cache, to_canonical_json};

use crate::*;

const BUILT_AT: &str = "2024-01-01T00:00:00Z";

fn record(path: &str, code: &str) -> FileRecord {
    let parser = TreeSitterParser::new(FileType::Rust);
    let root = parser.parse(Path::new(path), code.as_bytes()).unwrap();
    SymbolExtractor::extract(path, &root).into_record(
        path,
        fingerprint(code.as_bytes()),
        parser.label(),
        BUILT_AT.to_string(),
    )
}

fn write(root: &Path, rel: &str, code: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, code).unwrap();
}

fn coordinator(root: &Path) -> Coordinator {
    Coordinator::new(root, IndexConfig::default())
}

// ── Graph builder ───────────────────────────────────────────

#[test]
fn test_build_is_order_independent() {
    let records = vec![
        record("src/a.rs", "fn a() {\n    b();\n}\n"),
        record("src/b.rs", "fn b() {\n    c();\n}\n"),
        record("src/c.rs", "fn c() {}\n"),
    ];
    let forward = build_snapshot(&records, BUILT_AT.to_string()).unwrap();
    let reversed = build_snapshot(records.iter().rev(), BUILT_AT.to_string()).unwrap();

    assert_eq!(forward, reversed);
    assert_eq!(to_canonical_json(&forward).unwrap(), to_canonical_json(&reversed).unwrap());
    assert_eq!(forward.meta.files_total, 3);
    assert_eq!(forward.edges.len(), 2);
}

#[test]
fn test_repeated_calls_collapse_into_one_edge() {
    let records = vec![record(
        "src/lib.rs",
        "fn a() {\n    b();\n    b();\n}\n\nfn b() {}\n",
    )];
    let snapshot = build_snapshot(&records, BUILT_AT.to_string()).unwrap();

    assert_eq!(snapshot.edges.len(), 1);
    let edge = &snapshot.edges[0];
    assert_eq!(edge.caller.as_str(), "src/lib.rs::a::function");
    assert_eq!(edge.callee.as_str(), "src/lib.rs::b::function");
    assert_eq!(edge.multiplicity, 2);
    assert_eq!(edge.sites.iter().map(|s| s.line).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(edge.resolution, Resolution::Resolved);
}

#[test]
fn test_unresolved_call_targets_external_stub() {
    let records = vec![record("src/lib.rs", "fn a() {\n    spawn_worker(1);\n}\n")];
    let snapshot = build_snapshot(&records, BUILT_AT.to_string()).unwrap();

    let stub = snapshot
        .symbols
        .iter()
        .find(|s| s.id.as_str() == "external::spawn_worker")
        .unwrap();
    assert!(stub.external);
    assert!(stub.file.is_empty());

    let edge = &snapshot.edges[0];
    assert_eq!(edge.callee, stub.id);
    assert_eq!(edge.resolution, Resolution::External);
    assert!(edge.external);
    // Stubs are not files.
    assert_eq!(snapshot.files.len(), 1);
}

#[test]
fn test_ambiguous_call_edges_to_each_candidate() {
    let records = vec![
        record("src/main.rs", "fn main() {\n    Engine::run();\n    run();\n}\n"),
        record("src/engine.rs", "struct Engine;\n\nimpl Engine {\n    fn run() {}\n}\n"),
        record("src/motor.rs", "struct Motor;\n\nimpl Motor {\n    fn run() {}\n}\n"),
    ];
    let snapshot = build_snapshot(&records, BUILT_AT.to_string()).unwrap();

    let from_main: Vec<(&str, Resolution, u32)> = snapshot
        .edges
        .iter()
        .filter(|e| e.caller.as_str() == "src/main.rs::main::function")
        .map(|e| (e.callee.as_str(), e.resolution, e.multiplicity))
        .collect();
    assert_eq!(
        from_main,
        vec![
            // The qualified site resolved, so the merged edge is resolved.
            ("src/engine.rs::Engine.run::method", Resolution::Resolved, 2),
            ("src/motor.rs::Motor.run::method", Resolution::Ambiguous, 1),
        ]
    );
}

#[test]
fn test_sibling_methods_resolve_within_impl() {
    let records = vec![
        record(
            "src/store.rs",
            "struct Store;\n\nimpl Store {\n    fn save(&self) {\n        self.flush();\n    }\n\n    fn flush(&self) {}\n}\n",
        ),
        record("src/other.rs", "fn flush() {}\n"),
    ];
    let snapshot = build_snapshot(&records, BUILT_AT.to_string()).unwrap();

    assert_eq!(snapshot.edges.len(), 1);
    assert_eq!(snapshot.edges[0].callee.as_str(), "src/store.rs::Store.flush::method");
    assert_eq!(snapshot.edges[0].resolution, Resolution::Resolved);
}

#[test]
fn test_writes_resolve_to_stored_values() {
    let code = "struct Store {\n    count: u32,\n}\n\nimpl Store {\n    fn bump(&mut self) {\n        self.count += 1;\n        self.count = 0;\n    }\n}\n\nstatic mut TOTAL: u32 = 0;\n\nfn reset() {\n    unsafe { TOTAL = 0; }\n    missing = 1;\n}\n";
    let records = vec![record("src/store.rs", code), record("src/other.rs", "static mut TOTAL: u32 = 1;\n")];
    let snapshot = build_snapshot(&records, BUILT_AT.to_string()).unwrap();

    let writes: Vec<(&str, &str, u32, Vec<u32>)> = snapshot
        .mutations
        .iter()
        .map(|m| (m.writer.as_str(), m.target.as_str(), m.multiplicity, m.sites.iter().map(|s| s.line).collect()))
        .collect();
    // The write to an undeclared name is dropped; the other file's TOTAL is never a candidate.
    assert_eq!(
        writes,
        vec![
            ("src/store.rs::Store.bump::method", "src/store.rs::Store.count::property", 2, vec![7, 8]),
            ("src/store.rs::reset::function", "src/store.rs::TOTAL::other", 1, vec![15]),
        ]
    );
    assert!(snapshot.mutations.iter().all(|m| m.resolution == Resolution::Resolved));
    assert!(snapshot.edges.is_empty());
}

#[test]
fn test_same_path_twice_is_corrupt() {
    let a = record("src/a.rs", "fn a() {}\n");
    let err = build_snapshot([&a, &a], BUILT_AT.to_string()).unwrap_err();
    assert!(matches!(err, IndexError::CorruptState(_)));
}

#[test]
fn test_extracted_call_sites() {
    let record = record("src/lib.rs", "fn a() {\n    b(1);\n}\n");
    insta::assert_json_snapshot!(record.call_sites, @r#"
    [
      {
        "caller": "src/lib.rs::a::function",
        "callee": "b",
        "arity": 1,
        "line": 2
      }
    ]
    "#);
}

#[test]
fn test_empty_record_set() {
    let snapshot = build_snapshot(std::iter::empty::<&FileRecord>(), BUILT_AT.to_string()).unwrap();
    assert!(snapshot.symbols.is_empty());
    assert!(snapshot.edges.is_empty());
    assert_eq!(snapshot.meta.files_total, 0);
}

// ── Coordinator ─────────────────────────────────────────────

#[test]
fn test_refresh_reparses_only_changed_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {\n    b();\n}\n");
    write(root, "src/b.rs", "fn b() {}\n");
    write(root, "src/c.rs", "fn c() {}\n");

    let coordinator = coordinator(root);
    let first = coordinator.build(&CancelFlag::new()).unwrap();
    assert_eq!(first.report.files_reparsed, 3);
    assert_eq!(serde_json::to_value(&first.report).unwrap()["mode"], "full");

    write(root, "src/c.rs", "fn c() {\n    a();\n}\n");
    let refreshed = coordinator.refresh(&CancelFlag::new()).unwrap();
    assert_eq!(refreshed.report.files_reparsed, 1);
    assert_eq!(refreshed.report.files_reused, 2);
    assert_eq!(refreshed.graph.edge_count(), 2);

    let rebuilt = coordinator.build(&CancelFlag::new()).unwrap();
    assert_eq!(rebuilt.graph.snapshot(), refreshed.graph.snapshot());
}

#[test]
fn test_parse_failure_keeps_stale_record() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/lib.rs", "fn keep() {}\n");
    let coordinator = coordinator(root);
    coordinator.build(&CancelFlag::new()).unwrap();

    write(root, "src/lib.rs", "fn keep( {\n");
    let outcome = coordinator.refresh(&CancelFlag::new()).unwrap();

    assert_eq!(outcome.report.stale.len(), 1);
    assert!(outcome.report.failures.is_empty());
    assert!(outcome.graph.contains("src/lib.rs::keep::function"));
    assert!(outcome.graph.files()[0].stale);
}

#[test]
fn test_parse_failure_without_history_is_excluded() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/ok.rs", "fn ok() {}\n");
    write(root, "src/broken.rs", "fn broken( {\n");

    let outcome = coordinator(root).build(&CancelFlag::new()).unwrap();
    assert_eq!(outcome.report.failures.len(), 1);
    assert_eq!(outcome.report.failures[0].path, "src/broken.rs");
    assert_eq!(outcome.graph.files().len(), 1);
}

#[test]
fn test_deeply_nested_file_fails_alone() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    let depth = 5_000;
    write(root, "app/ok.py", "def ok():\n    return 1\n");
    write(
        root,
        "app/deep.py",
        &format!("def deep():\n    return {}{}\n", "[".repeat(depth), "]".repeat(depth)),
    );

    let outcome = coordinator(root).build(&CancelFlag::new()).unwrap();
    assert_eq!(outcome.report.failures.len(), 1);
    assert_eq!(outcome.report.failures[0].path, "app/deep.py");
    assert!(outcome.report.failures[0].message.contains("nesting too deep"));
    assert!(outcome.graph.contains("app/ok.py::ok::function"));
    assert!(!outcome.graph.contains("app/deep.py::deep::function"));
}

#[test]
fn test_removed_files_are_pruned() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {}\n");
    write(root, "src/gone.rs", "fn gone() {}\n");
    let coordinator = coordinator(root);
    coordinator.build(&CancelFlag::new()).unwrap();

    std::fs::remove_file(root.join("src/gone.rs")).unwrap();
    let outcome = coordinator.refresh(&CancelFlag::new()).unwrap();

    assert_eq!(outcome.report.files_removed, 1);
    assert!(!outcome.graph.contains("src/gone.rs::gone::function"));
    let cache = load_cache(root).unwrap().unwrap();
    assert!(!cache.files.contains_key("src/gone.rs"));
}

#[test]
fn test_cancelled_build_persists_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "src/a.rs", "fn a() {}\n");

    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = coordinator(dir.path()).build(&cancel).unwrap_err();

    assert!(matches!(err, IndexError::Cancelled));
    assert!(!graph_path(dir.path()).exists());
    assert!(load_cache(dir.path()).unwrap().is_none());
}

#[test]
fn test_corrupt_cache_forces_full_rebuild() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {}\n");
    let coordinator = coordinator(root);
    coordinator.build(&CancelFlag::new()).unwrap();

    std::fs::write(semgraph_core::cache_path(root), "{ truncated").unwrap();
    let outcome = coordinator.refresh(&CancelFlag::new()).unwrap();

    assert_eq!(outcome.report.mode, BuildMode::Full);
    assert_eq!(outcome.report.files_reparsed, 1);
    assert!(load_cache(root).unwrap().is_some());
}

#[test]
fn test_parser_upgrade_forces_full_rebuild() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {}\n");
    let coordinator = coordinator(root);
    coordinator.build(&CancelFlag::new()).unwrap();

    let mut cache = load_cache(root).unwrap().unwrap();
    cache
        .parser_versions
        .insert("tree-sitter-rust".to_string(), "0.1".to_string());
    semgraph_core::save_cache(root, &cache).unwrap();

    let outcome = coordinator.refresh(&CancelFlag::new()).unwrap();
    assert_eq!(outcome.report.mode, BuildMode::Full);
    assert_eq!(outcome.report.files_reused, 0);
}

#[test]
fn test_load_for_query_merges_when_graph_is_behind_cache() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {\n    b();\n}\n");
    write(root, "src/b.rs", "fn b() {}\n");
    let coordinator = coordinator(root);
    let built = coordinator.build(&CancelFlag::new()).unwrap();

    // Simulate a crash between the cache and graph writes.
    let mut stale_graph = built.graph.snapshot().clone();
    stale_graph.meta.content_digest = "outdated".to_string();
    stale_graph.edges.clear();
    semgraph_core::save_graph(root, &stale_graph).unwrap();

    let graph = coordinator.load_for_query().unwrap();
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.meta().content_digest, built.graph.meta().content_digest);
}

#[test]
fn test_load_for_query_builds_when_nothing_is_indexed() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "src/a.rs", "fn a() {}\n");

    let graph = coordinator(dir.path()).load_for_query().unwrap();
    assert!(graph.contains("src/a.rs::a::function"));
    assert!(graph_path(dir.path()).exists());
}

#[test]
fn test_refresh_into_swaps_handle() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {}\n");
    let coordinator = coordinator(root);
    let handle = semgraph_core::SnapshotHandle::new(coordinator.build(&CancelFlag::new()).unwrap().graph);
    let before = handle.current();

    write(root, "src/b.rs", "fn b() {}\n");
    let report = coordinator.refresh_into(&handle, &CancelFlag::new()).unwrap();

    assert_eq!(report.files_reparsed, 1);
    assert_eq!(before.local_count(), 1);
    assert_eq!(handle.current().local_count(), 2);
    assert!(handle.current().contains("src/b.rs::b::function"));
}

#[test]
fn test_unchanged_content_keeps_graph_bytes() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {\n    b();\n}\n\nfn b() {}\n");
    let coordinator = coordinator(root);

    coordinator.build(&CancelFlag::new()).unwrap();
    let first = std::fs::read(graph_path(root)).unwrap();
    coordinator.build(&CancelFlag::new()).unwrap();
    let second = std::fs::read(graph_path(root)).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_freshness_is_recorded_in_graph_meta() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.rs", "fn a() {}\n");
    write(root, "src/b.rs", "fn b() {}\n");
    let coordinator = coordinator(root);

    let built = coordinator.build(&CancelFlag::new()).unwrap();
    let freshness = built.graph.meta().freshness;
    assert_eq!((freshness.files_reparsed, freshness.files_reused), (2, 0));

    write(root, "src/b.rs", "fn b() {\n    a();\n}\n");
    let refreshed = coordinator.refresh(&CancelFlag::new()).unwrap();
    let freshness = refreshed.graph.meta().freshness;
    assert_eq!((freshness.files_reparsed, freshness.files_reused), (1, 1));

    // Nothing changed: the report counts the no-op, the graph keeps the last real build.
    let again = coordinator.refresh(&CancelFlag::new()).unwrap();
    assert_eq!((again.report.files_reparsed, again.report.files_reused), (0, 2));
    assert_eq!(again.graph.meta().freshness, freshness);

    let persisted = semgraph_core::load_graph(root).unwrap().unwrap();
    assert_eq!(persisted.meta.freshness, freshness);
}
