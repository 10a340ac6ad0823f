//! Orchestrates full and incremental indexing
//!
//! Files are extracted in parallel on rayon, then merged single-threaded.
//! The cache is persisted before the graph; a graph whose content digest
//! disagrees with the cache is rebuilt from cached records on load.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::SecondsFormat;
use rayon::prelude::*;
use semgraph_core::{
    CacheFile, CallGraph, FileRecord, Freshness, SnapshotHandle, clear_index, fingerprint, load_cache, load_graph, save_cache,
    save_graph,
};
use serde::Serialize;

use crate::adapters::AdapterRegistry;
use crate::builder::{build_snapshot, records_digest};
use crate::config::IndexConfig;
use crate::discover::{SourceFile, discover};
use crate::error::{IndexError, ParseError};
use crate::extractor::SymbolExtractor;

/// Cooperative cancellation, checked before every file.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Re-parse every file; the cache is only a fallback for failures.
    Full,
    /// Re-parse files whose fingerprint or parser changed.
    Refresh,
    /// Rebuild the graph from cached records without parsing.
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub mode: BuildMode,
    pub files_total: usize,
    pub files_reparsed: usize,
    pub files_reused: usize,
    pub files_removed: usize,
    /// Files left out of the graph: the parse failed and there was no older record.
    pub failures: Vec<FileFailure>,
    /// Files whose parse failed; their previous record was kept.
    pub stale: Vec<FileFailure>,
    /// Declaration kinds walked through without a symbol.
    pub skipped_kinds: BTreeSet<String>,
    pub symbols: usize,
    pub external_symbols: usize,
    pub edges: usize,
    pub mutation_edges: usize,
    pub duration_ms: u64,
}

impl BuildReport {
    fn new(mode: BuildMode) -> Self {
        BuildReport {
            mode,
            files_total: 0,
            files_reparsed: 0,
            files_reused: 0,
            files_removed: 0,
            failures: Vec::new(),
            stale: Vec::new(),
            skipped_kinds: BTreeSet::new(),
            symbols: 0,
            external_symbols: 0,
            edges: 0,
            mutation_edges: 0,
            duration_ms: 0,
        }
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: CallGraph,
    pub report: BuildReport,
}

enum FileOutcome {
    Reused(FileRecord),
    Parsed(FileRecord, BTreeSet<String>),
    Stale(FileRecord, String),
    Failed(String),
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

pub struct Coordinator {
    root: PathBuf,
    config: IndexConfig,
    registry: AdapterRegistry,
}

impl Coordinator {
    pub fn new(root: impl Into<PathBuf>, config: IndexConfig) -> Self {
        let registry = AdapterRegistry::with_defaults(config.swiftc_path());
        Self::with_registry(root, config, registry)
    }

    pub fn with_registry(root: impl Into<PathBuf>, config: IndexConfig, registry: AdapterRegistry) -> Self {
        Coordinator {
            root: root.into(),
            config,
            registry,
        }
    }

    /// Coordinator for `root` using its `.semgraph.toml`, if any.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let root = root.into();
        let config = IndexConfig::load(&root)?;
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Full rebuild: every discovered file is parsed again.
    pub fn build(&self, cancel: &CancelFlag) -> Result<BuildOutcome, IndexError> {
        self.run(BuildMode::Full, cancel)
    }

    /// Incremental rebuild: only changed files are parsed.
    pub fn refresh(&self, cancel: &CancelFlag) -> Result<BuildOutcome, IndexError> {
        self.run(BuildMode::Refresh, cancel)
    }

    /// Refresh and publish the new graph to readers of `handle`.
    pub fn refresh_into(&self, handle: &SnapshotHandle, cancel: &CancelFlag) -> Result<BuildReport, IndexError> {
        let outcome = self.refresh(cancel)?;
        handle.replace(outcome.graph);
        Ok(outcome.report)
    }

    pub fn clear(&self) -> Result<(), IndexError> {
        clear_index(&self.root)?;
        Ok(())
    }

    /// The persisted graph, repaired from the cache or rebuilt when it is missing or out of date.
    pub fn load_for_query(&self) -> Result<CallGraph, IndexError> {
        let cache = match load_cache(&self.root) {
            Ok(cache) => cache,
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Cache unreadable ({}), rebuilding index", e);
                return Ok(self.build(&CancelFlag::new())?.graph);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = match load_graph(&self.root) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Graph unreadable ({})", e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let Some(cache) = cache else {
            return match snapshot {
                Some(snapshot) => Ok(CallGraph::new(snapshot)?),
                None => {
                    tracing::info!("No index under {}, building", self.root.display());
                    Ok(self.build(&CancelFlag::new())?.graph)
                }
            };
        };

        if let Some(snapshot) = snapshot {
            if snapshot.meta.content_digest == cache.content_digest {
                match CallGraph::new(snapshot) {
                    Ok(graph) => return Ok(graph),
                    Err(e) => tracing::warn!("Graph inconsistent ({})", e),
                }
            } else {
                tracing::warn!("Graph does not match cache, merging from cached records");
            }
        }
        Ok(self.merge(&cache)?.graph)
    }

    /// Rebuild and persist the graph from cached records only.
    fn merge(&self, cache: &CacheFile) -> Result<BuildOutcome, IndexError> {
        let started = Instant::now();
        let mut snapshot = build_snapshot(cache.files.values(), now())?;
        snapshot.meta.freshness = Freshness {
            build_duration_ms: elapsed_ms(started),
            files_reparsed: 0,
            files_reused: cache.files.len(),
        };
        save_graph(&self.root, &snapshot)?;
        let graph = CallGraph::new(snapshot)?;

        let mut report = BuildReport::new(BuildMode::Merge);
        report.files_total = cache.files.len();
        report.files_reused = cache.files.len();
        self.finish(report, graph, started)
    }

    fn run(&self, mode: BuildMode, cancel: &CancelFlag) -> Result<BuildOutcome, IndexError> {
        let started = Instant::now();
        let files = discover(&self.root, &self.config, &self.registry)?;

        let mut mode = mode;
        let previous: BTreeMap<String, FileRecord> = match load_cache(&self.root) {
            Ok(Some(cache)) => {
                if cache.parser_versions != self.registry.versions() {
                    tracing::warn!("Cache was built by other parser versions, doing a full rebuild");
                    mode = BuildMode::Full;
                }
                cache.files
            }
            Ok(None) => BTreeMap::new(),
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Cache unreadable ({}), doing a full rebuild", e);
                mode = BuildMode::Full;
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        let previous_meta = match load_graph(&self.root) {
            Ok(snapshot) => snapshot.map(|s| s.meta),
            Err(e) if e.is_corrupt() => {
                tracing::warn!("Graph unreadable ({}), it will be replaced", e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Indexing {} files under {} ({:?})", files.len(), self.root.display(), mode);
        let outcomes = self.extract_all(&files, &previous, mode, cancel)?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let mut report = BuildReport::new(mode);
        report.files_total = files.len();
        let mut records: BTreeMap<String, FileRecord> = BTreeMap::new();
        for (path, outcome) in outcomes {
            match outcome {
                FileOutcome::Reused(record) => {
                    report.files_reused += 1;
                    records.insert(path, record);
                }
                FileOutcome::Parsed(record, skipped) => {
                    report.files_reparsed += 1;
                    report.skipped_kinds.extend(skipped);
                    records.insert(path, record);
                }
                FileOutcome::Stale(record, message) => {
                    report.stale.push(FileFailure { path: path.clone(), message });
                    records.insert(path, record);
                }
                FileOutcome::Failed(message) => report.failures.push(FileFailure { path, message }),
            }
        }
        let discovered: BTreeSet<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        report.files_removed = previous
            .keys()
            .filter(|path| !discovered.contains(path.as_str()))
            .count();

        // Identical content keeps its timestamp and freshness so the graph file is byte-identical.
        let digest = records_digest(records.values());
        let (built_at, freshness) = match previous_meta {
            Some(meta) if meta.content_digest == digest => (meta.built_at, meta.freshness),
            _ => (
                now(),
                Freshness {
                    build_duration_ms: elapsed_ms(started),
                    files_reparsed: report.files_reparsed,
                    files_reused: report.files_reused,
                },
            ),
        };
        let mut snapshot = build_snapshot(records.values(), built_at)?;
        snapshot.meta.freshness = freshness;

        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let mut cache = CacheFile::new(digest, records);
        cache.parser_versions = self.registry.versions();
        save_cache(&self.root, &cache)?;
        save_graph(&self.root, &snapshot)?;

        let graph = CallGraph::new(snapshot)?;
        self.finish(report, graph, started)
    }

    fn finish(&self, mut report: BuildReport, graph: CallGraph, started: Instant) -> Result<BuildOutcome, IndexError> {
        report.symbols = graph.local_count();
        report.external_symbols = graph.external_count();
        report.edges = graph.edge_count();
        report.mutation_edges = graph.mutation_count();
        report.duration_ms = elapsed_ms(started);
        tracing::info!(
            "Index ready: {} symbols, {} edges ({} parsed, {} reused, {} failed) in {}ms",
            report.symbols,
            report.edges,
            report.files_reparsed,
            report.files_reused,
            report.failures.len() + report.stale.len(),
            report.duration_ms
        );
        Ok(BuildOutcome { graph, report })
    }

    fn extract_all(
        &self,
        files: &[SourceFile],
        previous: &BTreeMap<String, FileRecord>,
        mode: BuildMode,
        cancel: &CancelFlag,
    ) -> Result<Vec<(String, FileOutcome)>, IndexError> {
        let work = || {
            files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    let outcome = self.process(file, previous.get(&file.rel_path), mode);
                    Ok((file.rel_path.clone(), outcome))
                })
                .collect::<Result<Vec<_>, IndexError>>()
        };

        if self.config.threads == 0 {
            return work();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| IndexError::Config {
                path: IndexConfig::path(&self.root),
                message: format!("cannot start {} workers: {}", self.config.threads, e),
            })?;
        pool.install(work)
    }

    fn process(&self, file: &SourceFile, previous: Option<&FileRecord>, mode: BuildMode) -> FileOutcome {
        let Some(adapter) = self.registry.adapter_for(&file.abs_path) else {
            let error = ParseError::Unsupported(file.abs_path.clone());
            return fallback(file, previous, error);
        };
        let label = adapter.label();

        let bytes = match std::fs::read(&file.abs_path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let error = ParseError::Io { path: file.abs_path.clone(), source };
                return fallback(file, previous, error);
            }
        };
        let fingerprint = fingerprint(&bytes);

        if mode == BuildMode::Refresh {
            if let Some(prev) = previous.filter(|p| p.fingerprint == fingerprint && p.parser == label) {
                tracing::trace!("Reusing {}", file.rel_path);
                let mut record = prev.clone();
                record.stale = false;
                return FileOutcome::Reused(record);
            }
        }

        tracing::debug!("Parsing {}", file.rel_path);
        match adapter.parse(&file.abs_path, &bytes) {
            Ok(root) => {
                let extracted = SymbolExtractor::extract(&file.rel_path, &root);
                let skipped = extracted.skipped_kinds.clone();
                let mut record = extracted.into_record(&file.rel_path, fingerprint, label, now());
                if let Some(prev) = previous {
                    let unchanged = prev.fingerprint == record.fingerprint
                        && prev.parser == record.parser
                        && prev.symbols == record.symbols
                        && prev.call_sites == record.call_sites;
                    if unchanged {
                        record.parsed_at = prev.parsed_at.clone();
                    }
                }
                FileOutcome::Parsed(record, skipped)
            }
            Err(error) => fallback(file, previous, error),
        }
    }
}

/// Keep the previous record as stale, or drop the file if there is none.
fn fallback(file: &SourceFile, previous: Option<&FileRecord>, error: ParseError) -> FileOutcome {
    tracing::warn!("{}: {}", file.rel_path, error);
    match previous {
        Some(prev) => {
            let mut record = prev.clone();
            record.stale = true;
            FileOutcome::Stale(record, error.to_string())
        }
        None => FileOutcome::Failed(error.to_string()),
    }
}
