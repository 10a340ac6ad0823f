//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use semgraph_indexer::{BuildReport, CancelFlag, Coordinator};
use semgraph_query::{QueryEngine, call_tool, tool_definitions};

pub fn build(root: &Path) -> anyhow::Result<()> {
    let coordinator = Coordinator::open(root)?;
    let outcome = coordinator.build(&CancelFlag::new())?;
    print_report(&outcome.report)
}

pub fn refresh(root: &Path) -> anyhow::Result<()> {
    let coordinator = Coordinator::open(root)?;
    let outcome = coordinator.refresh(&CancelFlag::new())?;
    print_report(&outcome.report)
}

pub fn query(root: &Path, tool: &str, args: &str) -> anyhow::Result<()> {
    let args: serde_json::Value = serde_json::from_str(args).context("--args must be a JSON object")?;
    let coordinator = Coordinator::open(root)?;
    let graph = coordinator.load_for_query()?;
    let engine = QueryEngine::new(Arc::new(graph));

    let result = call_tool(&engine, tool, args)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn tools() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&tool_definitions())?);
    Ok(())
}

pub fn clear(root: &Path) -> anyhow::Result<()> {
    tracing::info!("Clearing index for: {}", root.display());
    Coordinator::open(root)?.clear()?;
    tracing::info!("Index cleared");
    Ok(())
}

fn print_report(report: &BuildReport) -> anyhow::Result<()> {
    for failure in report.failures.iter().chain(&report.stale) {
        tracing::warn!("{}: {}", failure.path, failure.message);
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
