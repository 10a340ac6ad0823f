//! Semgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "semgraph")]
#[command(about = "Deterministic symbol and call graph for refactoring guardrails", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-index every file and write the graph
    Build,
    /// Re-index changed files only
    Refresh,
    /// Run a query tool against the persisted graph
    Query {
        /// Tool name, e.g. get_callers
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// List the query tools and their input schemas
    Tools,
    /// Remove the persisted index
    Clear,
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("semgraph={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Repository root: {}", cli.root.display());

    match cli.command {
        Commands::Build => commands::build(&cli.root),
        Commands::Refresh => commands::refresh(&cli.root),
        Commands::Query { tool, args } => commands::query(&cli.root, &tool, &args),
        Commands::Tools => commands::tools(),
        Commands::Clear => commands::clear(&cli.root),
        Commands::Version => {
            println!("semgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
