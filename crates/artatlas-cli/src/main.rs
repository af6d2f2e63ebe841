//! Artatlas CLI
//!
//! Command-line interface for:
//! - Refreshing the local artwork snapshot from Wikidata (`refresh`)
//! - Inspecting filtered views of a saved snapshot (`query`)
//! - Printing dataset statistics (`stats`)

use anyhow::Result;
use clap::{Parser, Subcommand};

mod query;
mod refresh;
mod stats;

#[derive(Parser)]
#[command(name = "artatlas")]
#[command(
    author,
    version,
    about = "Famous artworks on a world map: snapshot refresh and query tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the artwork dataset from Wikidata and save the snapshot.
    ///
    /// Runs the two-phase fetch (ranked painters, then per-painter detail),
    /// pacing requests to respect the endpoint's rate policy. A partial run
    /// (failed painters, Ctrl-C) still saves what was fetched and reports a
    /// warning; only a phase-1 failure exits non-zero.
    Refresh(refresh::RefreshArgs),

    /// Query a saved snapshot with optional artist/museum filters.
    Query(query::QueryArgs),

    /// Print dataset statistics for a saved snapshot.
    Stats(stats::StatsArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Refresh(args) => refresh::cmd_refresh(args),
        Commands::Query(args) => query::cmd_query(args),
        Commands::Stats(args) => stats::cmd_stats(args),
    }
}
