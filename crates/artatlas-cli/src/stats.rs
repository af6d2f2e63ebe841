//! `artatlas stats`: dataset summary for a saved snapshot.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Args;
use colored::Colorize;

use artatlas_snapshot::SnapshotStore;

#[derive(Args)]
pub struct StatsArgs {
    /// Snapshot file to read.
    #[arg(short, long, default_value = "data/artworks.snap")]
    data: PathBuf,
}

pub fn cmd_stats(args: StatsArgs) -> Result<()> {
    let store = SnapshotStore::new(&args.data);
    let snapshot = store.load()?;

    println!("{} {}", "Snapshot".green().bold(), store.path().display());
    println!("  paintings: {}", snapshot.len());
    println!("  painters:  {}", snapshot.distinct_painters());
    println!("  museums:   {}", snapshot.distinct_museums());
    if !snapshot.is_empty() {
        let with_coords = snapshot.with_coordinates();
        println!(
            "  with coordinates: {} ({:.1}%)",
            with_coords,
            100.0 * with_coords as f64 / snapshot.len() as f64
        );
    }
    if let Some(ts) = snapshot.fetched_at() {
        if let Some(fetched) = Utc.timestamp_opt(ts, 0).single() {
            println!("  fetched at: {}", fetched.to_rfc3339());
        }
    }

    Ok(())
}
