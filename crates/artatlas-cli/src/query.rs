//! `artatlas query`: run the filter engine against a saved snapshot.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use artatlas_snapshot::SnapshotStore;
use artatlas_view::{self as view, EmptyReason, ViewFilter};

#[derive(Args)]
pub struct QueryArgs {
    /// Snapshot file to read.
    #[arg(short, long, default_value = "data/artworks.snap")]
    data: PathBuf,

    /// Filter to one painter (exact name).
    #[arg(long)]
    artist: Option<String>,

    /// Filter to one museum (exact name).
    #[arg(long)]
    museum: Option<String>,

    /// Also print the full row table.
    #[arg(long)]
    table: bool,
}

pub fn cmd_query(args: QueryArgs) -> Result<()> {
    let snapshot = SnapshotStore::new(&args.data).load()?;
    let filter = ViewFilter {
        artist: args.artist,
        museum: args.museum,
    };
    let result = view::query(&snapshot, &filter);

    if result.is_empty() {
        match result.empty_reason {
            Some(EmptyReason::FilterUnmatched) => {
                println!("{}", "No rows match the selected filters.".yellow())
            }
            Some(EmptyReason::EmptyIntersection) => println!(
                "{}",
                "The artist and museum filters each match, but not together.".yellow()
            ),
            None => println!("{}", "The snapshot is empty.".yellow()),
        }
        return Ok(());
    }

    println!(
        "{} rows={} painters={} museums={}",
        "Matched".green().bold(),
        result.summary.rows,
        result.summary.painters,
        result.summary.museums
    );

    if let Some(notice) = &result.truncation {
        println!(
            "{} showing top {} of {} museums for {} ({} more not shown)",
            "Note".yellow().bold(),
            notice.shown,
            notice.total,
            notice.artist,
            notice.remaining
        );
    }

    for marker in &result.markers {
        println!(
            "  {} — {}, {} ({:.4}, {:.4}): {} painting(s)",
            marker.museum.bold(),
            marker.city,
            marker.country,
            marker.latitude,
            marker.longitude,
            marker.painting_count
        );
        for painting in marker.paintings.iter().take(5) {
            println!("      {painting}");
        }
        if marker.paintings.len() > 5 {
            println!("      ...+{} more", marker.paintings.len() - 5);
        }
    }

    if args.table {
        println!();
        for row in &result.rows {
            println!(
                "{} | {} | {} | {}",
                row.painter, row.painting, row.museum, row.country
            );
        }
    }

    Ok(())
}
