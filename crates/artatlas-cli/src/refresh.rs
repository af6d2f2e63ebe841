//! `artatlas refresh`: the two-phase fetch plus save.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use url::Url;

use artatlas_snapshot::SnapshotStore;
use artatlas_wikidata::{
    CancelFlag, FetchConfig, FetchPipeline, GraphQueryClient, RetryPolicy, DEFAULT_USER_AGENT,
    WIKIDATA_SPARQL_ENDPOINT,
};

#[derive(Args)]
pub struct RefreshArgs {
    /// Snapshot file to (re)write.
    #[arg(short, long, default_value = "data/artworks.snap")]
    out: PathBuf,

    /// SPARQL endpoint to query.
    #[arg(long, default_value = WIKIDATA_SPARQL_ENDPOINT)]
    endpoint: String,

    /// HTTP User-Agent (the endpoint requires an identifying client).
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// How many ranked painters to fetch details for.
    #[arg(long, default_value_t = 250)]
    painters: usize,

    /// Delay between per-painter requests in milliseconds (politeness).
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 90)]
    timeout_secs: u64,

    /// Attempts per query before a painter is given up on.
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
}

pub fn cmd_refresh(args: RefreshArgs) -> Result<()> {
    let endpoint = Url::parse(&args.endpoint)
        .with_context(|| format!("invalid endpoint url: {}", args.endpoint))?;

    let config = FetchConfig {
        endpoint,
        user_agent: args.user_agent.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        request_delay: Duration::from_millis(args.delay_ms),
        painter_limit: args.painters,
    };
    let policy = RetryPolicy {
        max_attempts: args.max_attempts,
        ..RetryPolicy::default()
    };

    let client =
        GraphQueryClient::over_http(&config, policy).context("failed to set up the query client")?;
    let pipeline = FetchPipeline::new(client, config);

    // Ctrl-C stops the loop at the next painter and keeps the partial data.
    let cancel = CancelFlag::new();
    signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.handle())
        .context("failed to install the interrupt handler")?;

    println!(
        "{} endpoint={} painters={} delay_ms={}",
        "Refresh".green().bold(),
        args.endpoint,
        args.painters,
        args.delay_ms
    );

    let report = pipeline
        .refresh(
            &mut |index, total, painter| {
                println!("  [{index}/{total}] {painter}");
            },
            &cancel,
        )
        .context("phase 1 failed; no data fetched")?;

    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            "failed".red(),
            failure.painter,
            failure.error
        );
    }
    if report.cancelled {
        println!(
            "{} refresh interrupted; saving what was fetched",
            "Warning".yellow().bold()
        );
    }

    let store = SnapshotStore::new(&args.out);
    store
        .save(&report.snapshot)
        .context("failed to save snapshot")?;

    let snapshot = &report.snapshot;
    println!();
    println!("{} {}", "Saved".green().bold(), store.path().display());
    println!(
        "  painters: {}, paintings: {}, museums: {}",
        snapshot.distinct_painters(),
        snapshot.len(),
        snapshot.distinct_museums()
    );
    if !snapshot.is_empty() {
        let with_coords = snapshot.with_coordinates();
        println!(
            "  with coordinates: {} ({:.1}%)",
            with_coords,
            100.0 * with_coords as f64 / snapshot.len() as f64
        );
    }
    if report.rows_skipped > 0 {
        println!("  rows skipped at normalization: {}", report.rows_skipped);
    }
    if !report.failures.is_empty() {
        println!(
            "{} partial snapshot: {} of {} painters failed",
            "Warning".yellow().bold(),
            report.failures.len(),
            report.painters_total
        );
    }

    Ok(())
}
