//! PurchaseFlow: prints customer purchase-behaviour aggregates for a sales export
//!
//! This is the main entrypoint that orchestrates loading, cleaning, the four
//! aggregates and the report.

use anyhow::Result;
use clap::Parser;
use purchaseflow::{clean_data, conceptual_answers, load_dataset, print_report, run_analysis, Args};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);
    args.validate()?;

    run_pipeline(&args)?;

    println!("\n{:?}", conceptual_answers());

    Ok(())
}

/// Initialize the tracing subscriber; `RUST_LOG` overrides the default level
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Load, clean, aggregate and print
fn run_pipeline(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load data
    let raw = load_dataset(&args.input)?;
    debug!("Loaded {} rows x {} columns", raw.height(), raw.width());

    // Step 2: Clean
    let cleaned = clean_data(raw)?;
    info!("Cleaned data: {} rows", cleaned.height());

    // Step 3: Aggregate
    let report = run_analysis(&cleaned, args.min_purchases, args.top_n)?;

    // Step 4: Print
    print_report(&report, args.min_purchases, args.top_n)?;

    debug!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
