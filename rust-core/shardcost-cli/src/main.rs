// SPDX-License-Identifier: PMPL-1.0-or-later
//! `shardcost`: rank denormalization signatures by estimated query cost.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shardcost_cli::{report, run, ReportWeights, Workload, WorkloadPaths};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Estimate the cost of a query workload under alternative denormalizations.
#[derive(Parser, Debug)]
#[command(name = "shardcost", version = VERSION, about)]
struct Cli {
    /// Logical schema.
    #[arg(long, default_value = "data/schema.json")]
    schema: PathBuf,

    /// Corpus and cluster statistics.
    #[arg(long, default_value = "data/stats.json")]
    stats: PathBuf,

    /// Denormalization signatures to compare.
    #[arg(long, default_value = "data/denormalizations.json")]
    denorm: PathBuf,

    /// Query workload.
    #[arg(long, default_value = "data/queries.json")]
    queries: PathBuf,

    /// Output directory for results.csv, leaderboard.md and plans/.
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Estimator configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Evaluate pairings on the blocking thread pool.
    #[arg(long)]
    concurrent: bool,

    /// Leaderboard score weight of time.
    #[arg(long, default_value_t = 1.0)]
    weight_time: f64,

    /// Leaderboard score weight of carbon.
    #[arg(long, default_value_t = 1.0)]
    weight_carbon: f64,

    /// Leaderboard score weight of price.
    #[arg(long, default_value_t = 1.0)]
    weight_price: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = WorkloadPaths {
        schema: cli.schema,
        stats: cli.stats,
        signatures: cli.denorm,
        queries: cli.queries,
        config: cli.config,
    };
    let weights = ReportWeights {
        time: cli.weight_time,
        carbon: cli.weight_carbon,
        price: cli.weight_price,
    };

    let workload = Workload::load(&paths)?;
    let summary = run(workload, &cli.out, &weights, cli.concurrent).await?;

    println!("{}", report::leaderboard_table(&summary.leaderboard));
    let failures = summary.report.failures().count();
    if failures > 0 {
        println!("{failures} pairing(s) failed; see {}", summary.files.results.display());
    }
    println!("Reports written to {}", cli.out.display());
    Ok(())
}
