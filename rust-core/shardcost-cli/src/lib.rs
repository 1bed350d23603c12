// SPDX-License-Identifier: PMPL-1.0-or-later
//! ShardCost CLI
//!
//! Loads a workload, evaluates every (query, signature) pairing and writes
//! the results, plan and leaderboard reports.

pub mod report;
pub mod workload;

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::info;

use shardcost_engine::{BatchReport, Estimator};

pub use report::{LeaderboardEntry, ReportFiles, ReportWeights};
pub use workload::{Workload, WorkloadPaths};

/// Outcome of a full run.
#[derive(Debug)]
pub struct RunSummary {
    pub report: BatchReport,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub files: ReportFiles,
}

/// Evaluate a loaded workload and write every report under `out_dir`.
pub async fn run(
    workload: Workload,
    out_dir: &Path,
    weights: &ReportWeights,
    concurrent: bool,
) -> Result<RunSummary> {
    let estimator = Estimator::new(workload.catalog, workload.config)
        .context("invalid estimator configuration")?;
    let report = if concurrent {
        estimator
            .evaluate_batch_concurrent(&workload.queries, &workload.signatures)
            .await?
    } else {
        estimator.evaluate_batch(&workload.queries, &workload.signatures)
    };

    let files = report::write_all(out_dir, &workload.queries, &report, weights, Utc::now())?;
    info!(
        out = %out_dir.display(),
        plans = files.plans.len(),
        "reports written"
    );
    let leaderboard = report::leaderboard(&report, weights);
    Ok(RunSummary {
        report,
        leaderboard,
        files,
    })
}
