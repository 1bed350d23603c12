// SPDX-License-Identifier: PMPL-1.0-or-later
//! Report writers: results CSV, Markdown leaderboard, per-query plan JSON.
//!
//! Signatures with failed pairings rank after every complete signature.
//! Within each group the order is total price, then carbon, then time. The
//! weighted score is informational and does not affect the order.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use shardcost_engine::{BatchReport, CostVector, PairingResult, Query};

/// Weights of the leaderboard's combined score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportWeights {
    pub time: f64,
    pub carbon: f64,
    pub price: f64,
}

impl Default for ReportWeights {
    fn default() -> Self {
        Self {
            time: 1.0,
            carbon: 1.0,
            price: 1.0,
        }
    }
}

/// One ranked signature.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub signature_id: String,
    pub total: CostVector,
    pub weighted: f64,
    pub failures: usize,
}

pub fn leaderboard(report: &BatchReport, weights: &ReportWeights) -> Vec<LeaderboardEntry> {
    let mut totals: Vec<(&String, &CostVector, usize)> = report
        .totals
        .iter()
        .map(|(id, total)| {
            let failures = report
                .for_signature(id)
                .filter(|p| p.outcome.is_err())
                .count();
            (id, total, failures)
        })
        .collect();
    totals.sort_by(|(a_id, a, a_failed), (b_id, b, b_failed)| {
        (*a_failed > 0)
            .cmp(&(*b_failed > 0))
            .then(a.price.total_cmp(&b.price))
            .then(a.carbon.total_cmp(&b.carbon))
            .then(a.time.total_cmp(&b.time))
            .then(a_id.cmp(b_id))
    });
    totals
        .into_iter()
        .enumerate()
        .map(|(i, (id, total, failures))| LeaderboardEntry {
            rank: i + 1,
            signature_id: id.clone(),
            total: *total,
            weighted: total.weighted(weights.time, weights.carbon, weights.price),
            failures,
        })
        .collect()
}

/// Leaderboard as a terminal table.
pub fn leaderboard_table(entries: &[LeaderboardEntry]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Rank"),
        Cell::new("Signature"),
        Cell::new("Time"),
        Cell::new("Carbon"),
        Cell::new("Price"),
        Cell::new("Weighted"),
        Cell::new("Failures"),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.rank),
            Cell::new(&entry.signature_id),
            Cell::new(format!("{:.6}", entry.total.time)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.6}", entry.total.carbon)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.6}", entry.total.price)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.6}", entry.weighted)).set_alignment(CellAlignment::Right),
            Cell::new(entry.failures),
        ]);
    }
    table
}

pub fn leaderboard_markdown(
    entries: &[LeaderboardEntry],
    weights: &ReportWeights,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Denormalization Leaderboard");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Generated {}.",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "| Rank | Signature | Time | Carbon | Price | Weighted | Failures |");
    let _ = writeln!(out, "| --- | --- | ---: | ---: | ---: | ---: | ---: |");
    for e in entries {
        let _ = writeln!(
            out,
            "| {} | {} | {:.6} | {:.6} | {:.6} | {:.6} | {} |",
            e.rank,
            e.signature_id,
            e.total.time,
            e.total.carbon,
            e.total.price,
            e.weighted,
            e.failures
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Weights:");
    let _ = writeln!(out, "- time: {}", weights.time);
    let _ = writeln!(out, "- carbon: {}", weights.carbon);
    let _ = writeln!(out, "- price: {}", weights.price);
    out
}

/// One row of `results.csv`. Cost and volume columns are empty for a
/// failed pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub signature_id: String,
    pub query_id: String,
    pub plan_summary: String,
    pub frequency: Option<u64>,
    pub time: Option<f64>,
    pub carbon: Option<f64>,
    pub price: Option<f64>,
    pub scanned_docs: Option<u64>,
    pub output_docs: Option<u64>,
    pub scanned_bytes: Option<f64>,
    pub returned_bytes: Option<f64>,
    pub error: String,
}

impl From<&PairingResult> for ResultRow {
    fn from(pairing: &PairingResult) -> Self {
        let base = ResultRow {
            signature_id: pairing.signature_id.clone(),
            query_id: pairing.query_id.clone(),
            plan_summary: String::new(),
            frequency: None,
            time: None,
            carbon: None,
            price: None,
            scanned_docs: None,
            output_docs: None,
            scanned_bytes: None,
            returned_bytes: None,
            error: String::new(),
        };
        match &pairing.outcome {
            Ok(estimate) => ResultRow {
                plan_summary: estimate.plan_summary(),
                frequency: Some(estimate.frequency),
                time: Some(estimate.total.time),
                carbon: Some(estimate.total.carbon),
                price: Some(estimate.total.price),
                scanned_docs: Some(estimate.scanned_docs()),
                output_docs: Some(estimate.output_docs()),
                scanned_bytes: Some(estimate.scanned_bytes()),
                returned_bytes: Some(estimate.output_bytes()),
                ..base
            },
            Err(err) => ResultRow {
                error: err.to_string(),
                ..base
            },
        }
    }
}

pub fn write_results_csv(path: &Path, report: &BatchReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for pairing in &report.pairings {
        writer.serialize(ResultRow::from(pairing))?;
    }
    writer.flush()?;
    Ok(())
}

/// Plan document of one query across every signature.
pub fn plan_document(query: &Query, report: &BatchReport) -> serde_json::Value {
    let mut per_signature = serde_json::Map::new();
    for pairing in report.pairings.iter().filter(|p| p.query_id == query.id) {
        let entry = match &pairing.outcome {
            Ok(estimate) => {
                let mut required_indexes: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
                for step in &estimate.steps {
                    let Some(collection) = step.collections.first() else {
                        continue;
                    };
                    for index in &step.indexes_used {
                        let fields = required_indexes.entry(collection.as_str()).or_default();
                        if !fields.contains(&index.as_str()) {
                            fields.push(index.as_str());
                        }
                    }
                }
                json!({
                    "collections": estimate.plan.collections,
                    "required_indexes": required_indexes,
                    "notes": estimate.plan.notes,
                    "operators": estimate.plan.operators,
                    "steps": estimate.steps,
                    "total": estimate.total,
                })
            }
            Err(err) => json!({ "error": err.to_string() }),
        };
        per_signature.insert(pairing.signature_id.clone(), entry);
    }
    json!({
        "query_id": query.id,
        "sql": query.sql,
        "description": query.description,
        "per_signature": per_signature,
    })
}

/// Keep query ids usable as file names.
fn file_stem(query_id: &str) -> String {
    query_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn write_plans(dir: &Path, queries: &[Query], report: &BatchReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::with_capacity(queries.len());
    for query in queries {
        let path = dir.join(format!("{}.plan.json", file_stem(&query.id)));
        let body = serde_json::to_string_pretty(&plan_document(query, report))?;
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Paths of everything [`write_all`] produced.
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub results: PathBuf,
    pub leaderboard: PathBuf,
    pub plans: Vec<PathBuf>,
}

pub fn write_all(
    out_dir: &Path,
    queries: &[Query],
    report: &BatchReport,
    weights: &ReportWeights,
    generated_at: DateTime<Utc>,
) -> Result<ReportFiles> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let results = out_dir.join("results.csv");
    write_results_csv(&results, report)?;

    let leaderboard_path = out_dir.join("leaderboard.md");
    let entries = leaderboard(report, weights);
    fs::write(
        &leaderboard_path,
        leaderboard_markdown(&entries, weights, generated_at),
    )
    .with_context(|| format!("writing {}", leaderboard_path.display()))?;

    let plans = write_plans(&out_dir.join("plans"), queries, report)?;
    Ok(ReportFiles {
        results,
        leaderboard: leaderboard_path,
        plans,
    })
}
