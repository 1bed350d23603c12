// SPDX-License-Identifier: PMPL-1.0-or-later
//! Estimation entry points: one pairing, or a whole workload.
//!
//! Every (query, signature) pairing is independent: it reads the shared,
//! immutable catalog and configuration and builds its own steps. Batch
//! drivers record failures per pairing and keep going.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::EstimatorConfig;
use crate::context::EvalContext;
use crate::cost::CostVector;
use crate::error::{EstimationError, Result};
use crate::pipeline::Pipeline;
use crate::plan::{Query, QueryPlan, Step};
use crate::planner::QueryPlanner;
use crate::signature::Signature;

/// Estimated cost of one query under one signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEstimate {
    pub query_id: String,
    pub signature_id: String,
    pub frequency: u64,
    pub plan: QueryPlan,
    pub steps: Vec<Step>,
    /// Cost of a single execution.
    pub total: CostVector,
}

impl QueryEstimate {
    /// Cost weighted by the query's frequency.
    pub fn weighted_total(&self) -> CostVector {
        self.total.scaled(self.frequency as f64)
    }

    pub fn final_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn scanned_docs(&self) -> u64 {
        self.steps
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.scanned_docs))
    }

    pub fn scanned_bytes(&self) -> f64 {
        self.steps.iter().map(|s| s.scanned_bytes).sum()
    }

    pub fn output_docs(&self) -> u64 {
        self.final_step().map(|s| s.output_docs).unwrap_or(0)
    }

    pub fn output_bytes(&self) -> f64 {
        self.final_step().map(|s| s.output_bytes).unwrap_or(0.0)
    }

    /// Operator kinds in order, e.g. `filter -> join`.
    pub fn plan_summary(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.kind.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Outcome of one pairing of a batch.
#[derive(Debug)]
pub struct PairingResult {
    pub query_id: String,
    pub signature_id: String,
    pub outcome: Result<QueryEstimate>,
}

/// Every pairing of a batch plus frequency-weighted totals per signature.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Ordered by signature, then by query, in input order.
    pub pairings: Vec<PairingResult>,
    /// Sum of the successful pairings' weighted costs.
    pub totals: BTreeMap<String, CostVector>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &PairingResult> {
        self.pairings.iter().filter(|p| p.outcome.is_err())
    }

    pub fn estimates(&self) -> impl Iterator<Item = &QueryEstimate> {
        self.pairings.iter().filter_map(|p| p.outcome.as_ref().ok())
    }

    pub fn for_signature<'a>(&'a self, signature_id: &'a str) -> impl Iterator<Item = &'a PairingResult> + 'a {
        self.pairings
            .iter()
            .filter(move |p| p.signature_id == signature_id)
    }

    fn from_pairings(signatures: &[Signature], pairings: Vec<PairingResult>) -> Self {
        let mut totals: BTreeMap<String, CostVector> = signatures
            .iter()
            .map(|s| (s.id.clone(), CostVector::ZERO))
            .collect();
        for pairing in &pairings {
            if let Ok(estimate) = &pairing.outcome {
                *totals.entry(pairing.signature_id.clone()).or_default() +=
                    estimate.weighted_total();
            }
        }
        Self { pairings, totals }
    }
}

/// Plans and costs queries against signatures.
#[derive(Debug, Clone)]
pub struct Estimator {
    catalog: Arc<Catalog>,
    config: Arc<EstimatorConfig>,
}

impl Estimator {
    pub fn new(catalog: Catalog, config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog: Arc::new(catalog),
            config: Arc::new(config),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Query frequency: the query's own, else the statistics', else 1.
    /// A declared frequency of zero is rejected.
    pub fn frequency(&self, query: &Query) -> Result<u64> {
        match query
            .frequency
            .or_else(|| self.catalog.stats().frequency(&query.id))
        {
            Some(0) => Err(EstimationError::config(format!(
                "frequency of query `{}` must be positive",
                query.id
            ))),
            Some(frequency) => Ok(frequency),
            None => Ok(1),
        }
    }

    /// Build the operator chain of a query under a signature.
    pub fn plan(&self, query: &Query, signature: &Signature) -> Result<QueryPlan> {
        let ctx = EvalContext::new(&self.catalog, signature, &self.config);
        QueryPlanner::new(&ctx).plan(query)
    }

    /// Plan and cost one pairing. The signature is validated first.
    pub fn estimate(&self, query: &Query, signature: &Signature) -> Result<QueryEstimate> {
        signature.validate(&self.catalog, &self.config)?;
        self.estimate_validated(query, signature)
    }

    fn estimate_validated(&self, query: &Query, signature: &Signature) -> Result<QueryEstimate> {
        let frequency = self.frequency(query)?;
        let ctx = EvalContext::new(&self.catalog, signature, &self.config);
        let plan = QueryPlanner::new(&ctx).plan(query)?;
        let steps = Pipeline::run(&ctx, &plan)?;
        let total: CostVector = steps.iter().map(|s| s.cost).sum();
        debug!(
            query = %query.id,
            signature = %signature.id,
            steps = steps.len(),
            price = total.price,
            "pairing estimated"
        );
        Ok(QueryEstimate {
            query_id: query.id.clone(),
            signature_id: signature.id.clone(),
            frequency,
            plan,
            steps,
            total,
        })
    }

    /// Evaluate a pairing whose signature validation already ran.
    fn evaluate_pairing(
        &self,
        query: &Query,
        signature: &Signature,
        validation: &std::result::Result<(), String>,
    ) -> PairingResult {
        let outcome = match validation {
            Ok(()) => self.estimate_validated(query, signature),
            Err(message) => Err(EstimationError::Configuration(message.clone())),
        };
        if let Err(err) = &outcome {
            warn!(
                query = %query.id,
                signature = %signature.id,
                error = %err,
                "pairing failed"
            );
        }
        PairingResult {
            query_id: query.id.clone(),
            signature_id: signature.id.clone(),
            outcome,
        }
    }

    /// Each signature is validated once per batch; its error message is
    /// reported on every pairing that uses it.
    fn validate_all(&self, signatures: &[Signature]) -> Vec<std::result::Result<(), String>> {
        signatures
            .iter()
            .map(|s| {
                s.validate(&self.catalog, &self.config)
                    .map_err(|e| match e {
                        EstimationError::Configuration(message) => message,
                        other => other.to_string(),
                    })
            })
            .collect()
    }

    /// Evaluate every (query, signature) pairing on the calling thread.
    pub fn evaluate_batch(&self, queries: &[Query], signatures: &[Signature]) -> BatchReport {
        let validations = self.validate_all(signatures);
        let mut pairings = Vec::with_capacity(queries.len() * signatures.len());
        for (signature, validation) in signatures.iter().zip(&validations) {
            for query in queries {
                pairings.push(self.evaluate_pairing(query, signature, validation));
            }
        }
        let report = BatchReport::from_pairings(signatures, pairings);
        info!(
            pairings = report.pairings.len(),
            failures = report.failures().count(),
            "batch evaluated"
        );
        report
    }

    /// Evaluate every pairing as an independent blocking task. The result
    /// is ordered exactly as [`Estimator::evaluate_batch`] orders it.
    pub async fn evaluate_batch_concurrent(
        &self,
        queries: &[Query],
        signatures: &[Signature],
    ) -> Result<BatchReport> {
        let validations = self.validate_all(signatures);
        let queries: Arc<Vec<Query>> = Arc::new(queries.to_vec());
        let signatures_shared: Arc<Vec<Signature>> = Arc::new(signatures.to_vec());
        let validations = Arc::new(validations);

        let mut tasks = JoinSet::new();
        for s in 0..signatures_shared.len() {
            for q in 0..queries.len() {
                let estimator = self.clone();
                let queries = Arc::clone(&queries);
                let signatures = Arc::clone(&signatures_shared);
                let validations = Arc::clone(&validations);
                tasks.spawn_blocking(move || {
                    let pairing =
                        estimator.evaluate_pairing(&queries[q], &signatures[s], &validations[s]);
                    (s * queries.len() + q, pairing)
                });
            }
        }

        let mut indexed = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, pairing) = joined.map_err(|e| {
                EstimationError::config(format!("pairing task failed: {e}"))
            })?;
            indexed.push((index, pairing));
        }
        indexed.sort_by_key(|(index, _)| *index);

        let pairings = indexed.into_iter().map(|(_, p)| p).collect();
        let report = BatchReport::from_pairings(signatures, pairings);
        info!(
            pairings = report.pairings.len(),
            failures = report.failures().count(),
            "concurrent batch evaluated"
        );
        Ok(report)
    }
}
