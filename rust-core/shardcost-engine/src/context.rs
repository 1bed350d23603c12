// SPDX-License-Identifier: PMPL-1.0-or-later
//! Evaluation context shared by the operators of one (query, signature)
//! pairing.

use crate::catalog::Catalog;
use crate::config::EstimatorConfig;
use crate::cost::CostModel;
use crate::error::{EstimationError, Result};
use crate::plan::{FieldRef, Step, StepInput};
use crate::resolver::{FieldLocation, Resolver};
use crate::signature::Signature;

/// Read-only inputs of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub catalog: &'a Catalog,
    pub signature: &'a Signature,
    pub config: &'a EstimatorConfig,
    pub resolver: Resolver<'a>,
    pub cost_model: CostModel,
}

/// What an operator sees of one of its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Upstream {
    pub collections: Vec<String>,
    pub docs: u64,
    pub doc_size: f64,
    pub bytes: f64,
    pub partition_key: Option<FieldRef>,
    /// True when reading a stored collection rather than a step output.
    pub is_root: bool,
}

/// Predicate selectivity. A selectivity of `1/n` is kept as a divisor so
/// that `docs / n` stays exact when `n` divides `docs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selectivity {
    OneOf(u64),
    Fraction(f64),
}

impl Selectivity {
    pub fn apply(&self, docs: f64) -> f64 {
        match *self {
            Selectivity::OneOf(n) => docs / n as f64,
            Selectivity::Fraction(f) => docs * f,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.apply(1.0)
    }
}

/// Floor of a non-negative estimate, tolerant of representation error
/// just below an integer.
pub fn count_floor(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let slack = (value * f64::EPSILON * 4.0).max(1e-9);
    (value + slack).floor() as u64
}

impl<'a> EvalContext<'a> {
    pub fn new(catalog: &'a Catalog, signature: &'a Signature, config: &'a EstimatorConfig) -> Self {
        Self {
            catalog,
            signature,
            config,
            resolver: Resolver::new(catalog, signature, config),
            cost_model: CostModel::from_config(config),
        }
    }

    /// Estimates for an operator input. Only materialized collections can
    /// be read directly, and only steps already executed can be consumed.
    pub fn upstream(&self, input: &StepInput, index: usize, steps: &[Step]) -> Result<Upstream> {
        match input {
            StepInput::Collection(name) => {
                if !self.signature.is_materialized(name) {
                    return Err(EstimationError::config(format!(
                        "collection `{name}` is not materialized in signature {}",
                        self.signature.id
                    )));
                }
                let docs = self.catalog.collection_stats(name)?.nb_documents;
                let doc_size = self.resolver.sizer().document_size(name)?;
                let key = self.signature.shard_key(self.catalog, name)?;
                Ok(Upstream {
                    collections: vec![name.clone()],
                    docs,
                    doc_size,
                    bytes: docs as f64 * doc_size,
                    partition_key: Some(FieldRef::new(name, &key)),
                    is_root: true,
                })
            }
            StepInput::Step(source) => {
                let step = steps.get(*source).filter(|_| *source < index).ok_or_else(|| {
                    EstimationError::config(format!(
                        "step {index} reads step {source}, which has not been executed"
                    ))
                })?;
                Ok(Upstream {
                    collections: step.collections.clone(),
                    docs: step.output_docs,
                    doc_size: step.output_doc_size,
                    bytes: step.output_bytes,
                    partition_key: step.partition_key.clone(),
                    is_root: false,
                })
            }
        }
    }

    /// Bind a field reference to the collection supplying it. A leading
    /// collection name (`Product.brand`) selects the collection explicitly;
    /// otherwise the first collection that resolves the path wins.
    pub fn bind_field(&self, collections: &[String], field: &str) -> Result<(FieldRef, FieldLocation)> {
        if let Some((head, rest)) = field.split_once('.') {
            if collections.iter().any(|c| c == head) {
                let location = self.resolver.resolve(head, rest)?;
                if location.is_missing() {
                    return Err(EstimationError::unresolvable(head, rest));
                }
                return Ok((FieldRef::new(head, rest), location));
            }
        }
        for collection in collections {
            let location = self.resolver.resolve(collection, field)?;
            if !location.is_missing() {
                return Ok((FieldRef::new(collection, field), location));
            }
        }
        Err(EstimationError::unresolvable(&collections.join(", "), field))
    }

    /// Selectivity of an equality predicate on a bound field: configured
    /// selectivity first, then one over the distinct count, then the
    /// configured default.
    pub fn selectivity(&self, field: &FieldRef) -> Result<Selectivity> {
        if let Some(sel) = self
            .resolver
            .selectivity_override(&field.collection, &field.path)?
        {
            return Ok(Selectivity::Fraction(sel));
        }
        match self
            .resolver
            .distinct_values(&field.collection, &field.path)?
        {
            Some(0) => Err(EstimationError::ArithmeticDomain(format!(
                "selectivity of {field}: zero distinct values"
            ))),
            Some(distinct) => Ok(Selectivity::OneOf(distinct)),
            None => Ok(Selectivity::Fraction(self.config.default_selectivity)),
        }
    }

    /// Projected size of bound fields, or `whole` when none are requested.
    pub fn output_size(&self, fields: &[(FieldRef, FieldLocation)], whole: f64) -> f64 {
        if fields.is_empty() {
            whole
        } else {
            fields.iter().map(|(_, location)| location.size()).sum()
        }
    }
}
