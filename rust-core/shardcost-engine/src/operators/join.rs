// SPDX-License-Identifier: PMPL-1.0-or-later
//! Join: equi-join of two inputs.
//!
//! Both inputs are read in full. When both sides are partitioned by their
//! join key the join runs shard-locally; otherwise the smaller side is
//! shipped across the network to the larger one.

use tracing::trace;

use crate::config::check_fraction;
use crate::context::{count_floor, EvalContext, Selectivity};
use crate::error::{EstimationError, Result};
use crate::plan::{FieldRef, Step, StepInput};
use crate::OperatorKind;

use super::total_cost;

/// Borrowed view of a join operator's parameters.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec<'p> {
    pub left: &'p StepInput,
    pub right: &'p StepInput,
    pub left_key: &'p str,
    pub right_key: &'p str,
    pub output_fields: &'p [String],
    pub selectivity: Option<f64>,
}

pub struct JoinOperator;

impl JoinOperator {
    pub fn estimate(ctx: &EvalContext<'_>, index: usize, spec: JoinSpec<'_>, steps: &[Step]) -> Result<Step> {
        let left = ctx.upstream(spec.left, index, steps)?;
        let right = ctx.upstream(spec.right, index, steps)?;
        let (left_key, _) = ctx.bind_field(&left.collections, spec.left_key)?;
        let (right_key, _) = ctx.bind_field(&right.collections, spec.right_key)?;

        let aligned = left.partition_key.as_ref() == Some(&left_key)
            && right.partition_key.as_ref() == Some(&right_key);

        let scanned_bytes = left.bytes + right.bytes;
        let shuffled_bytes = if aligned {
            0.0
        } else {
            left.bytes.min(right.bytes)
        };

        let selectivity = Self::selectivity(ctx, spec.selectivity, &left_key, &right_key)?;
        let output_docs = count_floor(selectivity.apply(left.docs.min(right.docs) as f64));

        let mut collections = left.collections.clone();
        collections.extend(right.collections.iter().cloned());
        let mut projected = Vec::with_capacity(spec.output_fields.len());
        for field in spec.output_fields {
            projected.push(ctx.bind_field(&collections, field)?);
        }
        let output_doc_size = ctx.output_size(&projected, left.doc_size + right.doc_size);

        let partition_key = if aligned {
            Some(left_key)
        } else if left.bytes >= right.bytes {
            left.partition_key.clone()
        } else {
            right.partition_key.clone()
        };

        let phases = vec![
            ctx.cost_model.phase("scan", scanned_bytes, 0.0)?,
            ctx.cost_model.phase("shuffle", 0.0, shuffled_bytes)?,
        ];
        trace!(
            step = index,
            aligned,
            shuffled_bytes,
            output_docs,
            "join estimated"
        );

        Ok(Step {
            index,
            kind: OperatorKind::Join,
            label: String::new(),
            inputs: vec![spec.left.clone(), spec.right.clone()],
            collections,
            partition_key,
            scanned_docs: left.docs.saturating_add(right.docs),
            scanned_bytes,
            shuffled_bytes,
            output_docs,
            output_doc_size,
            output_bytes: output_docs as f64 * output_doc_size,
            sharding_aligned: aligned,
            indexes_used: Vec::new(),
            cost: total_cost(&phases),
            phases,
        })
    }

    /// Explicit selectivity, then the configured override, then one over
    /// the larger distinct count of the two keys.
    fn selectivity(
        ctx: &EvalContext<'_>,
        explicit: Option<f64>,
        left_key: &FieldRef,
        right_key: &FieldRef,
    ) -> Result<Selectivity> {
        if let Some(sel) = explicit.or(ctx.config.join_selectivity_override) {
            check_fraction("join selectivity", sel)?;
            return Ok(Selectivity::Fraction(sel));
        }
        let left = ctx
            .resolver
            .distinct_values(&left_key.collection, &left_key.path)?;
        let right = ctx
            .resolver
            .distinct_values(&right_key.collection, &right_key.path)?;
        match left.max(right) {
            None => Ok(Selectivity::Fraction(ctx.config.default_selectivity)),
            Some(0) => Err(EstimationError::ArithmeticDomain(format!(
                "join {left_key} = {right_key}: zero distinct values on both sides"
            ))),
            Some(distinct) => Ok(Selectivity::OneOf(distinct)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;
    use crate::testing;

    fn order_product(ctx: &EvalContext<'_>, selectivity: Option<f64>) -> Result<Step> {
        JoinOperator::estimate(
            ctx,
            0,
            JoinSpec {
                left: &StepInput::collection("OrderLine"),
                right: &StepInput::collection("Product"),
                left_key: "IDP",
                right_key: "IDP",
                output_fields: &[],
                selectivity,
            },
            &[],
        )
    }

    #[test]
    fn test_unaligned_join_shuffles_smaller_side() {
        let catalog = testing::shop_catalog();
        let sig = testing::d1();
        let config = EstimatorConfig::default();
        let ctx = EvalContext::new(&catalog, &sig, &config);
        let step = order_product(&ctx, None).unwrap();

        let orders = 4_000_000.0 * 112.0;
        let products = 100_000.0 * 132.0;
        assert!(!step.sharding_aligned);
        assert!((step.scanned_bytes - (orders + products)).abs() < 1e-6);
        assert!((step.shuffled_bytes - products).abs() < 1e-6);
        // min(4M, 100k) / max(100k, 100k)
        assert_eq!(step.output_docs, 1);
        assert!((step.output_doc_size - 244.0).abs() < 1e-9);
        assert_eq!(step.partition_key, Some(FieldRef::new("OrderLine", "IDC")));
        assert_eq!(step.phases.len(), 2);
    }

    #[test]
    fn test_aligned_join_has_no_shuffle() {
        let catalog = testing::shop_catalog();
        let mut sig = testing::d1();
        sig.collections.get_mut("OrderLine").unwrap().sharding_key = Some("IDP".to_string());
        let config = EstimatorConfig::default();
        let ctx = EvalContext::new(&catalog, &sig, &config);
        let step = order_product(&ctx, None).unwrap();
        assert!(step.sharding_aligned);
        assert_eq!(step.shuffled_bytes, 0.0);
        assert_eq!(step.phases[1].cost, crate::cost::CostVector::ZERO);
        assert_eq!(step.partition_key, Some(FieldRef::new("OrderLine", "IDP")));
    }

    #[test]
    fn test_selectivity_overrides() {
        let catalog = testing::shop_catalog();
        let sig = testing::d1();
        let config = EstimatorConfig {
            join_selectivity_override: Some(0.5),
            ..Default::default()
        };
        let ctx = EvalContext::new(&catalog, &sig, &config);
        assert_eq!(order_product(&ctx, None).unwrap().output_docs, 50_000);
        // The per-operator value wins over the configured one.
        assert_eq!(order_product(&ctx, Some(0.01)).unwrap().output_docs, 1_000);
        assert!(matches!(
            order_product(&ctx, Some(1.5)),
            Err(EstimationError::Configuration(_))
        ));
    }

    #[test]
    fn test_projected_join_output() {
        let catalog = testing::shop_catalog();
        let sig = testing::d1();
        let config = EstimatorConfig::default();
        let ctx = EvalContext::new(&catalog, &sig, &config);
        let step = JoinOperator::estimate(
            &ctx,
            0,
            JoinSpec {
                left: &StepInput::collection("OrderLine"),
                right: &StepInput::collection("Product"),
                left_key: "IDP",
                right_key: "IDP",
                output_fields: &["OrderLine.date".to_string(), "brand".to_string()],
                selectivity: None,
            },
            &[],
        )
        .unwrap();
        assert!((step.output_doc_size - 100.0).abs() < 1e-9);
        assert_eq!(step.collections, vec!["OrderLine".to_string(), "Product".to_string()]);
    }
}
