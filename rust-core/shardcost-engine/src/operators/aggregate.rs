// SPDX-License-Identifier: PMPL-1.0-or-later
//! Aggregate: map, shuffle, reduce.
//!
//! Map reads the whole input. Partial aggregates are then shuffled to the
//! shard owning each group, unless the input is already partitioned by one
//! of the grouping keys. Reduce emits one fixed-size record per group.

use tracing::trace;

use crate::context::EvalContext;
use crate::error::Result;
use crate::plan::{AggregateCall, Step, StepInput};
use crate::OperatorKind;

use super::total_cost;

pub struct AggregateOperator;

impl AggregateOperator {
    pub fn estimate(
        ctx: &EvalContext<'_>,
        index: usize,
        input: &StepInput,
        group_by: &[String],
        functions: &[AggregateCall],
        steps: &[Step],
    ) -> Result<Step> {
        let up = ctx.upstream(input, index, steps)?;

        let mut keys = Vec::with_capacity(group_by.len());
        for field in group_by {
            keys.push(ctx.bind_field(&up.collections, field)?.0);
        }
        for call in functions {
            if let Some(field) = &call.field {
                ctx.bind_field(&up.collections, field)?;
            }
        }

        let aligned = up
            .partition_key
            .as_ref()
            .is_some_and(|key| keys.contains(key));

        let map_bytes = up.bytes;
        let shuffled_bytes = if aligned {
            0.0
        } else {
            up.bytes * ctx.config.partial_aggregate_fraction
        };

        let output_docs = if keys.is_empty() {
            1
        } else {
            let mut groups: u64 = 1;
            for key in &keys {
                let distinct = ctx
                    .resolver
                    .distinct_values(&key.collection, &key.path)?
                    .unwrap_or(ctx.config.default_group_cardinality);
                groups = groups.saturating_mul(distinct);
            }
            groups.min(up.docs)
        };
        let output_doc_size = ctx.config.aggregate_record_bytes;

        let phases = vec![
            ctx.cost_model.phase("map", map_bytes, 0.0)?,
            ctx.cost_model.phase("shuffle", 0.0, shuffled_bytes)?,
        ];
        trace!(
            step = index,
            aligned,
            shuffled_bytes,
            groups = output_docs,
            "aggregate estimated"
        );

        Ok(Step {
            index,
            kind: OperatorKind::Aggregate,
            label: String::new(),
            inputs: vec![input.clone()],
            collections: up.collections,
            partition_key: keys.into_iter().next(),
            scanned_docs: up.docs,
            scanned_bytes: map_bytes,
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
}
