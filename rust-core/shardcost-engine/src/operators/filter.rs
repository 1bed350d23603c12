// SPDX-License-Identifier: PMPL-1.0-or-later
//! Filter: equality predicates over a collection or a step output.
//!
//! A filter on a stored collection whose predicates include the shard key
//! only touches the shards holding matching keys, so it scans
//! `docs × sharding_access_fraction` documents instead of all of them.

use tracing::trace;

use crate::context::{count_floor, EvalContext};
use crate::error::Result;
use crate::plan::{Predicate, Step, StepInput};
use crate::OperatorKind;

use super::total_cost;

pub struct FilterOperator;

impl FilterOperator {
    pub fn estimate(
        ctx: &EvalContext<'_>,
        index: usize,
        input: &StepInput,
        predicates: &[Predicate],
        output_fields: &[String],
        steps: &[Step],
    ) -> Result<Step> {
        let up = ctx.upstream(input, index, steps)?;

        let mut bound = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let (field, _) = ctx.bind_field(&up.collections, &predicate.field)?;
            bound.push(field);
        }
        let mut projected = Vec::with_capacity(output_fields.len());
        for field in output_fields {
            projected.push(ctx.bind_field(&up.collections, field)?);
        }

        let aligned = up.is_root
            && up
                .partition_key
                .as_ref()
                .is_some_and(|key| bound.contains(key));

        let scanned_docs = if aligned {
            count_floor(up.docs as f64 * ctx.catalog.cluster().sharding_access_fraction)
        } else {
            up.docs
        };

        let mut matching = scanned_docs as f64;
        for field in &bound {
            matching = ctx.selectivity(field)?.apply(matching);
        }
        let output_docs = count_floor(matching);

        let output_doc_size = ctx.output_size(&projected, up.doc_size);
        let scanned_bytes = scanned_docs as f64 * up.doc_size;

        let layout = up
            .collections
            .first()
            .and_then(|name| ctx.signature.layout(name));
        let indexes_used = match (up.is_root, layout) {
            (true, Some(layout)) => bound
                .iter()
                .filter(|f| layout.indexes.contains(&f.path))
                .map(|f| f.path.clone())
                .collect(),
            _ => Vec::new(),
        };

        let phases = vec![ctx.cost_model.phase("scan", scanned_bytes, 0.0)?];
        trace!(
            step = index,
            aligned,
            scanned_docs,
            output_docs,
            "filter estimated"
        );

        Ok(Step {
            index,
            kind: OperatorKind::Filter,
            label: String::new(),
            inputs: vec![input.clone()],
            collections: up.collections,
            partition_key: up.partition_key,
            scanned_docs,
            scanned_bytes,
            shuffled_bytes: 0.0,
            output_docs,
            output_doc_size,
            output_bytes: output_docs as f64 * output_doc_size,
            sharding_aligned: aligned,
            indexes_used,
            cost: total_cost(&phases),
            phases,
        })
    }
}
