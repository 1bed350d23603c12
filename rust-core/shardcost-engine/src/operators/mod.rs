// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cost-bearing operators.
//!
//! Each operator consumes the estimates of its inputs and produces one new
//! [`Step`]. Operators never modify earlier steps.

pub mod aggregate;
pub mod filter;
pub mod join;

pub use aggregate::AggregateOperator;
pub use filter::FilterOperator;
pub use join::JoinOperator;

use crate::context::EvalContext;
use crate::cost::{CostVector, PhaseCost};
use crate::error::Result;
use crate::plan::{PlanOperator, Step};

/// Execute one operator as step `index` of a chain.
pub fn execute(ctx: &EvalContext<'_>, index: usize, op: &PlanOperator, steps: &[Step]) -> Result<Step> {
    match op {
        PlanOperator::Filter {
            input,
            predicates,
            output_fields,
        } => FilterOperator::estimate(ctx, index, input, predicates, output_fields, steps),
        PlanOperator::Join {
            left,
            right,
            left_key,
            right_key,
            output_fields,
            selectivity,
        } => JoinOperator::estimate(
            ctx,
            index,
            join::JoinSpec {
                left,
                right,
                left_key,
                right_key,
                output_fields,
                selectivity: *selectivity,
            },
            steps,
        ),
        PlanOperator::Aggregate {
            input,
            group_by,
            functions,
        } => AggregateOperator::estimate(ctx, index, input, group_by, functions, steps),
    }
    .map(|mut step| {
        step.label = op.label();
        step
    })
}

/// Step cost is the sum of its phases.
pub(crate) fn total_cost(phases: &[PhaseCost]) -> CostVector {
    phases.iter().map(|p| p.cost).sum()
}
