// SPDX-License-Identifier: PMPL-1.0-or-later
//! Executes an operator chain, producing one step per operator.

use tracing::debug;

use crate::context::EvalContext;
use crate::error::{EstimationError, Result};
use crate::operators;
use crate::plan::{QueryPlan, Step, StepInput};

pub struct Pipeline;

impl Pipeline {
    /// Check the chain shape: every operator reads only earlier steps, and
    /// every step except the last feeds a later one.
    pub fn validate(plan: &QueryPlan) -> Result<()> {
        if plan.operators.is_empty() {
            return Err(EstimationError::EmptyPlan(plan.query_id.clone()));
        }
        let last = plan.operators.len() - 1;
        for (index, op) in plan.operators.iter().enumerate() {
            for input in op.inputs() {
                if let StepInput::Step(source) = input {
                    if *source >= index {
                        return Err(EstimationError::config(format!(
                            "query {}: step {index} reads step {source}, which does not precede it",
                            plan.query_id
                        )));
                    }
                }
            }
            let consumed = plan.operators[index + 1..]
                .iter()
                .any(|later| later.inputs().contains(&&StepInput::Step(index)));
            if index < last && !consumed {
                return Err(EstimationError::config(format!(
                    "query {}: step {index} is not consumed by any later step",
                    plan.query_id
                )));
            }
        }
        Ok(())
    }

    /// Run every operator in order. Steps are appended, never revised.
    pub fn run(ctx: &EvalContext<'_>, plan: &QueryPlan) -> Result<Vec<Step>> {
        Self::validate(plan)?;
        let mut steps: Vec<Step> = Vec::with_capacity(plan.operators.len());
        for (index, op) in plan.operators.iter().enumerate() {
            let step = operators::execute(ctx, index, op, &steps)?;
            steps.push(step);
        }
        debug!(
            query = %plan.query_id,
            signature = %plan.signature_id,
            steps = steps.len(),
            "pipeline executed"
        );
        Ok(steps)
    }
}
