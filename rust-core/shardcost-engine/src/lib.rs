// SPDX-License-Identifier: PMPL-1.0-or-later
//! ShardCost Engine
//!
//! Query cost estimation for NoSQL denormalization signatures.
//! Resolves fields and document sizes under a signature, plans each query
//! into a filter/join/aggregate chain and prices the chain's IO as a
//! time/carbon/price cost vector.

pub mod catalog;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod estimator;
pub mod loader;
pub mod operators;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod resolver;
pub mod schema;
pub mod signature;
pub mod size;
pub mod sql;
pub mod stats;

#[cfg(test)]
mod testing;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use catalog::Catalog;
pub use config::{CostUnits, EstimatorConfig, TypeSizes, BYTES_PER_GIB};
pub use context::{count_floor, EvalContext, Selectivity};
pub use cost::{CostModel, CostVector, PhaseCost};
pub use error::{EstimationError, Result};
pub use estimator::{BatchReport, Estimator, PairingResult, QueryEstimate};
pub use pipeline::Pipeline;
pub use plan::{
    AggregateCall, AggregateFunction, FieldRef, PlanOperator, Predicate, Query, QueryPlan, Step,
    StepInput,
};
pub use planner::QueryPlanner;
pub use resolver::{FieldLocation, Resolver};
pub use schema::{CollectionSchema, FieldKind, FieldSpec, Schema};
pub use signature::{Cardinality, CollectionLayout, Embed, Signature};
pub use size::DocumentSizer;
pub use stats::{ClusterStats, CollectionStats, Stats};

/// The three cost-bearing operators of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    Filter,
    Join,
    Aggregate,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 3] = [
        OperatorKind::Filter,
        OperatorKind::Join,
        OperatorKind::Aggregate,
    ];
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Filter => write!(f, "filter"),
            OperatorKind::Join => write!(f, "join"),
            OperatorKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

impl FromStr for OperatorKind {
    type Err = EstimationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "filter" => Ok(OperatorKind::Filter),
            "join" => Ok(OperatorKind::Join),
            "aggregate" => Ok(OperatorKind::Aggregate),
            _ => Err(EstimationError::Parse(format!("unknown operator `{s}`"))),
        }
    }
}
