// SPDX-License-Identifier: PMPL-1.0-or-later
//! Queries, operator plans and the step records produced by executing them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cost::{CostVector, PhaseCost};
use crate::error::EstimationError;
use crate::OperatorKind;

/// A query of the workload: declarative SQL or an explicit operator list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanOperator>>,
    /// Execution weight. Falls back to the statistics, then to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    /// Selectivity applied to this query's join, overriding statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_selectivity: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl Query {
    pub fn sql(id: &str, sql: &str) -> Self {
        Self {
            id: id.to_string(),
            sql: Some(sql.to_string()),
            plan: None,
            frequency: None,
            join_selectivity: None,
            description: String::new(),
        }
    }

    pub fn explicit(id: &str, operators: Vec<PlanOperator>) -> Self {
        Self {
            plan: Some(operators),
            sql: None,
            ..Self::sql(id, "")
        }
    }
}

/// Input of an operator: a stored collection or an earlier step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepInput {
    Collection(String),
    Step(usize),
}

impl StepInput {
    pub fn collection(name: &str) -> Self {
        StepInput::Collection(name.to_string())
    }
}

impl fmt::Display for StepInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepInput::Collection(name) => write!(f, "{}", name),
            StepInput::Step(index) => write!(f, "#{}", index),
        }
    }
}

/// A field bound to the collection that supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub collection: String,
    pub path: String,
}

impl FieldRef {
    pub fn new(collection: &str, path: &str) -> Self {
        Self {
            collection: collection.to_string(),
            path: path.to_string(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.collection, self.path)
    }
}

/// Equality predicate `field = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AggregateFunction {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" => Ok(AggregateFunction::Count),
            "sum" => Ok(AggregateFunction::Sum),
            "avg" => Ok(AggregateFunction::Avg),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            other => Err(EstimationError::Parse(format!(
                "unsupported aggregate function: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    /// `None` for `count(*)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// One operator of a plan, in the form both the planner and hand-written
/// plans use. Fields are dotted paths, optionally prefixed with the
/// collection they belong to (`Product.brand`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PlanOperator {
    Filter {
        input: StepInput,
        #[serde(default)]
        predicates: Vec<Predicate>,
        /// Projected fields; empty means whole documents.
        #[serde(default)]
        output_fields: Vec<String>,
    },
    Join {
        left: StepInput,
        right: StepInput,
        left_key: String,
        right_key: String,
        #[serde(default)]
        output_fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selectivity: Option<f64>,
    },
    Aggregate {
        input: StepInput,
        #[serde(default)]
        group_by: Vec<String>,
        #[serde(default)]
        functions: Vec<AggregateCall>,
    },
}

impl PlanOperator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            PlanOperator::Filter { .. } => OperatorKind::Filter,
            PlanOperator::Join { .. } => OperatorKind::Join,
            PlanOperator::Aggregate { .. } => OperatorKind::Aggregate,
        }
    }

    pub fn inputs(&self) -> Vec<&StepInput> {
        match self {
            PlanOperator::Filter { input, .. } | PlanOperator::Aggregate { input, .. } => {
                vec![input]
            }
            PlanOperator::Join { left, right, .. } => vec![left, right],
        }
    }

    /// Short human-readable description, e.g. `filter Product [brand]`.
    pub fn label(&self) -> String {
        match self {
            PlanOperator::Filter {
                input, predicates, ..
            } => {
                let fields: Vec<&str> = predicates.iter().map(|p| p.field.as_str()).collect();
                format!("filter {} [{}]", input, fields.join(", "))
            }
            PlanOperator::Join {
                left,
                right,
                left_key,
                right_key,
                ..
            } => format!("join {left}.{left_key} = {right}.{right_key}"),
            PlanOperator::Aggregate {
                input, group_by, ..
            } => format!("aggregate {} by [{}]", input, group_by.join(", ")),
        }
    }
}

/// Operator chain chosen for one (query, signature) pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub query_id: String,
    pub signature_id: String,
    pub operators: Vec<PlanOperator>,
    /// Base collections the plan reads.
    pub collections: Vec<String>,
    /// Planner decisions worth surfacing, such as an eliminated join.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl QueryPlan {
    pub fn join_count(&self) -> usize {
        self.operators
            .iter()
            .filter(|op| op.kind() == OperatorKind::Join)
            .count()
    }
}

/// Estimate produced by one executed operator. Steps are created once and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub index: usize,
    pub kind: OperatorKind,
    pub label: String,
    pub inputs: Vec<StepInput>,
    /// Base collections feeding this step.
    pub collections: Vec<String>,
    /// Field the output is partitioned by, if known.
    pub partition_key: Option<FieldRef>,
    pub scanned_docs: u64,
    pub scanned_bytes: f64,
    pub shuffled_bytes: f64,
    pub output_docs: u64,
    pub output_doc_size: f64,
    pub output_bytes: f64,
    /// The operation ran on the shard key and avoided full scans or
    /// shuffles.
    pub sharding_aligned: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes_used: Vec<String>,
    pub phases: Vec<PhaseCost>,
    pub cost: CostVector,
}
