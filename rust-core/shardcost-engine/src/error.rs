// SPDX-License-Identifier: PMPL-1.0-or-later
//! Estimation error types.

use thiserror::Error;

/// Errors raised while planning or costing a (query, signature) pairing.
///
/// All variants are raised at plan or step construction time; no partial
/// plan is ever executed after one of them.
#[derive(Error, Debug)]
pub enum EstimationError {
    /// Malformed or cyclic signature, missing or invalid statistics,
    /// invalid tuning constants.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The query references a field that nothing can supply under the
    /// chosen signature.
    #[error("unresolvable field `{field}` on collection `{collection}`")]
    UnresolvableField { collection: String, field: String },

    /// A ratio was requested against a zero denominator.
    #[error("arithmetic domain error: {0}")]
    ArithmeticDomain(String),

    #[error("empty plan: query {0} produced no operators")]
    EmptyPlan(String),

    /// SQL text or explicit plan could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EstimationError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        EstimationError::Configuration(message.into())
    }

    pub(crate) fn unresolvable(collection: &str, field: &str) -> Self {
        EstimationError::UnresolvableField {
            collection: collection.to_string(),
            field: field.to_string(),
        }
    }
}

impl From<sqlparser::parser::ParserError> for EstimationError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        EstimationError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EstimationError>;
