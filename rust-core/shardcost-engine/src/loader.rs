// SPDX-License-Identifier: PMPL-1.0-or-later
//! JSON input documents.
//!
//! Reading files is left to callers; these helpers only parse and validate
//! what the files contain.

use serde::Deserialize;

use crate::catalog::Catalog;
use crate::config::EstimatorConfig;
use crate::error::{EstimationError, Result};
use crate::plan::Query;
use crate::schema::Schema;
use crate::signature::Signature;
use crate::stats::Stats;

/// Signatures come either wrapped or as a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignatureDocument {
    Wrapped { denormalizations: Vec<Signature> },
    Bare(Vec<Signature>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryDocument {
    Wrapped { queries: Vec<Query> },
    Bare(Vec<Query>),
}

pub fn parse_schema(json: &str) -> Result<Schema> {
    let schema: Schema = serde_json::from_str(json)?;
    schema.validate()?;
    Ok(schema)
}

/// Statistics are validated against the schema when both are combined
/// into a [`Catalog`].
pub fn parse_stats(json: &str) -> Result<Stats> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_catalog(schema_json: &str, stats_json: &str) -> Result<Catalog> {
    Catalog::new(parse_schema(schema_json)?, parse_stats(stats_json)?)
}

/// Signature ids must be unique. Structural checks against the catalog run
/// per signature at estimation time.
pub fn parse_signatures(json: &str) -> Result<Vec<Signature>> {
    let signatures = match serde_json::from_str(json)? {
        SignatureDocument::Wrapped { denormalizations } => denormalizations,
        SignatureDocument::Bare(list) => list,
    };
    ensure_unique(signatures.iter().map(|s| s.id.as_str()), "signature")?;
    Ok(signatures)
}

pub fn parse_queries(json: &str) -> Result<Vec<Query>> {
    let queries = match serde_json::from_str(json)? {
        QueryDocument::Wrapped { queries } => queries,
        QueryDocument::Bare(list) => list,
    };
    ensure_unique(queries.iter().map(|q| q.id.as_str()), "query")?;
    if let Some(query) = queries.iter().find(|q| q.frequency == Some(0)) {
        return Err(EstimationError::config(format!(
            "frequency of query `{}` must be positive",
            query.id
        )));
    }
    Ok(queries)
}

/// Missing keys take their default values.
pub fn parse_config(json: &str) -> Result<EstimatorConfig> {
    let config: EstimatorConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

fn ensure_unique<'a>(ids: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EstimationError::config(format!("duplicate {what} id `{id}`")));
        }
    }
    Ok(())
}
