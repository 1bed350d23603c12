// SPDX-License-Identifier: PMPL-1.0-or-later
//! Validated schema plus statistics, shared read-only by every evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, Result};
use crate::schema::{CollectionSchema, Schema};
use crate::stats::{ClusterStats, CollectionStats, Stats};

/// Deserializing a catalog runs the same validation as [`Catalog::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CatalogParts")]
pub struct Catalog {
    schema: Schema,
    stats: Stats,
}

#[derive(Deserialize)]
struct CatalogParts {
    schema: Schema,
    stats: Stats,
}

impl TryFrom<CatalogParts> for Catalog {
    type Error = EstimationError;

    fn try_from(parts: CatalogParts) -> Result<Self> {
        Catalog::new(parts.schema, parts.stats)
    }
}

impl Catalog {
    /// Validate and bundle a schema with its statistics.
    pub fn new(schema: Schema, stats: Stats) -> Result<Self> {
        schema.validate()?;
        stats.validate(&schema)?;
        Ok(Self { schema, stats })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cluster(&self) -> &ClusterStats {
        &self.stats.cluster
    }

    pub fn collection_schema(&self, name: &str) -> Result<&CollectionSchema> {
        self.schema.collection(name)
    }

    pub fn collection_stats(&self, name: &str) -> Result<&CollectionStats> {
        self.stats.collection(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_validates_inputs() {
        let schema: Schema = serde_json::from_str(
            r#"{"collections": {"Product": {"primary_key": "IDP", "fields": {"IDP": {"type": "integer"}}}}}"#,
        )
        .unwrap();
        let stats: Stats = serde_json::from_str(
            r#"{"collections": {"Product": {"nb_documents": 5, "distinct_values": {"IDP": 6}}}}"#,
        )
        .unwrap();
        assert!(matches!(
            Catalog::new(schema.clone(), stats),
            Err(EstimationError::Configuration(_))
        ));

        let stats: Stats = serde_json::from_str(
            r#"{"collections": {"Product": {"nb_documents": 5}}}"#,
        )
        .unwrap();
        let catalog = Catalog::new(schema, stats).unwrap();
        assert_eq!(catalog.collection_stats("Product").unwrap().nb_documents, 5);
        assert_eq!(catalog.cluster().nb_servers, 1000);
    }

    #[test]
    fn test_deserialize_validates() {
        let missing_key = r#"{
            "schema": {"collections": {"Product": {"primary_key": "IDP", "fields": {"brand": {"type": "string"}}}}},
            "stats": {"collections": {"Product": {"nb_documents": 5}}}
        }"#;
        let err = serde_json::from_str::<Catalog>(missing_key).unwrap_err();
        assert!(err.to_string().contains("IDP"));

        let valid = r#"{
            "schema": {"collections": {"Product": {"primary_key": "IDP", "fields": {"IDP": {"type": "integer"}}}}},
            "stats": {"collections": {"Product": {"nb_documents": 5}}}
        }"#;
        let catalog: Catalog = serde_json::from_str(valid).unwrap();
        assert_eq!(catalog.collection_stats("Product").unwrap().nb_documents, 5);

        let json = serde_json::to_string(&catalog).unwrap();
        let reloaded: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.cluster().nb_servers, catalog.cluster().nb_servers);
    }
}
