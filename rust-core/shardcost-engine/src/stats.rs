// SPDX-License-Identifier: PMPL-1.0-or-later
//! Corpus and cluster statistics.
//!
//! Statistics are supplied, never measured: document counts, distinct-value
//! counts, average array lengths and optional per-field selectivities per
//! collection, plus the cluster topology and per-query frequencies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::check_fraction;
use crate::error::{EstimationError, Result};
use crate::schema::Schema;

/// Cluster topology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStats {
    pub nb_servers: u32,
    /// Fraction of the collection a shard-key-targeted operation touches.
    pub sharding_access_fraction: f64,
}

impl Default for ClusterStats {
    fn default() -> Self {
        Self {
            nb_servers: 1000,
            sharding_access_fraction: 0.1,
        }
    }
}

/// Statistics for one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub nb_documents: u64,
    #[serde(default)]
    pub distinct_values: BTreeMap<String, u64>,
    /// Average length of array-valued paths (native arrays and "many" embeds).
    #[serde(default)]
    pub avg_array_lengths: BTreeMap<String, f64>,
    /// Configured selectivity for equality predicates on a field.
    #[serde(default)]
    pub field_selectivity: BTreeMap<String, f64>,
}

impl CollectionStats {
    pub fn new(nb_documents: u64) -> Self {
        Self {
            nb_documents,
            ..Default::default()
        }
    }

    /// Average array length at `path`, 1 when not recorded.
    pub fn array_length(&self, path: &str) -> f64 {
        self.avg_array_lengths.get(path).copied().unwrap_or(1.0)
    }

    pub fn distinct(&self, field: &str) -> Option<u64> {
        self.distinct_values.get(field).copied()
    }

    pub fn with_distinct(mut self, field: &str, count: u64) -> Self {
        self.distinct_values.insert(field.to_string(), count);
        self
    }

    pub fn with_array_length(mut self, path: &str, length: f64) -> Self {
        self.avg_array_lengths.insert(path.to_string(), length);
        self
    }

    fn validate(&self, collection: &str) -> Result<()> {
        for (field, &distinct) in &self.distinct_values {
            if distinct > self.nb_documents {
                return Err(EstimationError::config(format!(
                    "{collection}.{field}: {distinct} distinct values exceed {} documents",
                    self.nb_documents
                )));
            }
        }
        for (path, &length) in &self.avg_array_lengths {
            if !(length.is_finite() && length >= 0.0) {
                return Err(EstimationError::config(format!(
                    "{collection}.{path}: average array length must be non-negative, got {length}"
                )));
            }
        }
        for (field, &selectivity) in &self.field_selectivity {
            check_fraction(&format!("{collection}.{field} selectivity"), selectivity)?;
        }
        Ok(())
    }
}

/// All statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub cluster: ClusterStats,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionStats>,
    /// Query id to execution weight.
    #[serde(default)]
    pub query_frequencies: BTreeMap<String, u64>,
}

impl Stats {
    /// Statistics of a collection. Missing statistics are a configuration
    /// error rather than a silent zero.
    pub fn collection(&self, name: &str) -> Result<&CollectionStats> {
        self.collections.get(name).ok_or_else(|| {
            EstimationError::config(format!("missing statistics for collection `{name}`"))
        })
    }

    pub fn frequency(&self, query_id: &str) -> Option<u64> {
        self.query_frequencies.get(query_id).copied()
    }

    pub fn validate(&self, schema: &Schema) -> Result<()> {
        if self.cluster.nb_servers == 0 {
            return Err(EstimationError::config("cluster must have at least one server"));
        }
        check_fraction(
            "sharding_access_fraction",
            self.cluster.sharding_access_fraction,
        )?;
        for (name, stats) in &self.collections {
            if !schema.collections.contains_key(name) {
                return Err(EstimationError::config(format!(
                    "statistics given for unknown collection `{name}`"
                )));
            }
            stats.validate(name)?;
        }
        for (query, &frequency) in &self.query_frequencies {
            if frequency == 0 {
                return Err(EstimationError::config(format!(
                    "frequency of query `{query}` must be positive"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CollectionSchema, FieldKind, FieldSpec};

    fn product_schema() -> Schema {
        let mut fields = BTreeMap::new();
        fields.insert("IDP".to_string(), FieldSpec::primitive(FieldKind::Integer));
        let mut schema = Schema::default();
        schema.collections.insert(
            "Product".to_string(),
            CollectionSchema {
                primary_key: "IDP".to_string(),
                fields,
            },
        );
        schema
    }

    #[test]
    fn test_cluster_defaults() {
        let stats: Stats = serde_json::from_str(r#"{"collections": {}}"#).unwrap();
        assert_eq!(stats.cluster.nb_servers, 1000);
        assert!((stats.cluster.sharding_access_fraction - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_array_length_defaults_to_one() {
        let stats = CollectionStats::new(10).with_array_length("lines", 3.5);
        assert!((stats.array_length("lines") - 3.5).abs() < f64::EPSILON);
        assert!((stats.array_length("tags") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distinct_exceeding_documents_rejected() {
        let mut stats = Stats::default();
        stats.collections.insert(
            "Product".to_string(),
            CollectionStats::new(10).with_distinct("IDP", 11),
        );
        assert!(matches!(
            stats.validate(&product_schema()),
            Err(EstimationError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_collection_rejected() {
        let mut stats = Stats::default();
        stats
            .collections
            .insert("Stock".to_string(), CollectionStats::new(10));
        assert!(stats.validate(&product_schema()).is_err());
    }

    #[test]
    fn test_invalid_cluster_rejected() {
        let mut stats = Stats::default();
        stats.cluster.nb_servers = 0;
        assert!(stats.validate(&product_schema()).is_err());

        let mut stats = Stats::default();
        stats.cluster.sharding_access_fraction = 0.0;
        assert!(stats.validate(&product_schema()).is_err());
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let mut stats = Stats::default();
        stats.query_frequencies.insert("Q1".to_string(), 0);
        assert!(stats.validate(&product_schema()).is_err());
    }

    #[test]
    fn test_missing_collection_stats() {
        let stats = Stats::default();
        assert!(stats.collection("Product").is_err());
    }
}
