// SPDX-License-Identifier: PMPL-1.0-or-later
//! Document size estimation.
//!
//! A document's size is the sum of its fields' sizes, walked recursively
//! through nested objects, arrays (element size × average length) and the
//! sub-documents embedded into it by the signature. Whole-document sizes
//! carry a per-field framing overhead; projected field sizes do not.

use crate::catalog::Catalog;
use crate::config::EstimatorConfig;
use crate::error::{EstimationError, Result};
use crate::schema::{FieldKind, FieldSpec};
use crate::signature::{Cardinality, Embed, Signature};
use crate::stats::CollectionStats;

#[derive(Debug, Clone, Copy)]
pub struct DocumentSizer<'a> {
    catalog: &'a Catalog,
    signature: &'a Signature,
    config: &'a EstimatorConfig,
}

impl<'a> DocumentSizer<'a> {
    pub fn new(catalog: &'a Catalog, signature: &'a Signature, config: &'a EstimatorConfig) -> Self {
        Self {
            catalog,
            signature,
            config,
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn signature(&self) -> &'a Signature {
        self.signature
    }

    pub fn config(&self) -> &'a EstimatorConfig {
        self.config
    }

    /// Average stored size of a document of `collection` under the
    /// signature, framing overhead included.
    pub fn document_size(&self, collection: &str) -> Result<f64> {
        self.sized(collection, self.config.field_overhead_bytes, &mut Vec::new())
    }

    /// Document size without framing overhead: the payload an embedded
    /// sub-document contributes when projected as a whole.
    pub fn raw_document_size(&self, collection: &str) -> Result<f64> {
        self.sized(collection, 0.0, &mut Vec::new())
    }

    /// Size of the collection's own declared fields, overhead included.
    pub fn native_size(&self, collection: &str) -> Result<f64> {
        let schema = self.catalog.collection_schema(collection)?;
        let stats = self.catalog.collection_stats(collection)?;
        let overhead = self.config.field_overhead_bytes;
        Ok(schema
            .fields
            .iter()
            .map(|(name, spec)| overhead + self.value_size(stats, name, spec, overhead))
            .sum())
    }

    /// Size of one field value at `path`. Objects sum their properties
    /// (each with `overhead`); arrays multiply the element size by the
    /// average length recorded for `path`.
    pub fn value_size(
        &self,
        stats: &CollectionStats,
        path: &str,
        spec: &FieldSpec,
        overhead: f64,
    ) -> f64 {
        if let Some(size) = spec.avg_size {
            return size;
        }
        match spec.kind {
            FieldKind::Object => spec
                .properties
                .iter()
                .map(|(name, child)| {
                    overhead + self.value_size(stats, &format!("{path}.{name}"), child, overhead)
                })
                .sum(),
            FieldKind::Array => match &spec.items {
                Some(items) => {
                    self.value_size(stats, path, items, overhead) * stats.array_length(path)
                }
                None => 0.0,
            },
            kind => self.config.type_sizes.size_of(kind),
        }
    }

    /// An embed whose path collides with a native field is shadowed: the
    /// native field wins and the embed contributes nothing.
    pub fn is_shadowed(&self, embed: &Embed) -> Result<bool> {
        Ok(self
            .catalog
            .collection_schema(&embed.target)?
            .has_field(&embed.path))
    }

    /// Multiplier an embed applies to its source's sizes.
    pub fn embed_factor(&self, embed: &Embed) -> Result<f64> {
        Ok(match embed.cardinality {
            Cardinality::One => 1.0,
            Cardinality::Many => self
                .catalog
                .collection_stats(&embed.target)?
                .array_length(&embed.path),
        })
    }

    fn sized(&self, collection: &str, overhead: f64, trail: &mut Vec<String>) -> Result<f64> {
        if trail.iter().any(|c| c == collection) {
            return Err(EstimationError::config(format!(
                "embed cycle through `{collection}` in signature {}",
                self.signature.id
            )));
        }
        let schema = self.catalog.collection_schema(collection)?;
        let stats = self.catalog.collection_stats(collection)?;

        let mut total: f64 = schema
            .fields
            .iter()
            .map(|(name, spec)| overhead + self.value_size(stats, name, spec, overhead))
            .sum();

        trail.push(collection.to_string());
        for embed in self.signature.embeds_into(collection) {
            if self.is_shadowed(embed)? {
                continue;
            }
            let inner = self.sized(&embed.source, overhead, trail)?;
            total += overhead + inner * self.embed_factor(embed)?;
        }
        trail.pop();
        Ok(total)
    }
}
