// SPDX-License-Identifier: PMPL-1.0-or-later
//! Denormalization-aware field resolution.
//!
//! Given a signature, every (collection, dotted path) pair resolves to one of
//! three locations: stored natively, copied in from another collection by an
//! embed chain, or not available at all. Native fields win over embeds whose
//! path collides with them.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::EstimatorConfig;
use crate::error::{EstimationError, Result};
use crate::signature::Signature;
use crate::size::DocumentSizer;

/// Where a field's value physically lives under a signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum FieldLocation {
    /// Declared on the collection itself. `size` includes the lengths of
    /// any native arrays the path crosses.
    Native { size: f64 },
    /// Supplied by an embed chain ending at `source`. `source_field` is
    /// `None` when the path names the embedded sub-document as a whole.
    Embedded {
        source: String,
        source_field: Option<String>,
        size: f64,
        multiplicity: f64,
    },
    Missing,
}

impl FieldLocation {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldLocation::Missing)
    }

    /// Effective projected size in bytes; zero when missing.
    pub fn size(&self) -> f64 {
        match self {
            FieldLocation::Native { size } | FieldLocation::Embedded { size, .. } => *size,
            FieldLocation::Missing => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    sizer: DocumentSizer<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, signature: &'a Signature, config: &'a EstimatorConfig) -> Self {
        Self {
            sizer: DocumentSizer::new(catalog, signature, config),
        }
    }

    pub fn sizer(&self) -> &DocumentSizer<'a> {
        &self.sizer
    }

    pub fn resolve(&self, collection: &str, path: &str) -> Result<FieldLocation> {
        self.resolve_guarded(collection, path, &mut Vec::new())
    }

    fn resolve_guarded(
        &self,
        collection: &str,
        path: &str,
        trail: &mut Vec<String>,
    ) -> Result<FieldLocation> {
        if trail.iter().any(|c| c == collection) {
            return Err(EstimationError::config(format!(
                "embed cycle through `{collection}` while resolving `{path}`"
            )));
        }
        let catalog = self.sizer.catalog();
        let schema = catalog.collection_schema(collection)?;
        let stats = catalog.collection_stats(collection)?;

        if let Some(found) = schema.lookup(path) {
            let mut size = self.sizer.value_size(stats, path, found.spec, 0.0);
            for array in &found.array_paths {
                size *= stats.array_length(array);
            }
            return Ok(FieldLocation::Native { size });
        }

        trail.push(collection.to_string());
        for embed in self.sizer.signature().embeds_into(collection) {
            if self.sizer.is_shadowed(embed)? {
                continue;
            }
            let factor = self.sizer.embed_factor(embed)?;
            if path == embed.path {
                let size = self.sizer.raw_document_size(&embed.source)? * factor;
                trail.pop();
                return Ok(FieldLocation::Embedded {
                    source: embed.source.clone(),
                    source_field: None,
                    size,
                    multiplicity: factor,
                });
            }
            let Some(rest) = path
                .strip_prefix(embed.path.as_str())
                .and_then(|r| r.strip_prefix('.'))
            else {
                continue;
            };
            let location = match self.resolve_guarded(&embed.source, rest, trail)? {
                FieldLocation::Missing => continue,
                FieldLocation::Native { size } => FieldLocation::Embedded {
                    source: embed.source.clone(),
                    source_field: Some(rest.to_string()),
                    size: size * factor,
                    multiplicity: factor,
                },
                FieldLocation::Embedded {
                    source,
                    source_field,
                    size,
                    multiplicity,
                } => FieldLocation::Embedded {
                    source,
                    source_field,
                    size: size * factor,
                    multiplicity: multiplicity * factor,
                },
            };
            trail.pop();
            return Ok(location);
        }
        trail.pop();
        Ok(FieldLocation::Missing)
    }

    /// Sum of the projected sizes of `fields`; every field must resolve.
    pub fn projected_size(&self, collection: &str, fields: &[String]) -> Result<f64> {
        let mut total = 0.0;
        for field in fields {
            match self.resolve(collection, field)? {
                FieldLocation::Missing => {
                    return Err(EstimationError::unresolvable(collection, field))
                }
                location => total += location.size(),
            }
        }
        Ok(total)
    }

    /// Collection and field whose statistics describe `path`: the
    /// collection itself for native fields, the embed chain's source
    /// otherwise.
    fn stats_owner(&self, collection: &str, path: &str) -> Result<Option<(String, String)>> {
        Ok(match self.resolve(collection, path)? {
            FieldLocation::Native { .. } => Some((collection.to_string(), path.to_string())),
            FieldLocation::Embedded {
                source,
                source_field: Some(field),
                ..
            } => Some((source, field)),
            FieldLocation::Embedded {
                source_field: None, ..
            } => None,
            FieldLocation::Missing => return Err(EstimationError::unresolvable(collection, path)),
        })
    }

    /// Distinct-value count of a field, `None` when not recorded.
    pub fn distinct_values(&self, collection: &str, path: &str) -> Result<Option<u64>> {
        let Some((owner, field)) = self.stats_owner(collection, path)? else {
            return Ok(None);
        };
        Ok(self.sizer.catalog().collection_stats(&owner)?.distinct(&field))
    }

    /// Configured selectivity of an equality predicate on a field.
    pub fn selectivity_override(&self, collection: &str, path: &str) -> Result<Option<f64>> {
        let Some((owner, field)) = self.stats_owner(collection, path)? else {
            return Ok(None);
        };
        Ok(self
            .sizer
            .catalog()
            .collection_stats(&owner)?
            .field_selectivity
            .get(&field)
            .copied())
    }
}
