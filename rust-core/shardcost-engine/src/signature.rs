// SPDX-License-Identifier: PMPL-1.0-or-later
//! Denormalization signatures.
//!
//! A signature is one physical layout of the logical schema: which
//! collections are materialized, how each is sharded and indexed, and which
//! collections are embedded into which.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::catalog::Catalog;
use crate::config::EstimatorConfig;
use crate::error::{EstimationError, Result};
use crate::resolver::{FieldLocation, Resolver};

/// How many source documents an embed places in each target document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => write!(f, "one"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

/// `source` documents copied into `target` documents under `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(alias = "from")]
    pub source: String,
    #[serde(alias = "to")]
    pub target: String,
    pub path: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Physical settings of a materialized collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLayout {
    /// Defaults to the collection's primary key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding_key: Option<String>,
    #[serde(default)]
    pub indexes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Materialized collections.
    pub collections: BTreeMap<String, CollectionLayout>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

impl Signature {
    pub fn is_materialized(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    pub fn layout(&self, collection: &str) -> Option<&CollectionLayout> {
        self.collections.get(collection)
    }

    /// Embeds whose target is `collection`, in declaration order.
    pub fn embeds_into<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a Embed> + 'a {
        self.embeds.iter().filter(move |e| e.target == collection)
    }

    /// Embeds whose source is `collection`, in declaration order.
    pub fn embeds_of<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a Embed> + 'a {
        self.embeds.iter().filter(move |e| e.source == collection)
    }

    /// Effective shard key of a materialized collection.
    pub fn shard_key(&self, catalog: &Catalog, collection: &str) -> Result<String> {
        let layout = self.layout(collection).ok_or_else(|| {
            EstimationError::config(format!(
                "collection `{collection}` is not materialized in signature {}",
                self.id
            ))
        })?;
        match &layout.sharding_key {
            Some(key) => Ok(key.clone()),
            None => Ok(catalog.collection_schema(collection)?.primary_key.clone()),
        }
    }

    /// Static checks: known collections with statistics, well-formed and
    /// acyclic embeds, resolvable shard keys.
    pub fn validate(&self, catalog: &Catalog, config: &EstimatorConfig) -> Result<()> {
        if self.collections.is_empty() {
            return Err(EstimationError::config(format!(
                "signature {} materializes no collection",
                self.id
            )));
        }
        for name in self.collections.keys() {
            self.check_known(catalog, name)?;
        }
        for embed in &self.embeds {
            self.check_known(catalog, &embed.source)?;
            self.check_known(catalog, &embed.target)?;
            if embed.path.is_empty() || embed.path.split('.').any(str::is_empty) {
                return Err(EstimationError::config(format!(
                    "signature {}: embed {} -> {} has an invalid path `{}`",
                    self.id, embed.source, embed.target, embed.path
                )));
            }
        }
        self.check_acyclic()?;

        let resolver = Resolver::new(catalog, self, config);
        for name in self.collections.keys() {
            let key = self.shard_key(catalog, name)?;
            if let FieldLocation::Missing = resolver.resolve(name, &key)? {
                return Err(EstimationError::config(format!(
                    "signature {}: sharding key `{key}` does not exist on `{name}`",
                    self.id
                )));
            }
        }
        Ok(())
    }

    fn check_known(&self, catalog: &Catalog, collection: &str) -> Result<()> {
        catalog.collection_schema(collection)?;
        catalog.collection_stats(collection).map(|_| ())
    }

    /// Depth-first search over source -> target edges. A self-embed is a
    /// cycle of length one.
    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            node: &'a str,
            edges: &BTreeMap<&'a str, Vec<&'a str>>,
            marks: &mut BTreeMap<&'a str, Mark>,
            trail: &mut Vec<&'a str>,
        ) -> std::result::Result<(), String> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    trail.push(node);
                    return Err(trail.join(" -> "));
                }
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            trail.push(node);
            if let Some(next) = edges.get(node) {
                for &target in next {
                    visit(target, edges, marks, trail)?;
                }
            }
            trail.pop();
            marks.insert(node, Mark::Done);
            Ok(())
        }

        let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for embed in &self.embeds {
            edges
                .entry(embed.source.as_str())
                .or_default()
                .push(embed.target.as_str());
        }
        let mut marks = BTreeMap::new();
        for &start in edges.keys() {
            let mut trail = Vec::new();
            visit(start, &edges, &mut marks, &mut trail).map_err(|cycle| {
                EstimationError::config(format!(
                    "signature {} has an embed cycle: {cycle}",
                    self.id
                ))
            })?;
        }
        Ok(())
    }
}
