// SPDX-License-Identifier: PMPL-1.0-or-later
//! Loading a workload from disk.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use shardcost_engine::loader;
use shardcost_engine::{Catalog, EstimatorConfig, Query, Signature};

/// Input files of a run.
#[derive(Debug, Clone)]
pub struct WorkloadPaths {
    pub schema: PathBuf,
    pub stats: PathBuf,
    pub signatures: PathBuf,
    pub queries: PathBuf,
    pub config: Option<PathBuf>,
}

impl WorkloadPaths {
    /// The conventional file names inside one directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            schema: dir.join("schema.json"),
            stats: dir.join("stats.json"),
            signatures: dir.join("denormalizations.json"),
            queries: dir.join("queries.json"),
            config: None,
        }
    }
}

/// Everything an estimation run needs.
#[derive(Debug, Clone)]
pub struct Workload {
    pub catalog: Catalog,
    pub signatures: Vec<Signature>,
    pub queries: Vec<Query>,
    pub config: EstimatorConfig,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

impl Workload {
    pub fn load(paths: &WorkloadPaths) -> Result<Self> {
        let catalog = loader::parse_catalog(&read(&paths.schema)?, &read(&paths.stats)?)
            .with_context(|| {
                format!(
                    "loading catalog from {} and {}",
                    paths.schema.display(),
                    paths.stats.display()
                )
            })?;
        let signatures = loader::parse_signatures(&read(&paths.signatures)?)
            .with_context(|| format!("parsing {}", paths.signatures.display()))?;
        let queries = loader::parse_queries(&read(&paths.queries)?)
            .with_context(|| format!("parsing {}", paths.queries.display()))?;
        let config = match &paths.config {
            Some(path) => loader::parse_config(&read(path)?)
                .with_context(|| format!("parsing {}", path.display()))?,
            None => EstimatorConfig::default(),
        };
        info!(
            collections = catalog.schema().collections.len(),
            signatures = signatures.len(),
            queries = queries.len(),
            "workload loaded"
        );
        Ok(Self {
            catalog,
            signatures,
            queries,
            config,
        })
    }
}
