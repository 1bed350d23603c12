// SPDX-License-Identifier: PMPL-1.0-or-later
//! Estimator configuration.
//!
//! Every tuning constant of the cost model lives here and is passed
//! explicitly into the cost model and operators, so runs with different
//! tunings can coexist. Defaults:
//! - cost units per GiB: time 1.0, carbon 0.5, price 0.1
//! - network multiplier: 5.0
//! - default selectivity: 0.1, default group cardinality: 1000
//! - partial aggregate fraction: 0.1, aggregate record: 64 B
//! - per-field framing overhead: 12 B

use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, Result};
use crate::schema::FieldKind;

/// Bytes per GiB; cost units are expressed per GiB moved.
pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Cost charged per GiB scanned, one entry per cost dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostUnits {
    pub time: f64,
    pub carbon: f64,
    pub price: f64,
}

impl Default for CostUnits {
    fn default() -> Self {
        Self {
            time: 1.0,
            carbon: 0.5,
            price: 0.1,
        }
    }
}

/// Average value sizes for primitive fields declared without `avg_size`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSizes {
    pub integer: f64,
    pub number: f64,
    pub string: f64,
    pub boolean: f64,
    pub date: f64,
}

impl TypeSizes {
    /// Size of a primitive kind. Composite kinds have no intrinsic size.
    pub fn size_of(&self, kind: FieldKind) -> f64 {
        match kind {
            FieldKind::Integer => self.integer,
            FieldKind::Number => self.number,
            FieldKind::String => self.string,
            FieldKind::Boolean => self.boolean,
            FieldKind::Date => self.date,
            FieldKind::Object | FieldKind::Array => 0.0,
        }
    }
}

impl Default for TypeSizes {
    fn default() -> Self {
        Self {
            integer: 8.0,
            number: 8.0,
            string: 80.0,
            boolean: 8.0,
            date: 20.0,
        }
    }
}

/// Configuration for the estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Cost per GiB scanned.
    pub cost_units: CostUnits,
    /// Multiplier applied to bytes moved across shards.
    pub network_multiplier: f64,
    /// Filter/join selectivity when no statistic is available.
    pub default_selectivity: f64,
    /// Group count per grouping key when its distinct count is unknown.
    pub default_group_cardinality: u64,
    /// Share of the map output shipped as partial aggregates (0.0–1.0].
    pub partial_aggregate_fraction: f64,
    /// Size of one aggregate result record in bytes.
    pub aggregate_record_bytes: f64,
    /// Framing overhead added per field when sizing whole documents.
    pub field_overhead_bytes: f64,
    /// Sizes of primitive types declared without `avg_size`.
    pub type_sizes: TypeSizes,
    /// Join selectivity applied to every join, unless the query has its own.
    pub join_selectivity_override: Option<f64>,
}

impl EstimatorConfig {
    /// Check every constant is in its domain.
    pub fn validate(&self) -> Result<()> {
        let units = self.cost_units;
        for (name, value) in [
            ("cost_units.time", units.time),
            ("cost_units.carbon", units.carbon),
            ("cost_units.price", units.price),
            ("network_multiplier", self.network_multiplier),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EstimationError::config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        check_fraction("default_selectivity", self.default_selectivity)?;
        check_fraction("partial_aggregate_fraction", self.partial_aggregate_fraction)?;
        if let Some(sel) = self.join_selectivity_override {
            check_fraction("join_selectivity_override", sel)?;
        }
        if self.default_group_cardinality == 0 {
            return Err(EstimationError::config(
                "default_group_cardinality must be at least 1",
            ));
        }
        for (name, value) in [
            ("aggregate_record_bytes", self.aggregate_record_bytes),
            ("field_overhead_bytes", self.field_overhead_bytes),
            ("type_sizes.integer", self.type_sizes.integer),
            ("type_sizes.number", self.type_sizes.number),
            ("type_sizes.string", self.type_sizes.string),
            ("type_sizes.boolean", self.type_sizes.boolean),
            ("type_sizes.date", self.type_sizes.date),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EstimationError::config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Fractions must lie in (0, 1].
pub(crate) fn check_fraction(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EstimationError::config(format!(
            "{name} must lie in (0, 1], got {value}"
        )))
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            cost_units: CostUnits::default(),
            network_multiplier: 5.0,
            default_selectivity: 0.1,
            default_group_cardinality: 1000,
            partial_aggregate_fraction: 0.1,
            aggregate_record_bytes: 64.0,
            field_overhead_bytes: 12.0,
            type_sizes: TypeSizes::default(),
            join_selectivity_override: None,
        }
    }
}
