// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cost model.
//!
//! IO volume is converted into a {time, carbon, price} vector using per-GiB
//! unit constants. Bytes shuffled across shards are charged the same units
//! scaled by the network multiplier.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::config::{CostUnits, EstimatorConfig, BYTES_PER_GIB};
use crate::error::{EstimationError, Result};

/// Resource cost of a step, a query or a whole signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostVector {
    pub time: f64,
    pub carbon: f64,
    pub price: f64,
}

impl CostVector {
    pub const ZERO: CostVector = CostVector {
        time: 0.0,
        carbon: 0.0,
        price: 0.0,
    };

    pub fn new(time: f64, carbon: f64, price: f64) -> Self {
        Self {
            time,
            carbon,
            price,
        }
    }

    /// Multiply every dimension, e.g. by a query's frequency.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            time: self.time * factor,
            carbon: self.carbon * factor,
            price: self.price * factor,
        }
    }

    /// Weighted sum of the three dimensions.
    pub fn weighted(&self, time: f64, carbon: f64, price: f64) -> f64 {
        self.time * time + self.carbon * carbon + self.price * price
    }
}

impl Add for CostVector {
    type Output = CostVector;

    fn add(self, rhs: CostVector) -> CostVector {
        CostVector {
            time: self.time + rhs.time,
            carbon: self.carbon + rhs.carbon,
            price: self.price + rhs.price,
        }
    }
}

impl AddAssign for CostVector {
    fn add_assign(&mut self, rhs: CostVector) {
        *self = *self + rhs;
    }
}

impl Sum for CostVector {
    fn sum<I: Iterator<Item = CostVector>>(iter: I) -> CostVector {
        iter.fold(CostVector::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a CostVector> for CostVector {
    fn sum<I: Iterator<Item = &'a CostVector>>(iter: I) -> CostVector {
        iter.copied().sum()
    }
}

/// Labelled share of a step's cost, e.g. the shuffle of an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCost {
    pub label: String,
    pub scanned_bytes: f64,
    pub shuffled_bytes: f64,
    pub cost: CostVector,
}

/// Converts IO volume into cost vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    units: CostUnits,
    network_multiplier: f64,
}

impl CostModel {
    pub fn new(units: CostUnits, network_multiplier: f64) -> Self {
        Self {
            units,
            network_multiplier,
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(config.cost_units, config.network_multiplier)
    }

    pub fn network_multiplier(&self) -> f64 {
        self.network_multiplier
    }

    /// Cost of scanning `scanned_bytes` locally and moving `shuffled_bytes`
    /// over the network. Negative volumes are rejected, never clamped.
    pub fn estimate(&self, scanned_bytes: f64, shuffled_bytes: f64) -> Result<CostVector> {
        for (name, value) in [("scanned", scanned_bytes), ("shuffled", shuffled_bytes)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EstimationError::config(format!(
                    "{name} bytes must be a non-negative number, got {value}"
                )));
            }
        }
        let scanned = scanned_bytes / BYTES_PER_GIB;
        let shuffled = shuffled_bytes / BYTES_PER_GIB * self.network_multiplier;
        let volume = scanned + shuffled;
        Ok(CostVector {
            time: volume * self.units.time,
            carbon: volume * self.units.carbon,
            price: volume * self.units.price,
        })
    }

    /// Cost of one labelled phase.
    pub fn phase(&self, label: &str, scanned_bytes: f64, shuffled_bytes: f64) -> Result<PhaseCost> {
        Ok(PhaseCost {
            label: label.to_string(),
            scanned_bytes,
            shuffled_bytes,
            cost: self.estimate(scanned_bytes, shuffled_bytes)?,
        })
    }
}
