//! Fixed-point color table
//!
//! One [`ColorVector`] per virtual tool, holding the weight of every
//! physical feeder. Entries beyond the configured feeder count stay zero,
//! so sums and maxima can run over the whole fixed-size array.

use serde::{Deserialize, Serialize};

use super::error::MixerError;
use super::weight::Weight;
use crate::config::{MAX_FEEDERS, MAX_VTOOLS};

/// Mix expressed as whole percentages per feeder (0-100)
pub type MixPercentages = [u8; MAX_FEEDERS];

/// Fixed-point weight vector of one virtual tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ColorVector {
    weights: [Weight; MAX_FEEDERS],
}

impl ColorVector {
    /// All-zero vector (not a usable mix)
    pub const EMPTY: Self = Self {
        weights: [Weight::ZERO; MAX_FEEDERS],
    };

    /// Vector that feeds a single feeder at full weight
    pub const fn pure(feeder: usize) -> Self {
        let mut weights = [Weight::ZERO; MAX_FEEDERS];
        if feeder < MAX_FEEDERS {
            weights[feeder] = Weight::MAX;
        }
        Self { weights }
    }

    /// Build from a weight slice; extra entries are ignored
    pub fn from_weights(weights: &[Weight]) -> Self {
        let mut v = Self::EMPTY;
        for (slot, w) in v.weights.iter_mut().zip(weights) {
            *slot = *w;
        }
        v
    }

    /// Scale a proportion vector so its strongest component becomes
    /// [`Weight::MAX`]
    ///
    /// Every proportion must be finite and non-negative, and at least one
    /// must be positive.
    pub fn from_proportions(proportions: &[f32]) -> Result<Self, MixerError> {
        let mut cmax = 0.0f32;
        for &p in proportions.iter().take(MAX_FEEDERS) {
            if !p.is_finite() || p < 0.0 {
                return Err(MixerError::InvalidProportion);
            }
            if p > cmax {
                cmax = p;
            }
        }
        if cmax <= 0.0 {
            return Err(MixerError::DegenerateMix);
        }

        let scale = Weight::MAX.as_f32() / cmax;
        let mut v = Self::EMPTY;
        for (slot, &p) in v.weights.iter_mut().zip(proportions) {
            *slot = Weight::from_f32_rounded(p * scale);
        }
        Ok(v)
    }

    /// Get the weight of one feeder
    #[inline]
    pub fn weight(&self, feeder: usize) -> Weight {
        self.weights.get(feeder).copied().unwrap_or(Weight::ZERO)
    }

    /// All weights, including unused trailing feeders
    #[inline]
    pub fn weights(&self) -> &[Weight; MAX_FEEDERS] {
        &self.weights
    }

    /// Largest weight in the vector
    pub fn max(&self) -> Weight {
        self.weights.iter().copied().max().unwrap_or(Weight::ZERO)
    }

    /// Sum of all weights
    pub fn sum(&self) -> u16 {
        self.weights.iter().map(|w| w.raw() as u16).sum()
    }

    /// An all-zero vector cannot drive any feeder
    pub fn is_degenerate(&self) -> bool {
        self.weights.iter().all(|w| w.is_zero())
    }

    /// Percentage view of the vector, rounded up per feeder
    pub fn percentages(&self) -> Result<MixPercentages, MixerError> {
        let total = self.sum();
        if total == 0 {
            return Err(MixerError::DegenerateMix);
        }

        let mut pct = [0u8; MAX_FEEDERS];
        for (slot, w) in pct.iter_mut().zip(self.weights.iter()) {
            let p = libm::ceilf(100.0 * w.as_f32() / total as f32);
            *slot = p.min(100.0) as u8;
        }
        Ok(pct)
    }
}

/// Color vectors of every virtual tool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ColorTable {
    entries: [ColorVector; MAX_VTOOLS],
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorTable {
    /// Create a table with every entry zeroed
    ///
    /// Call [`ColorTable::reset`] before use.
    pub const fn new() -> Self {
        Self {
            entries: [ColorVector::EMPTY; MAX_VTOOLS],
        }
    }

    /// Give every virtual tool a pure filament
    ///
    /// Tool `t < feeders` is pure feeder `t`; the remaining tools are pure
    /// feeder 0.
    pub fn reset(&mut self, feeders: usize) {
        for (t, entry) in self.entries.iter_mut().enumerate() {
            *entry = if t < feeders {
                ColorVector::pure(t)
            } else {
                ColorVector::pure(0)
            };
        }
    }

    /// Get the entry of a virtual tool
    pub fn get(&self, vtool: usize) -> Option<&ColorVector> {
        self.entries.get(vtool)
    }

    /// Replace the entry of a virtual tool
    pub fn set(&mut self, vtool: usize, color: ColorVector) -> Result<(), MixerError> {
        let slot = self
            .entries
            .get_mut(vtool)
            .ok_or(MixerError::VirtualToolOutOfRange)?;
        *slot = color;
        Ok(())
    }

    /// All entries
    pub fn entries(&self) -> &[ColorVector; MAX_VTOOLS] {
        &self.entries
    }
}
