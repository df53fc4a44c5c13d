//! Fixed-point feeder weight
//!
//! Each feeder's share of a virtual tool is stored as a 7-bit unsigned
//! weight. The strongest feeder of a normalized tool always sits at
//! [`Weight::MAX`], which keeps the most resolution for the weaker feeders.

use serde::{Deserialize, Serialize};

/// Unsigned fixed-point weight in `[0, Weight::MAX]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Weight(u8);

impl Weight {
    /// Zero weight (feeder unused)
    pub const ZERO: Self = Self(0);

    /// Largest representable weight (the mask of a 7-bit weight)
    pub const MAX: Self = Self(0x7F);

    /// Create from a raw value, saturating at [`Weight::MAX`]
    #[inline]
    pub const fn saturating_from_raw(raw: u8) -> Self {
        if raw > Self::MAX.0 {
            Self::MAX
        } else {
            Self(raw)
        }
    }

    /// Create from a raw value, rejecting values above [`Weight::MAX`]
    #[inline]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        if raw > Self::MAX.0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Convert a float to the nearest weight
    ///
    /// Negative values and NaN map to zero, values above the maximum
    /// saturate.
    #[inline]
    pub fn from_f32_rounded(value: f32) -> Self {
        // NaN fails both comparisons and falls through to zero
        let rounded = libm::roundf(value);
        if rounded >= Self::MAX.0 as f32 {
            Self::MAX
        } else if rounded > 0.0 {
            Self(rounded as u8)
        } else {
            Self::ZERO
        }
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Get the value as a float for the normalizer paths
    #[inline]
    pub fn as_f32(self) -> f32 {
        self.0 as f32
    }

    /// Check if the weight is zero
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<Weight> for u8 {
    fn from(w: Weight) -> Self {
        w.0
    }
}
