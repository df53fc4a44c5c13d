//! Working proportions and the normalizer
//!
//! The collector is the human-facing side of a mix: a float proportion per
//! feeder, edited freely (for example from a live mix dial) and only
//! committed to the fixed-point color table on request.

use super::error::MixerError;
use super::table::ColorVector;
use crate::config::MAX_FEEDERS;

/// Floating-point proportion per feeder
///
/// Values are non-negative but not necessarily normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Collector {
    values: [f32; MAX_FEEDERS],
}

impl Collector {
    /// Create a zeroed collector
    pub const fn new() -> Self {
        Self {
            values: [0.0; MAX_FEEDERS],
        }
    }

    /// Get the proportion of one feeder
    #[inline]
    pub fn get(&self, feeder: usize) -> f32 {
        self.values.get(feeder).copied().unwrap_or(0.0)
    }

    /// All proportions, including unused trailing feeders
    #[inline]
    pub fn values(&self) -> &[f32; MAX_FEEDERS] {
        &self.values
    }

    /// Set the proportion of one feeder
    pub fn set(&mut self, feeder: usize, value: f32) -> Result<(), MixerError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MixerError::InvalidProportion);
        }
        let slot = self
            .values
            .get_mut(feeder)
            .ok_or(MixerError::FeederOutOfRange)?;
        *slot = value;
        Ok(())
    }

    /// Sum of all proportions
    pub fn sum(&self) -> f32 {
        self.values.iter().sum()
    }

    /// Convert to a color vector whose strongest feeder is at full weight
    pub fn to_color(&self) -> Result<ColorVector, MixerError> {
        ColorVector::from_proportions(&self.values)
    }

    /// Load proportions from a color vector, scaled so they sum to
    /// `proportion`
    ///
    /// The collector is untouched on error.
    pub fn load(&mut self, color: &ColorVector, proportion: f32) -> Result<(), MixerError> {
        if !proportion.is_finite() || proportion < 0.0 {
            return Err(MixerError::InvalidProportion);
        }
        let csum = color.sum();
        if csum == 0 {
            return Err(MixerError::DegenerateMix);
        }

        let inv_prop = proportion / csum as f32;
        for (slot, w) in self.values.iter_mut().zip(color.weights().iter()) {
            *slot = w.as_f32() * inv_prop;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::Weight;
    use proptest::prelude::*;

    #[test]
    fn test_set_validates_value() {
        let mut c = Collector::new();
        assert!(c.set(0, 1.5).is_ok());
        assert_eq!(c.get(0), 1.5);
        assert_eq!(c.set(1, -1.0), Err(MixerError::InvalidProportion));
        assert_eq!(c.set(1, f32::NAN), Err(MixerError::InvalidProportion));
        assert_eq!(c.set(MAX_FEEDERS, 1.0), Err(MixerError::FeederOutOfRange));
        assert_eq!(c.get(1), 0.0);
    }

    #[test]
    fn test_to_color_example() {
        let mut c = Collector::new();
        c.set(0, 10.0).unwrap();
        c.set(1, 30.0).unwrap();

        let color = c.to_color().unwrap();
        assert_eq!(color.weight(0).raw(), 42);
        assert_eq!(color.weight(1).raw(), 127);
    }

    #[test]
    fn test_to_color_all_zero() {
        assert_eq!(Collector::new().to_color(), Err(MixerError::DegenerateMix));
    }

    #[test]
    fn test_load_sums_to_proportion() {
        let mut c = Collector::new();
        let color = ColorVector::from_weights(&[Weight::MAX, Weight::MAX]);
        c.load(&color, 1.0).unwrap();
        assert!((c.get(0) - 0.5).abs() < 1e-6);
        assert!((c.get(1) - 0.5).abs() < 1e-6);

        c.load(&color, 4.0).unwrap();
        assert!((c.sum() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_load_degenerate_leaves_collector() {
        let mut c = Collector::new();
        c.set(0, 3.0).unwrap();

        assert_eq!(
            c.load(&ColorVector::EMPTY, 1.0),
            Err(MixerError::DegenerateMix)
        );
        assert_eq!(c.get(0), 3.0);
        assert!(c.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_load_rejects_bad_proportion() {
        let mut c = Collector::new();
        assert_eq!(
            c.load(&ColorVector::pure(0), f32::NAN),
            Err(MixerError::InvalidProportion)
        );
    }

    proptest! {
        #[test]
        fn prop_normalize_sets_max_weight(values in proptest::collection::vec(0.0f32..1000.0, 2..=MAX_FEEDERS)) {
            prop_assume!(values.iter().any(|&v| v > 0.0));
            let mut c = Collector::new();
            for (i, &v) in values.iter().enumerate() {
                c.set(i, v).unwrap();
            }

            let color = c.to_color().unwrap();
            prop_assert_eq!(color.max(), Weight::MAX);
        }

        #[test]
        fn prop_normalize_then_load_keeps_ratios(values in proptest::collection::vec(0.0f32..1000.0, 2..=MAX_FEEDERS)) {
            let cmax = values.iter().cloned().fold(0.0f32, f32::max);
            prop_assume!(cmax > 0.0);

            let mut c = Collector::new();
            for (i, &v) in values.iter().enumerate() {
                c.set(i, v).unwrap();
            }
            let color = c.to_color().unwrap();
            c.load(&color, 1.0).unwrap();

            let back_max = c.values().iter().cloned().fold(0.0f32, f32::max);
            prop_assert!(back_max > 0.0);
            let tolerance = 1.0 / Weight::MAX.as_f32();
            for (i, &v) in values.iter().enumerate() {
                let before = v / cmax;
                let after = c.get(i) / back_max;
                prop_assert!((before - after).abs() <= tolerance);
            }
        }
    }
}
