//! Configuration type definitions
//!
//! These types describe the mixing extruder: how many feeders it has, how
//! many virtual tools are addressable, and the mixes and gradient it boots
//! with.

use heapless::Vec;

use crate::mixer::{MixPercentages, MixerError};

/// Maximum physical feeders on one mixing nozzle
pub const MAX_FEEDERS: usize = 6;

/// Maximum virtual tools
pub const MAX_VTOOLS: usize = 16;

/// Minimum physical feeders for a mixing nozzle
pub const MIN_FEEDERS: usize = 2;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Feeder count outside `MIN_FEEDERS..=MAX_FEEDERS`
    InvalidFeederCount,
    /// Virtual tool count outside `1..=MAX_VTOOLS`
    InvalidVtoolCount,
    /// A preset or the gradient could not be applied
    Mixer(MixerError),
}

impl From<MixerError> for ConfigError {
    fn from(e: MixerError) -> Self {
        ConfigError::Mixer(e)
    }
}

/// Boot-time mix for one virtual tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VtoolPreset {
    /// Virtual tool index
    pub vtool: u8,
    /// Mix in percent per feeder
    pub mix: MixPercentages,
}

/// Boot-time gradient
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GradientConfig {
    /// Start blending immediately
    pub enabled: bool,
    /// Height where the start tool's mix ends
    pub start_height: f32,
    /// Height where the end tool's mix begins
    pub end_height: f32,
    /// Tool blended from
    pub start_vtool: u8,
    /// Tool blended into
    pub end_vtool: u8,
    /// Tool the blend is written into (last virtual tool if None)
    pub vtool: Option<u8>,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_height: 0.0,
            end_height: 0.0,
            start_vtool: 0,
            end_vtool: 1,
            vtool: None,
        }
    }
}

/// Mixing extruder configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixerConfig {
    /// Number of physical feeders
    pub feeders: u8,
    /// Number of virtual tools
    pub vtools: u8,
    /// Mixes applied on top of the pure-filament defaults
    pub presets: Vec<VtoolPreset, MAX_VTOOLS>,
    /// Gradient applied at boot
    pub gradient: Option<GradientConfig>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl MixerConfig {
    /// Create a configuration with no presets and no gradient
    pub const fn new(feeders: u8, vtools: u8) -> Self {
        Self {
            feeders,
            vtools,
            presets: Vec::new(),
            gradient: None,
        }
    }

    /// Check the feeder and tool counts
    ///
    /// Presets and the gradient are checked when the mixer applies them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let feeders = self.feeders as usize;
        if !(MIN_FEEDERS..=MAX_FEEDERS).contains(&feeders) {
            return Err(ConfigError::InvalidFeederCount);
        }
        let vtools = self.vtools as usize;
        if !(1..=MAX_VTOOLS).contains(&vtools) {
            return Err(ConfigError::InvalidVtoolCount);
        }
        Ok(())
    }

    /// Tool the gradient writes into by default
    pub fn default_gradient_vtool(&self) -> u8 {
        self.vtools.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MixerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_feeder_count_limits() {
        assert_eq!(
            MixerConfig::new(1, 4).validate(),
            Err(ConfigError::InvalidFeederCount)
        );
        assert_eq!(
            MixerConfig::new(MAX_FEEDERS as u8 + 1, 4).validate(),
            Err(ConfigError::InvalidFeederCount)
        );
        assert!(MixerConfig::new(MAX_FEEDERS as u8, 4).validate().is_ok());
    }

    #[test]
    fn test_vtool_count_limits() {
        assert_eq!(
            MixerConfig::new(2, 0).validate(),
            Err(ConfigError::InvalidVtoolCount)
        );
        assert_eq!(
            MixerConfig::new(2, MAX_VTOOLS as u8 + 1).validate(),
            Err(ConfigError::InvalidVtoolCount)
        );
        assert!(MixerConfig::new(2, MAX_VTOOLS as u8).validate().is_ok());
    }

    #[test]
    fn test_default_gradient_vtool_is_last() {
        assert_eq!(MixerConfig::new(3, 8).default_gradient_vtool(), 7);
    }
}
