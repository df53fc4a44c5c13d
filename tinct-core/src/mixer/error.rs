//! Mixer error types

/// Errors reported by mixer operations
///
/// Every failing operation leaves the mixer state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixerError {
    /// Virtual tool index not below the configured tool count
    VirtualToolOutOfRange,
    /// Feeder index not below the configured feeder count
    FeederOutOfRange,
    /// All-zero proportions or weights where a usable mix is required
    DegenerateMix,
    /// Proportion is negative or not finite
    InvalidProportion,
    /// Mix percentage above 100
    InvalidPercentage,
    /// Gradient end height not greater than start height
    InvalidGradientRange,
    /// Machine height is not a finite number
    InvalidHeight,
    /// Gradient target tool is one of its own endpoint tools
    GradientToolConflict,
}

impl MixerError {
    /// Check if this is an index range error
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            MixerError::VirtualToolOutOfRange | MixerError::FeederOutOfRange
        )
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MixerError::InvalidGradientRange | MixerError::GradientToolConflict
        )
    }
}
