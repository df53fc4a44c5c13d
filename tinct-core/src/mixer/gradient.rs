//! Height-driven gradient blending
//!
//! Between `start_height` and `end_height` every feeder's percentage is
//! interpolated on its own line from `start_mix` to `end_mix`. Outside the
//! range the blend plateaus at the nearest endpoint.

use serde::{Deserialize, Serialize};

use super::error::MixerError;
use super::table::MixPercentages;
use crate::config::{GradientSettings, MAX_FEEDERS};

/// Which end of the gradient a command refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GradientEnd {
    /// Blend at and below the start height
    Start,
    /// Blend at and above the end height
    End,
}

/// Gradient interpolator state
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gradient {
    enabled: bool,
    start_height: f32,
    end_height: f32,
    start_vtool: u8,
    end_vtool: u8,
    /// Virtual tool whose color entry the gradient drives
    vtool: u8,
    start_mix: MixPercentages,
    end_mix: MixPercentages,
    /// Last interpolated blend, in percent
    mix: [f32; MAX_FEEDERS],
    /// Last height seen, whether or not it was blended
    last_height: Option<f32>,
    /// Forces the next update to recompute even at the same height
    stale: bool,
}

impl Gradient {
    /// Create a disabled gradient
    ///
    /// Blends tool 0 into tool 1 and writes into `vtool`. The height range
    /// is empty until set.
    pub const fn new(vtool: u8) -> Self {
        Self {
            enabled: false,
            start_height: 0.0,
            end_height: 0.0,
            start_vtool: 0,
            end_vtool: 1,
            vtool,
            start_mix: [0; MAX_FEEDERS],
            end_mix: [0; MAX_FEEDERS],
            mix: [0.0; MAX_FEEDERS],
            last_height: None,
            stale: true,
        }
    }

    /// Check if gradient blending is active
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn start_height(&self) -> f32 {
        self.start_height
    }

    pub fn end_height(&self) -> f32 {
        self.end_height
    }

    pub fn start_vtool(&self) -> u8 {
        self.start_vtool
    }

    pub fn end_vtool(&self) -> u8 {
        self.end_vtool
    }

    /// Virtual tool the blend is written into
    pub fn vtool(&self) -> u8 {
        self.vtool
    }

    /// Endpoint mix in percent
    pub fn endpoint_mix(&self, end: GradientEnd) -> &MixPercentages {
        match end {
            GradientEnd::Start => &self.start_mix,
            GradientEnd::End => &self.end_mix,
        }
    }

    /// Last interpolated blend in percent
    pub fn mix(&self) -> &[f32; MAX_FEEDERS] {
        &self.mix
    }

    /// Last height seen by the gradient
    pub fn last_height(&self) -> Option<f32> {
        self.last_height
    }

    /// Set the height range
    ///
    /// The end height must be strictly above the start height.
    pub fn set_heights(&mut self, start: f32, end: f32) -> Result<(), MixerError> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(MixerError::InvalidGradientRange);
        }
        self.start_height = start;
        self.end_height = end;
        self.invalidate();
        Ok(())
    }

    /// Set the endpoint tools; the caller range-checks them
    pub(crate) fn set_endpoint_vtool(&mut self, end: GradientEnd, vtool: u8) {
        match end {
            GradientEnd::Start => self.start_vtool = vtool,
            GradientEnd::End => self.end_vtool = vtool,
        }
        self.invalidate();
    }

    /// Set the target tool; the caller range-checks it
    pub(crate) fn set_vtool(&mut self, vtool: u8) {
        self.vtool = vtool;
        self.invalidate();
    }

    /// Set an endpoint mix
    ///
    /// Each entry must be at most 100 and at least one must be non-zero.
    pub fn set_endpoint_mix(&mut self, end: GradientEnd, mix: MixPercentages) -> Result<(), MixerError> {
        validate_mix(&mix)?;
        match end {
            GradientEnd::Start => self.start_mix = mix,
            GradientEnd::End => self.end_mix = mix,
        }
        self.invalidate();
        Ok(())
    }

    /// Check that the gradient can be enabled
    pub fn validate(&self) -> Result<(), MixerError> {
        if !(self.end_height > self.start_height) {
            return Err(MixerError::InvalidGradientRange);
        }
        if self.vtool == self.start_vtool || self.vtool == self.end_vtool {
            return Err(MixerError::GradientToolConflict);
        }
        validate_mix(&self.start_mix)?;
        validate_mix(&self.end_mix)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.invalidate();
    }

    /// Force the next update to recompute
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Check if the blend at a height has to be recomputed
    pub fn needs_update(&self, height: f32) -> bool {
        self.stale || self.last_height != Some(height)
    }

    /// Remember a height without blending (gradient disabled)
    pub(crate) fn track(&mut self, height: f32) {
        self.last_height = Some(height);
    }

    /// Progress through the gradient at a height, clamped to `[0, 1]`
    pub fn progress(&self, height: f32) -> f32 {
        let slice = self.end_height - self.start_height;
        if !(slice > 0.0) {
            return 0.0;
        }
        ((height - self.start_height) / slice).clamp(0.0, 1.0)
    }

    /// Interpolated blend at a height, without touching the memo
    pub fn blend_at(&self, height: f32) -> [f32; MAX_FEEDERS] {
        let pct = self.progress(height);
        let mut mix = [0.0f32; MAX_FEEDERS];
        for (i, slot) in mix.iter_mut().enumerate() {
            let sm = self.start_mix[i] as f32;
            let em = self.end_mix[i] as f32;
            *slot = sm + (em - sm) * pct;
        }
        mix
    }

    /// Commit a recomputed blend
    pub(crate) fn record(&mut self, height: f32, mix: [f32; MAX_FEEDERS]) {
        self.last_height = Some(height);
        self.stale = false;
        self.mix = mix;
    }
}

impl Gradient {
    /// Rebuild a gradient from persisted settings
    ///
    /// An enabled gradient must pass [`Gradient::validate`]; a disabled one
    /// may still carry unset endpoints.
    pub fn from_settings(s: &GradientSettings) -> Result<Self, MixerError> {
        if !s.start_height.is_finite() || !s.end_height.is_finite() {
            return Err(MixerError::InvalidGradientRange);
        }
        if s.start_mix.iter().chain(s.end_mix.iter()).any(|&p| p > 100) {
            return Err(MixerError::InvalidPercentage);
        }

        let mut g = Self::new(s.vtool);
        g.start_height = s.start_height;
        g.end_height = s.end_height;
        g.start_vtool = s.start_vtool;
        g.end_vtool = s.end_vtool;
        g.start_mix = s.start_mix;
        g.end_mix = s.end_mix;
        if s.enabled {
            g.validate()?;
            g.enabled = true;
        }
        Ok(g)
    }

    /// Persisted view of the gradient
    pub fn to_settings(&self) -> GradientSettings {
        GradientSettings {
            enabled: self.enabled,
            start_height: self.start_height,
            end_height: self.end_height,
            start_vtool: self.start_vtool,
            end_vtool: self.end_vtool,
            vtool: self.vtool,
            start_mix: self.start_mix,
            end_mix: self.end_mix,
        }
    }
}

fn validate_mix(mix: &MixPercentages) -> Result<(), MixerError> {
    if mix.iter().any(|&p| p > 100) {
        return Err(MixerError::InvalidPercentage);
    }
    if mix.iter().all(|&p| p == 0) {
        return Err(MixerError::DegenerateMix);
    }
    Ok(())
}
