//! Color mixing engine
//!
//! The [`Mixer`] owns the color table of every virtual tool, the working
//! proportion collector and the gradient. Every change to the selected
//! tool's weights is published as a complete [`MixSnapshot`] into a
//! [`PublishedMix`] slot that the step-rate stage reads through a
//! [`StepDistributor`].
//!
//! All operations run in the foreground context. A failing operation leaves
//! the mixer and the published snapshot untouched.

pub mod collector;
pub mod distribution;
pub mod error;
pub mod gradient;
pub mod snapshot;
pub mod table;
pub mod weight;

pub use collector::Collector;
pub use distribution::{DistributionState, StepDistributor};
pub use error::MixerError;
pub use gradient::{Gradient, GradientEnd};
pub use snapshot::{MixSnapshot, PublishedMix};
pub use table::{ColorTable, ColorVector, MixPercentages};
pub use weight::Weight;

use crate::config::{
    ConfigError, GradientConfig, MixerConfig, MixerSettings, SettingsError, VtoolPreset,
    MAX_FEEDERS,
};
use crate::traits::HeightSource;

/// Mixing extruder state
pub struct Mixer<'a> {
    feeders: u8,
    vtools: u8,
    table: ColorTable,
    collector: Collector,
    gradient: Gradient,
    selected: u8,
    published: &'a PublishedMix,
}

impl<'a> Mixer<'a> {
    /// Create a mixer from its configuration
    ///
    /// Every tool starts as a pure filament, then the presets and the
    /// gradient are applied. Tool 0 is selected and published.
    pub fn new(config: &MixerConfig, published: &'a PublishedMix) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut mixer = Self {
            feeders: config.feeders,
            vtools: config.vtools,
            table: ColorTable::new(),
            collector: Collector::new(),
            gradient: Gradient::new(config.default_gradient_vtool()),
            selected: 0,
            published,
        };
        mixer.table.reset(config.feeders as usize);
        mixer.reload_endpoints()?;

        for preset in &config.presets {
            mixer.apply_preset(preset)?;
        }
        if let Some(gradient) = &config.gradient {
            mixer.apply_gradient_config(gradient)?;
        }

        mixer.publish(true);
        info!(
            "Mixer ready: {} feeders, {} virtual tools",
            config.feeders,
            config.vtools
        );
        Ok(mixer)
    }

    /// Number of physical feeders
    pub fn feeders(&self) -> u8 {
        self.feeders
    }

    /// Number of virtual tools
    pub fn vtools(&self) -> u8 {
        self.vtools
    }

    /// Currently selected virtual tool
    pub fn selected_vtool(&self) -> u8 {
        self.selected
    }

    pub fn table(&self) -> &ColorTable {
        &self.table
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    /// Slot the step-rate stage reads from
    pub fn published(&self) -> &'a PublishedMix {
        self.published
    }

    /// Color vector of one virtual tool
    pub fn color(&self, vtool: u8) -> Result<&ColorVector, MixerError> {
        let index = self.check_vtool(vtool)?;
        self.table
            .get(index)
            .ok_or(MixerError::VirtualToolOutOfRange)
    }

    /// Give every virtual tool its pure filament again
    ///
    /// Gradient endpoints are reloaded from their tools.
    pub fn reset_vtools(&mut self) -> Result<(), MixerError> {
        let feeders = self.feeders as usize;
        self.with_gradient_rollback(|m| {
            m.table.reset(feeders);
            m.reload_endpoints()?;
            m.recompute_gradient()
        })?;
        self.publish(false);
        debug!("Mixer: virtual tools reset");
        Ok(())
    }

    /// Set one component of the working proportions
    pub fn set_collector(&mut self, feeder: u8, value: f32) -> Result<(), MixerError> {
        let index = self.check_feeder(feeder)?;
        self.collector.set(index, value)
    }

    /// Commit the working proportions into a virtual tool
    ///
    /// The strongest feeder lands exactly on [`Weight::MAX`].
    pub fn normalize(&mut self, vtool: u8) -> Result<(), MixerError> {
        let index = self.check_vtool(vtool)?;
        let color = self.collector.to_color()?;

        debug!(
            "Mixer: normalize tool {} from {} to {}",
            vtool,
            self.collector.values(),
            color.weights()
        );

        self.with_gradient_rollback(|m| {
            m.table.set(index, color)?;
            m.reload_endpoints_from(vtool)
        })?;

        if self.selected == vtool {
            self.publish(false);
        }
        Ok(())
    }

    /// Load a tool's weights back into the working proportions
    ///
    /// The proportions are scaled to sum to `proportion`.
    pub fn refresh_collector(&mut self, proportion: f32, vtool: u8) -> Result<(), MixerError> {
        let index = self.check_vtool(vtool)?;
        let color = self
            .table
            .get(index)
            .copied()
            .ok_or(MixerError::VirtualToolOutOfRange)?;
        self.collector.load(&color, proportion)?;

        debug!(
            "Mixer: tool {} loaded as {}",
            vtool,
            self.collector.values()
        );
        Ok(())
    }

    /// Select the active virtual tool
    ///
    /// Publishes the tool's weights under a new selection epoch, which makes
    /// the step-rate stage drop its accumulated distribution state.
    pub fn select_vtool(&mut self, vtool: u8) -> Result<(), MixerError> {
        self.check_vtool(vtool)?;
        self.selected = vtool;
        let snapshot = self.publish(true);
        debug!("Mixer: tool {} selected (epoch {})", vtool, snapshot.epoch);
        Ok(())
    }

    /// Percentage view of a virtual tool's weights
    pub fn mix_from_vtool(&self, vtool: u8) -> Result<MixPercentages, MixerError> {
        self.color(vtool)?.percentages()
    }

    /// Enable or disable gradient blending
    ///
    /// Enabling checks the height range, the tools and both endpoint mixes,
    /// then blends at the last known height.
    pub fn set_gradient_enabled(&mut self, enabled: bool) -> Result<(), MixerError> {
        if !enabled {
            self.gradient.set_enabled(false);
            debug!("Gradient disabled");
            return Ok(());
        }

        self.gradient.validate()?;
        self.with_gradient_rollback(|m| {
            m.gradient.set_enabled(true);
            m.recompute_gradient()
        })?;
        info!(
            "Gradient enabled: tool {} to {} over {}..{} mm into tool {}",
            self.gradient.start_vtool(),
            self.gradient.end_vtool(),
            self.gradient.start_height(),
            self.gradient.end_height(),
            self.gradient.vtool()
        );
        Ok(())
    }

    /// Set the gradient height range
    pub fn set_gradient_heights(&mut self, start: f32, end: f32) -> Result<(), MixerError> {
        self.with_gradient_rollback(|m| {
            m.gradient.set_heights(start, end)?;
            m.recompute_gradient()
        })
    }

    /// Set a gradient endpoint tool, loading its mix from the color table
    pub fn set_gradient_tool(&mut self, end: GradientEnd, vtool: u8) -> Result<(), MixerError> {
        self.check_vtool(vtool)?;
        if self.gradient.is_enabled() && vtool == self.gradient.vtool() {
            return Err(MixerError::GradientToolConflict);
        }
        let mix = self.mix_from_vtool(vtool)?;

        self.with_gradient_rollback(|m| {
            m.gradient.set_endpoint_mix(end, mix)?;
            m.gradient.set_endpoint_vtool(end, vtool);
            m.recompute_gradient()
        })
    }

    /// Set the virtual tool the gradient writes into
    pub fn set_gradient_target(&mut self, vtool: u8) -> Result<(), MixerError> {
        self.check_vtool(vtool)?;
        if self.gradient.is_enabled()
            && (vtool == self.gradient.start_vtool() || vtool == self.gradient.end_vtool())
        {
            return Err(MixerError::GradientToolConflict);
        }

        self.with_gradient_rollback(|m| {
            m.gradient.set_vtool(vtool);
            m.recompute_gradient()
        })
    }

    /// Set a gradient endpoint mix directly, in percent per feeder
    pub fn set_gradient_mix(&mut self, end: GradientEnd, mix: MixPercentages) -> Result<(), MixerError> {
        self.check_mix(&mix)?;
        self.with_gradient_rollback(|m| {
            m.gradient.set_endpoint_mix(end, mix)?;
            m.recompute_gradient()
        })
    }

    /// Reload the endpoint mixes from their tools and blend again at the
    /// last known height
    pub fn refresh_gradient(&mut self) -> Result<(), MixerError> {
        self.with_gradient_rollback(|m| {
            m.reload_endpoints()?;
            m.recompute_gradient()
        })
    }

    /// Blend the gradient for a machine height
    ///
    /// Returns true if the target tool's weights were recomputed. Repeating
    /// the last height is a no-op. While the gradient is disabled the height
    /// is only remembered.
    pub fn update_for_height(&mut self, height: f32) -> Result<bool, MixerError> {
        if !height.is_finite() {
            return Err(MixerError::InvalidHeight);
        }
        if !self.gradient.is_enabled() {
            self.gradient.track(height);
            return Ok(false);
        }
        if !self.gradient.needs_update(height) {
            return Ok(false);
        }

        let mix = self.gradient.blend_at(height);
        let color = ColorVector::from_proportions(&mix)?;
        let target = self.gradient.vtool();
        self.table.set(target as usize, color)?;
        self.gradient.record(height, mix);

        trace!("Gradient at {} mm: {}", height, color.weights());

        if self.selected == target {
            self.publish(false);
        }
        Ok(true)
    }

    /// Blend the gradient for the height reported by the motion layer
    pub fn update_for_current_position<H: HeightSource>(
        &mut self,
        source: &H,
    ) -> Result<bool, MixerError> {
        self.update_for_height(source.current_height())
    }

    /// Record of the color table and gradient for persistence
    pub fn settings(&self) -> MixerSettings {
        let mut settings = MixerSettings::new(self.feeders, self.vtools);
        for (slot, color) in settings.colors.iter_mut().zip(self.table.entries()) {
            for (raw, w) in slot.iter_mut().zip(color.weights()) {
                *raw = w.raw();
            }
        }
        settings.gradient = self.gradient.to_settings();
        settings.update_crc();
        settings
    }

    /// Replace the color table and gradient with a persisted record
    ///
    /// The record must match this mixer's feeder and tool counts. Nothing
    /// changes unless the whole record is usable.
    pub fn restore(&mut self, settings: &MixerSettings) -> Result<(), SettingsError> {
        if !settings.is_valid() {
            return Err(SettingsError::InvalidFormat);
        }
        if settings.feeders != self.feeders || settings.vtools != self.vtools {
            return Err(SettingsError::ShapeMismatch);
        }

        let mut table = ColorTable::new();
        table.reset(self.feeders as usize);
        for (t, raw) in settings.colors.iter().enumerate().take(self.vtools as usize) {
            let mut weights = [Weight::ZERO; MAX_FEEDERS];
            for (i, (slot, &r)) in weights.iter_mut().zip(raw.iter()).enumerate() {
                *slot = Weight::from_raw(r).ok_or(MixerError::InvalidProportion)?;
                if i >= self.feeders as usize && !slot.is_zero() {
                    return Err(MixerError::FeederOutOfRange.into());
                }
            }
            let color = ColorVector::from_weights(&weights);
            if color.is_degenerate() {
                return Err(MixerError::DegenerateMix.into());
            }
            table.set(t, color)?;
        }

        let gs = &settings.gradient;
        for vtool in [gs.start_vtool, gs.end_vtool, gs.vtool] {
            self.check_vtool(vtool)?;
        }
        self.check_mix(&gs.start_mix)?;
        self.check_mix(&gs.end_mix)?;
        let mut gradient = Gradient::from_settings(gs)?;
        if let Some(height) = self.gradient.last_height() {
            gradient.track(height);
        }

        let saved_table = core::mem::replace(&mut self.table, table);
        let saved_gradient = core::mem::replace(&mut self.gradient, gradient);
        if let Err(e) = self.recompute_gradient() {
            self.table = saved_table;
            self.gradient = saved_gradient;
            return Err(e.into());
        }

        self.publish(true);
        info!("Mixer settings restored");
        Ok(())
    }

    fn check_vtool(&self, vtool: u8) -> Result<usize, MixerError> {
        if vtool < self.vtools {
            Ok(vtool as usize)
        } else {
            Err(MixerError::VirtualToolOutOfRange)
        }
    }

    fn check_feeder(&self, feeder: u8) -> Result<usize, MixerError> {
        if feeder < self.feeders {
            Ok(feeder as usize)
        } else {
            Err(MixerError::FeederOutOfRange)
        }
    }

    /// Percentages may only name configured feeders
    fn check_mix(&self, mix: &MixPercentages) -> Result<(), MixerError> {
        if mix.iter().any(|&p| p > 100) {
            return Err(MixerError::InvalidPercentage);
        }
        if mix.iter().skip(self.feeders as usize).any(|&p| p != 0) {
            return Err(MixerError::FeederOutOfRange);
        }
        Ok(())
    }

    fn apply_preset(&mut self, preset: &VtoolPreset) -> Result<(), MixerError> {
        let index = self.check_vtool(preset.vtool)?;
        self.check_mix(&preset.mix)?;

        let mut proportions = [0.0f32; MAX_FEEDERS];
        for (p, &pct) in proportions.iter_mut().zip(preset.mix.iter()) {
            *p = pct as f32;
        }
        let color = ColorVector::from_proportions(&proportions)?;
        self.table.set(index, color)?;
        self.reload_endpoints_from(preset.vtool)
    }

    fn apply_gradient_config(&mut self, config: &GradientConfig) -> Result<(), MixerError> {
        let target = config.vtool.unwrap_or(self.gradient.vtool());
        self.set_gradient_target(target)?;
        self.set_gradient_tool(GradientEnd::Start, config.start_vtool)?;
        self.set_gradient_tool(GradientEnd::End, config.end_vtool)?;
        if config.enabled || config.end_height > config.start_height {
            self.set_gradient_heights(config.start_height, config.end_height)?;
        }
        if config.enabled {
            self.set_gradient_enabled(true)?;
        }
        Ok(())
    }

    /// Load both endpoint mixes from their tools
    ///
    /// Endpoints naming a tool beyond the configured count are left as is.
    fn reload_endpoints(&mut self) -> Result<(), MixerError> {
        for end in [GradientEnd::Start, GradientEnd::End] {
            let vtool = match end {
                GradientEnd::Start => self.gradient.start_vtool(),
                GradientEnd::End => self.gradient.end_vtool(),
            };
            if vtool < self.vtools {
                let mix = self.mix_from_vtool(vtool)?;
                self.gradient.set_endpoint_mix(end, mix)?;
            }
        }
        Ok(())
    }

    /// Reload endpoints after `vtool` was edited, then recompute
    fn reload_endpoints_from(&mut self, vtool: u8) -> Result<(), MixerError> {
        if vtool == self.gradient.start_vtool() || vtool == self.gradient.end_vtool() {
            self.reload_endpoints()?;
        }
        self.recompute_gradient()
    }

    /// Blend again at the last known height if the gradient is on
    fn recompute_gradient(&mut self) -> Result<(), MixerError> {
        if !self.gradient.is_enabled() {
            return Ok(());
        }
        self.gradient.invalidate();
        match self.gradient.last_height() {
            Some(height) => self.update_for_height(height).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Run a gradient edit, restoring table and gradient if it fails
    fn with_gradient_rollback<F>(&mut self, edit: F) -> Result<(), MixerError>
    where
        F: FnOnce(&mut Self) -> Result<(), MixerError>,
    {
        let saved_table = self.table.clone();
        let saved_gradient = self.gradient.clone();
        let before = self.published.revision();
        match edit(self) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.table = saved_table;
                self.gradient = saved_gradient;
                if self.published.revision() != before {
                    self.publish(false);
                }
                Err(e)
            }
        }
    }

    /// Publish the selected tool's weights
    fn publish(&self, new_selection: bool) -> MixSnapshot {
        let color = self
            .table
            .get(self.selected as usize)
            .copied()
            .unwrap_or(ColorVector::EMPTY);
        self.published.publish(self.selected, color, new_selection)
    }
}
