//! Inbound mixer commands
//!
//! The command layer parses its own grammar and hands the mixer one
//! [`MixerCommand`] at a time.

use crate::mixer::{GradientEnd, MixPercentages, Mixer, MixerError};

/// Operation requested by the command layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixerCommand {
    /// Make a virtual tool the active one
    SelectVtool(u8),
    /// Set one feeder's working proportion
    SetCollector { feeder: u8, proportion: f32 },
    /// Commit the working proportions into a tool
    Normalize { vtool: u8 },
    /// Load a tool's weights into the working proportions, summing to
    /// `proportion`
    RefreshCollector { vtool: u8, proportion: f32 },
    /// Restore every tool to its pure filament
    ResetVtools,
    SetGradientEnabled(bool),
    SetGradientHeights { start: f32, end: f32 },
    /// Set a gradient endpoint tool
    SetGradientTool { end: GradientEnd, vtool: u8 },
    /// Set the tool the gradient writes into
    SetGradientTarget(u8),
    /// Set a gradient endpoint mix in percent
    SetGradientMix { end: GradientEnd, mix: MixPercentages },
    /// Reload the gradient endpoints from their tools
    RefreshGradient,
}

impl Mixer<'_> {
    /// Apply one command
    pub fn apply(&mut self, cmd: MixerCommand) -> Result<(), MixerError> {
        trace!("Mixer command: {}", cmd);

        let result = match cmd {
            MixerCommand::SelectVtool(vtool) => self.select_vtool(vtool),
            MixerCommand::SetCollector { feeder, proportion } => {
                self.set_collector(feeder, proportion)
            }
            MixerCommand::Normalize { vtool } => self.normalize(vtool),
            MixerCommand::RefreshCollector { vtool, proportion } => {
                self.refresh_collector(proportion, vtool)
            }
            MixerCommand::ResetVtools => self.reset_vtools(),
            MixerCommand::SetGradientEnabled(enabled) => self.set_gradient_enabled(enabled),
            MixerCommand::SetGradientHeights { start, end } => {
                self.set_gradient_heights(start, end)
            }
            MixerCommand::SetGradientTool { end, vtool } => self.set_gradient_tool(end, vtool),
            MixerCommand::SetGradientTarget(vtool) => self.set_gradient_target(vtool),
            MixerCommand::SetGradientMix { end, mix } => self.set_gradient_mix(end, mix),
            MixerCommand::RefreshGradient => self.refresh_gradient(),
        };

        match result {
            // Bad indices come from the host and are routine
            Err(e) if e.is_range_error() => debug!("Mixer command {} out of range: {}", cmd, e),
            Err(e) if e.is_config_error() => {
                warn!("Mixer command {} leaves gradient unusable: {}", cmd, e)
            }
            Err(e) => warn!("Mixer command {} rejected: {}", cmd, e),
            Ok(()) => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MixerConfig, MAX_FEEDERS};
    use crate::mixer::{ColorVector, PublishedMix};

    #[test]
    fn test_edit_and_select_sequence() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 4), &published).unwrap();

        let commands = [
            MixerCommand::SetCollector {
                feeder: 0,
                proportion: 10.0,
            },
            MixerCommand::SetCollector {
                feeder: 1,
                proportion: 30.0,
            },
            MixerCommand::Normalize { vtool: 3 },
            MixerCommand::SelectVtool(3),
        ];
        for cmd in commands {
            mixer.apply(cmd).unwrap();
        }

        let snapshot = published.load();
        assert_eq!(snapshot.vtool, 3);
        assert_eq!(snapshot.color.weight(0).raw(), 42);
        assert_eq!(snapshot.color.weight(1).raw(), 127);
    }

    #[test]
    fn test_gradient_commands() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 3), &published).unwrap();

        let commands = [
            MixerCommand::SetGradientHeights {
                start: 0.0,
                end: 10.0,
            },
            MixerCommand::SetGradientTool {
                end: GradientEnd::Start,
                vtool: 1,
            },
            MixerCommand::SetGradientTool {
                end: GradientEnd::End,
                vtool: 0,
            },
            MixerCommand::SetGradientTarget(2),
            MixerCommand::SetGradientEnabled(true),
            MixerCommand::SelectVtool(2),
        ];
        for cmd in commands {
            mixer.apply(cmd).unwrap();
        }

        mixer.update_for_height(0.0).unwrap();
        assert_eq!(published.load().color, ColorVector::pure(1));
        mixer.update_for_height(10.0).unwrap();
        assert_eq!(published.load().color, ColorVector::pure(0));

        mixer.apply(MixerCommand::SetGradientEnabled(false)).unwrap();
        assert!(!mixer.gradient().is_enabled());
    }

    #[test]
    fn test_rejected_command_reports_error() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 2), &published).unwrap();

        assert_eq!(
            mixer.apply(MixerCommand::SelectVtool(2)),
            Err(MixerError::VirtualToolOutOfRange)
        );
        assert_eq!(
            mixer.apply(MixerCommand::RefreshCollector {
                vtool: 0,
                proportion: -1.0
            }),
            Err(MixerError::InvalidProportion)
        );
        assert_eq!(
            mixer.apply(MixerCommand::SetGradientMix {
                end: GradientEnd::Start,
                mix: [0; MAX_FEEDERS],
            }),
            Err(MixerError::DegenerateMix)
        );
        assert_eq!(
            mixer.apply(MixerCommand::SetGradientEnabled(true)),
            Err(MixerError::InvalidGradientRange)
        );
    }

    #[test]
    fn test_rejection_classes() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 3), &published).unwrap();

        let e = mixer
            .apply(MixerCommand::SetCollector {
                feeder: 2,
                proportion: 1.0,
            })
            .unwrap_err();
        assert!(e.is_range_error());
        assert!(!e.is_config_error());

        let e = mixer
            .apply(MixerCommand::SetGradientEnabled(true))
            .unwrap_err();
        assert_eq!(e, MixerError::InvalidGradientRange);
        assert!(e.is_config_error());

        let e = mixer
            .apply(MixerCommand::SetCollector {
                feeder: 0,
                proportion: f32::INFINITY,
            })
            .unwrap_err();
        assert!(!e.is_range_error());
        assert!(!e.is_config_error());
    }

    #[test]
    fn test_reset_command() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 2), &published).unwrap();
        mixer
            .apply(MixerCommand::SetCollector {
                feeder: 1,
                proportion: 1.0,
            })
            .unwrap();
        mixer.apply(MixerCommand::Normalize { vtool: 0 }).unwrap();
        assert_eq!(*mixer.color(0).unwrap(), ColorVector::pure(1));

        mixer.apply(MixerCommand::ResetVtools).unwrap();
        assert_eq!(*mixer.color(0).unwrap(), ColorVector::pure(0));
    }
}
