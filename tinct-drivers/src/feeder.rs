//! Feeder step output
//!
//! Drives one step pin per feeder of a mixing nozzle. Every extruder step
//! is routed to exactly one feeder, chosen by a [`StepDistributor`] from
//! the mix published by the foreground mixer.

use embedded_hal::digital::OutputPin;
use heapless::Vec;
use tinct_core::config::MAX_FEEDERS;
use tinct_core::mixer::{PublishedMix, StepDistributor};

/// Feeder output errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeederError<E> {
    /// A step pin failed to switch
    Pin(E),
    /// The latched mix names a feeder with no pin
    NoPin(u8),
}

/// Step pins of a mixing nozzle
///
/// Runs in the step-rate context. Call [`FeederBank::begin_block`] at each
/// motion block boundary and [`FeederBank::step`] for every extruder step.
pub struct FeederBank<P> {
    pins: Vec<P, MAX_FEEDERS>,
    /// If true, a step pulse drives the pin LOW
    inverted: bool,
    distributor: StepDistributor,
    /// Feeder whose pin is currently in the active state
    active: Option<u8>,
}

impl<P: OutputPin> FeederBank<P> {
    /// Create a feeder bank with all pins idle
    ///
    /// # Arguments
    /// - `pins`: step pin per feeder, in feeder order
    /// - `inverted`: if true, pulses are active-low
    pub fn new(pins: Vec<P, MAX_FEEDERS>, inverted: bool) -> Result<Self, FeederError<P::Error>> {
        let mut bank = Self {
            pins,
            inverted,
            distributor: StepDistributor::new(),
            active: None,
        };
        for index in 0..bank.pins.len() {
            bank.set_pin(index as u8, false)?;
        }
        debug!("Feeder bank: {} step pins", bank.pins.len());
        Ok(bank)
    }

    /// Number of feeders with a pin
    pub fn feeders(&self) -> usize {
        self.pins.len()
    }

    /// Latch the published mix for the next motion block
    ///
    /// Returns true if the distribution restarted for a newly selected tool.
    pub fn begin_block(&mut self, published: &PublishedMix) -> bool {
        let reset = self.distributor.begin_block(published);
        if reset {
            trace!("Feeder bank: tool {} latched", self.distributor.latched().vtool);
        }
        reset
    }

    /// Raise the step pin of the next feeder
    ///
    /// Returns the feeder stepped, or None if the latched mix drives no
    /// feeder. The pin stays active until [`FeederBank::end_step`].
    pub fn start_step(&mut self) -> Result<Option<u8>, FeederError<P::Error>> {
        self.end_step()?;

        let Some(feeder) = self.distributor.next_feeder() else {
            return Ok(None);
        };
        self.set_pin(feeder, true)?;
        self.active = Some(feeder);
        Ok(Some(feeder))
    }

    /// Return the active step pin to idle
    pub fn end_step(&mut self) -> Result<(), FeederError<P::Error>> {
        if let Some(feeder) = self.active.take() {
            self.set_pin(feeder, false)?;
        }
        Ok(())
    }

    /// Emit one complete step pulse
    pub fn step(&mut self) -> Result<Option<u8>, FeederError<P::Error>> {
        let feeder = self.start_step()?;
        self.end_step()?;
        Ok(feeder)
    }

    /// Distributor state, for diagnostics
    pub fn distributor(&self) -> &StepDistributor {
        &self.distributor
    }

    fn set_pin(&mut self, feeder: u8, active: bool) -> Result<(), FeederError<P::Error>> {
        let pin = self
            .pins
            .get_mut(feeder as usize)
            .ok_or(FeederError::NoPin(feeder))?;
        let result = if active != self.inverted {
            pin.set_high()
        } else {
            pin.set_low()
        };
        result.map_err(FeederError::Pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use tinct_core::config::MixerConfig;
    use tinct_core::mixer::Mixer;

    /// Mock step pin counting rising edges
    struct MockPin {
        high: bool,
        pulses: u32,
    }

    impl MockPin {
        fn new() -> Self {
            Self {
                high: false,
                pulses: 0,
            }
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_high(&mut self) -> Result<(), Self::Error> {
            if !self.high {
                self.pulses += 1;
            }
            self.high = true;
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }
    }

    fn bank(feeders: usize, inverted: bool) -> FeederBank<MockPin> {
        let pins: Vec<MockPin, MAX_FEEDERS> = (0..feeders).map(|_| MockPin::new()).collect();
        FeederBank::new(pins, inverted).unwrap()
    }

    #[test]
    fn test_new_idles_pins() {
        let b = bank(3, false);
        assert_eq!(b.feeders(), 3);
        assert!(b.pins.iter().all(|p| !p.high));

        let b = bank(2, true);
        assert!(b.pins.iter().all(|p| p.high));
    }

    #[test]
    fn test_nothing_published() {
        let published = PublishedMix::new();
        let mut b = bank(2, false);
        b.begin_block(&published);
        assert_eq!(b.step(), Ok(None));
    }

    #[test]
    fn test_steps_follow_mix() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 2), &published).unwrap();
        mixer.set_collector(0, 10.0).unwrap();
        mixer.set_collector(1, 30.0).unwrap();
        mixer.normalize(0).unwrap();

        let mut b = bank(2, false);
        assert!(b.begin_block(&published));
        for _ in 0..169 {
            assert!(b.step().unwrap().is_some());
        }
        assert_eq!(b.pins[0].pulses, 42);
        assert_eq!(b.pins[1].pulses, 127);
        assert!(b.pins.iter().all(|p| !p.high));
    }

    #[test]
    fn test_split_pulse() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 2), &published).unwrap();
        mixer.select_vtool(1).unwrap();

        let mut b = bank(2, true);
        b.begin_block(&published);
        assert_eq!(b.start_step(), Ok(Some(1)));
        // Active-low pulse in progress
        assert!(!b.pins[1].high);
        b.end_step().unwrap();
        assert!(b.pins[1].high);
    }

    #[test]
    fn test_tool_change_resets_distribution() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 2), &published).unwrap();

        let mut b = bank(2, false);
        assert!(b.begin_block(&published));
        b.step().unwrap();
        assert!(!b.begin_block(&published));

        mixer.select_vtool(1).unwrap();
        assert!(b.begin_block(&published));
        assert_eq!(b.step(), Ok(Some(1)));
    }

    #[test]
    fn test_missing_pin() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(3, 3), &published).unwrap();
        mixer.select_vtool(2).unwrap();

        // Only two pins wired for a three-feeder mix
        let mut b = bank(2, false);
        b.begin_block(&published);
        assert_eq!(b.step(), Err(FeederError::NoPin(2)));
    }
}
