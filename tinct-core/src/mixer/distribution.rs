//! Per-step feeder distribution
//!
//! Decides, for every step pulse of the mixing extruder, which single
//! feeder advances. Each step every feeder earns its weight in its
//! accumulator and the fired feeder pays back `W = Σ weights`, so an
//! accumulator is the feeder's ideal count `n·w / W` minus its actual
//! count, scaled by `W`. Only feeders behind their ideal are eligible, and
//! of those the one whose next firing falls due soonest fires (Tijdeman's
//! chairman assignment). Every `W` steps each feeder fires exactly its
//! weight and the accumulators return to zero.
//!
//! On every prefix each feeder stays strictly within one step of its ideal
//! count, so any run of `W` steps fires each feeder within one step of its
//! weight. Shorter runs can deviate by more than one step once three or
//! more feeders have distinct weights; no schedule avoids that in general.
//!
//! This runs in the step-rate interrupt: integer arithmetic only, no
//! allocation, no waiting.

use super::snapshot::{MixSnapshot, PublishedMix};
use super::table::ColorVector;
use crate::config::MAX_FEEDERS;

/// Distribution state owned by the step-rate stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DistributionState {
    /// Ideal minus actual firings per feeder, in units of `1/W` step;
    /// sums to zero between steps
    accumulators: [i32; MAX_FEEDERS],
    /// Last feeder fired, -1 since the last reset
    cursor: i8,
}

impl Default for DistributionState {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionState {
    pub const fn new() -> Self {
        Self {
            accumulators: [0; MAX_FEEDERS],
            cursor: -1,
        }
    }

    /// Drop all accumulated error
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn accumulators(&self) -> &[i32; MAX_FEEDERS] {
        &self.accumulators
    }

    pub fn cursor(&self) -> i8 {
        self.cursor
    }
}

/// Step-rate consumer of the published mix
///
/// Latches a snapshot at each motion block boundary and keeps it for the
/// whole block.
#[derive(Debug, Clone)]
pub struct StepDistributor {
    state: DistributionState,
    latched: MixSnapshot,
    total: u16,
}

impl Default for StepDistributor {
    fn default() -> Self {
        Self::new()
    }
}

impl StepDistributor {
    /// Create a distributor with nothing latched
    pub const fn new() -> Self {
        Self {
            state: DistributionState::new(),
            latched: MixSnapshot::EMPTY,
            total: 0,
        }
    }

    /// Latch the published snapshot for the next motion block
    ///
    /// Returns true if the distribution state was reset because a new tool
    /// was selected since the last block.
    pub fn begin_block(&mut self, published: &PublishedMix) -> bool {
        self.latch(published.load())
    }

    /// Latch a snapshot directly
    ///
    /// A cycle in progress carries over only while the weights stay the
    /// same. Changed weights (a gradient step) start a new cycle without
    /// reporting a reset.
    pub fn latch(&mut self, snapshot: MixSnapshot) -> bool {
        let reset = snapshot.epoch != self.latched.epoch;
        if reset || snapshot.color != self.latched.color {
            self.state.reset();
        }
        self.total = snapshot.color.sum();
        self.latched = snapshot;
        reset
    }

    /// Pick the feeder for the next step pulse
    ///
    /// Returns None when the latched mix drives no feeder.
    pub fn next_feeder(&mut self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }

        let weights = self.latched.color.weights();
        for (acc, w) in self.state.accumulators.iter_mut().zip(weights.iter()) {
            *acc += w.raw() as i32;
        }

        let chosen = earliest_due(&self.latched.color, &self.state.accumulators, self.total)?;
        self.state.accumulators[chosen] -= self.total as i32;
        self.state.cursor = chosen as i8;
        Some(chosen as u8)
    }

    pub fn state(&self) -> &DistributionState {
        &self.state
    }

    /// Snapshot latched for the current block
    pub fn latched(&self) -> &MixSnapshot {
        &self.latched
    }
}

/// Among feeders behind their ideal count, pick the one whose next
/// firing is due first. Ties go to the lower feeder.
///
/// A feeder with accumulator `a` and weight `w` is due `(W - a) / w` steps
/// from now, so deadlines compare by cross-multiplying.
fn earliest_due(color: &ColorVector, accumulators: &[i32; MAX_FEEDERS], total: u16) -> Option<usize> {
    let total = total as i32;
    let mut best: Option<(usize, i32, i32)> = None;
    for (i, (w, &acc)) in color.weights().iter().zip(accumulators.iter()).enumerate() {
        let w = w.raw() as i32;
        if w == 0 || acc <= 0 {
            continue;
        }
        match best {
            Some((_, bw, bacc)) if (total - acc) * bw >= (total - bacc) * w => {}
            _ => best = Some((i, w, acc)),
        }
    }
    best.map(|(i, _, _)| i)
}
