//! Published mix for the step-rate stage
//!
//! The foreground context builds a complete [`MixSnapshot`] and swaps it
//! into the [`PublishedMix`] slot inside a critical section. The step-rate
//! interrupt copies the whole snapshot out the same way, so it never sees a
//! half-written color vector and never waits on a lock held across a
//! computation.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::table::ColorVector;

/// Immutable view of the active mix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixSnapshot {
    /// Selected virtual tool
    pub vtool: u8,
    /// Weights of the selected tool at publish time
    pub color: ColorVector,
    /// Incremented on every tool selection; consumers reset their
    /// distribution state when it changes
    pub epoch: u16,
    /// Incremented on every publish
    pub revision: u32,
}

impl MixSnapshot {
    /// Placeholder before the first publish (drives no feeder)
    pub const EMPTY: Self = Self {
        vtool: 0,
        color: ColorVector::EMPTY,
        epoch: 0,
        revision: 0,
    };
}

impl Default for MixSnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Single published snapshot slot shared with the step-rate stage
///
/// Can live in a `static` so the interrupt handler reaches it without a
/// reference to the mixer.
pub struct PublishedMix {
    slot: Mutex<CriticalSectionRawMutex, Cell<MixSnapshot>>,
}

impl Default for PublishedMix {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishedMix {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(MixSnapshot::EMPTY)),
        }
    }

    /// Copy out the current snapshot
    pub fn load(&self) -> MixSnapshot {
        self.slot.lock(|cell| cell.get())
    }

    /// Revision of the current snapshot
    pub fn revision(&self) -> u32 {
        self.slot.lock(|cell| cell.get().revision)
    }

    /// Replace the snapshot with one derived from the current one
    ///
    /// The read and the write happen in one critical section.
    pub(crate) fn publish(&self, vtool: u8, color: ColorVector, new_selection: bool) -> MixSnapshot {
        self.slot.lock(|cell| {
            let prev = cell.get();
            let next = MixSnapshot {
                vtool,
                color,
                epoch: if new_selection {
                    prev.epoch.wrapping_add(1)
                } else {
                    prev.epoch
                },
                revision: prev.revision.wrapping_add(1),
            };
            cell.set(next);
            next
        })
    }
}
