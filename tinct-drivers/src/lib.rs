//! Hardware driver implementations
//!
//! Concrete consumers of the mixing engine in tinct-core:
//!
//! - Feeder step output (one step pin per feeder)
//! - Settings persistence over HAL flash storage

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod feeder;
pub mod store;

pub use feeder::{FeederBank, FeederError};
pub use store::{SettingsStore, StoreError};
