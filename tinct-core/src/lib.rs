//! Board-agnostic core logic for the mixing extruder firmware
//!
//! This crate contains all color mixing logic that does not depend on
//! specific hardware implementations:
//!
//! - Fixed-point color table for the virtual tools
//! - Normalizer between working proportions and stored weights
//! - Height-driven gradient blending
//! - Published snapshot and step distribution for the step-rate stage
//! - Configuration and persisted settings
//! - Command dispatch and collaborator traits

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod mixer;
pub mod traits;

pub use command::MixerCommand;
pub use mixer::{GradientEnd, Mixer, MixerError, MixSnapshot, PublishedMix, StepDistributor};
