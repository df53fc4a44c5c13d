//! Configuration types
//!
//! Mixer shape and boot presets parsed from TOML text, and the settings
//! record stored as postcard binary data.

pub mod parse;
pub mod settings;
pub mod types;

pub use parse::{parse_config, ParseError};
pub use settings::{GradientSettings, MixerSettings, SettingsError, MAX_SETTINGS_SIZE};
pub use types::*;
