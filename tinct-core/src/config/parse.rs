//! Simple TOML parser for mixer configuration
//!
//! A minimal line-oriented parser covering only what the mixer
//! configuration needs. It does NOT support the full TOML grammar.
//!
//! Supported features:
//! - Key = value pairs (integer, float, boolean, flat integer arrays)
//! - [mixer], [gradient] and [vtool.N] section headers
//! - Comments (# ...)
//!
//! ```text
//! [mixer]
//! feeders = 3
//! vtools = 8
//!
//! [gradient]
//! enabled = true
//! start_height = 0.2
//! end_height = 40.0
//! start_vtool = 0
//! end_vtool = 1
//! vtool = 7
//!
//! [vtool.3]
//! mix = [50, 25, 25]
//! ```

use super::types::{GradientConfig, MixerConfig, VtoolPreset, MAX_FEEDERS};
use crate::mixer::MixPercentages;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid section header
    InvalidSection,
    /// Invalid value type
    InvalidValue,
    /// Too many items (exceeded heapless capacity)
    TooManyItems,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Mixer,
    Gradient,
    Vtool(u8),
}

/// Parse TOML text into a MixerConfig
///
/// Counts are not validated here; see [`MixerConfig::validate`].
pub fn parse_config(input: &str) -> Result<MixerConfig, ParseError> {
    let mut config = MixerConfig::default();
    let mut section = Section::Root;
    let mut current_preset: Option<VtoolPreset> = None;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            save_preset(&mut config, &mut current_preset)?;

            section = parse_section_header(&line[1..line.len() - 1])?;
            match section {
                Section::Gradient => {
                    config.gradient.get_or_insert_with(GradientConfig::default);
                }
                Section::Vtool(vtool) => {
                    current_preset = Some(VtoolPreset {
                        vtool,
                        mix: [0; MAX_FEEDERS],
                    });
                }
                Section::Root | Section::Mixer => {}
            }
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut config, &mut current_preset)?;
        }
    }

    save_preset(&mut config, &mut current_preset)?;

    Ok(config)
}

/// Parse section header like "mixer", "gradient" or "vtool.3"
fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    let header = header.trim();

    if let Some((kind, index)) = header.split_once('.') {
        return match kind.trim() {
            "vtool" => {
                let index = index.trim().parse().map_err(|_| ParseError::InvalidSection)?;
                Ok(Section::Vtool(index))
            }
            _ => Err(ParseError::InvalidSection),
        };
    }

    match header {
        "mixer" => Ok(Section::Mixer),
        "gradient" => Ok(Section::Gradient),
        _ => Err(ParseError::InvalidSection),
    }
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();

    // Remove inline comments
    let value = match value.find('#') {
        Some(hash_pos) => value[..hash_pos].trim(),
        None => value.trim(),
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse a float value; plain integers are accepted
fn parse_float(value: &str) -> Result<f32, ParseError> {
    let v: f32 = value.parse().map_err(|_| ParseError::InvalidValue)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ParseError::InvalidValue)
    }
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse a mix array like "[50, 25, 25]"
fn parse_mix(value: &str) -> Result<MixPercentages, ParseError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ParseError::InvalidValue)?;

    let mut mix = [0u8; MAX_FEEDERS];
    let mut count = 0;
    for item in inner.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let slot = mix.get_mut(count).ok_or(ParseError::TooManyItems)?;
        *slot = parse_int(item)?;
        count += 1;
    }
    Ok(mix)
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut MixerConfig,
    current_preset: &mut Option<VtoolPreset>,
) -> Result<(), ParseError> {
    match section {
        Section::Mixer => match key {
            "feeders" => config.feeders = parse_int(value)?,
            "vtools" => config.vtools = parse_int(value)?,
            _ => {} // Ignore unknown keys
        },
        Section::Gradient => {
            let g = config.gradient.as_mut().ok_or(ParseError::InvalidSection)?;
            match key {
                "enabled" => g.enabled = parse_bool(value)?,
                "start_height" => g.start_height = parse_float(value)?,
                "end_height" => g.end_height = parse_float(value)?,
                "start_vtool" => g.start_vtool = parse_int(value)?,
                "end_vtool" => g.end_vtool = parse_int(value)?,
                "vtool" => g.vtool = Some(parse_int(value)?),
                _ => {}
            }
        }
        Section::Vtool(_) => {
            let p = current_preset.as_mut().ok_or(ParseError::InvalidSection)?;
            if key == "mix" {
                p.mix = parse_mix(value)?;
            }
        }
        Section::Root => {}
    }
    Ok(())
}

/// Push a finished [vtool.N] section into the config
fn save_preset(
    config: &mut MixerConfig,
    current_preset: &mut Option<VtoolPreset>,
) -> Result<(), ParseError> {
    if let Some(preset) = current_preset.take() {
        config
            .presets
            .push(preset)
            .map_err(|_| ParseError::TooManyItems)?;
    }
    Ok(())
}
