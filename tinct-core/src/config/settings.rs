//! Persisted mixer settings
//!
//! The color table and gradient survive power cycles. They are stored as
//! postcard binary data with a header and CRC for validation; the storage
//! backend itself is provided by the HAL.

use serde::{Deserialize, Serialize};

use super::types::{MAX_FEEDERS, MAX_VTOOLS};
use crate::mixer::{MixPercentages, MixerError};

/// Magic number to identify valid settings data
pub const SETTINGS_MAGIC: u32 = 0x4D49_5852; // "MIXR"

/// Current settings data version
pub const SETTINGS_VERSION: u8 = 1;

/// Upper bound of a serialized settings record
pub const MAX_SETTINGS_SIZE: usize = 256;

/// Settings persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Serialization failed
    Serialize,
    /// Deserialization failed
    Deserialize,
    /// Invalid magic or version
    InvalidFormat,
    /// CRC check failed
    CrcMismatch,
    /// Stored feeder or tool count differs from the running mixer
    ShapeMismatch,
    /// Stored colors or gradient are unusable
    Invalid(MixerError),
}

impl From<MixerError> for SettingsError {
    fn from(e: MixerError) -> Self {
        SettingsError::Invalid(e)
    }
}

/// Persisted gradient state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GradientSettings {
    pub enabled: bool,
    pub start_height: f32,
    pub end_height: f32,
    pub start_vtool: u8,
    pub end_vtool: u8,
    pub vtool: u8,
    pub start_mix: MixPercentages,
    pub end_mix: MixPercentages,
}

/// Complete mixer settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixerSettings {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Feeder count the record was written with
    pub feeders: u8,
    /// Virtual tool count the record was written with
    pub vtools: u8,
    /// Raw weights per virtual tool
    pub colors: [[u8; MAX_FEEDERS]; MAX_VTOOLS],
    /// Gradient state
    pub gradient: GradientSettings,
    /// CRC32 checksum (calculated over magic..gradient)
    pub crc: u32,
}

impl MixerSettings {
    /// Create an empty record for a mixer shape
    pub fn new(feeders: u8, vtools: u8) -> Self {
        Self {
            magic: SETTINGS_MAGIC,
            version: SETTINGS_VERSION,
            feeders,
            vtools,
            colors: [[0; MAX_FEEDERS]; MAX_VTOOLS],
            gradient: GradientSettings::default(),
            crc: 0,
        }
    }

    /// Check if the header is valid (magic and version match)
    pub fn is_valid(&self) -> bool {
        self.magic == SETTINGS_MAGIC && self.version == SETTINGS_VERSION
    }

    /// Calculate CRC32 over every field but the crc itself
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version, self.feeders, self.vtools]);

        for color in &self.colors {
            crc = crc32_update(crc, color);
        }

        let g = &self.gradient;
        crc = crc32_update(crc, &[g.enabled as u8]);
        crc = crc32_update(crc, &g.start_height.to_le_bytes());
        crc = crc32_update(crc, &g.end_height.to_le_bytes());
        crc = crc32_update(crc, &[g.start_vtool, g.end_vtool, g.vtool]);
        crc = crc32_update(crc, &g.start_mix);
        crc = crc32_update(crc, &g.end_mix);

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Serialize into a buffer, updating the CRC first
    ///
    /// Returns the used part of the buffer.
    pub fn encode<'b>(&mut self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], SettingsError> {
        self.update_crc();
        postcard::to_slice(self, buffer).map_err(|_| SettingsError::Serialize)
    }

    /// Deserialize and validate header and CRC
    pub fn decode(bytes: &[u8]) -> Result<Self, SettingsError> {
        let settings: MixerSettings =
            postcard::from_bytes(bytes).map_err(|_| SettingsError::Deserialize)?;

        if !settings.is_valid() {
            return Err(SettingsError::InvalidFormat);
        }
        if !settings.verify_crc() {
            return Err(SettingsError::CrcMismatch);
        }
        Ok(settings)
    }
}

/// Simple CRC32 update function (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MixerSettings {
        let mut s = MixerSettings::new(3, 4);
        s.colors[0] = [127, 0, 0, 0, 0, 0];
        s.colors[1] = [0, 127, 0, 0, 0, 0];
        s.colors[2] = [0, 0, 127, 0, 0, 0];
        s.colors[3] = [42, 127, 10, 0, 0, 0];
        s.gradient = GradientSettings {
            enabled: true,
            start_height: 0.2,
            end_height: 40.0,
            start_vtool: 0,
            end_vtool: 1,
            vtool: 3,
            start_mix: [100, 0, 0, 0, 0, 0],
            end_mix: [0, 100, 0, 0, 0, 0],
        };
        s
    }

    #[test]
    fn test_new_header_valid() {
        let s = MixerSettings::new(2, 2);
        assert!(s.is_valid());
        assert_eq!(s.magic, SETTINGS_MAGIC);
        assert_eq!(s.version, SETTINGS_VERSION);
    }

    #[test]
    fn test_crc_consistency() {
        let mut s = sample();
        s.update_crc();
        assert!(s.verify_crc());

        // Modify data without updating CRC
        s.colors[3][0] = 43;
        assert!(!s.verify_crc());
    }

    #[test]
    fn test_encode_decode() {
        let mut s = sample();
        let mut buffer = [0u8; MAX_SETTINGS_SIZE];
        let len = s.encode(&mut buffer).unwrap().len();
        assert!(len <= MAX_SETTINGS_SIZE);

        let decoded = MixerSettings::decode(&buffer[..len]).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn test_decode_detects_corruption() {
        let mut s = sample();
        let mut buffer = [0u8; MAX_SETTINGS_SIZE];
        let len = s.encode(&mut buffer).unwrap().len();

        // Flip a weight byte inside the color table
        let pos = buffer[..len].iter().position(|&b| b == 42).unwrap();
        buffer[pos] = 41;
        assert_eq!(
            MixerSettings::decode(&buffer[..len]),
            Err(SettingsError::CrcMismatch)
        );
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let mut s = sample();
        s.version = SETTINGS_VERSION + 1;
        let mut buffer = [0u8; MAX_SETTINGS_SIZE];
        let len = s.encode(&mut buffer).unwrap().len();
        assert_eq!(
            MixerSettings::decode(&buffer[..len]),
            Err(SettingsError::InvalidFormat)
        );
    }

    #[test]
    fn test_decode_garbage() {
        assert_eq!(
            MixerSettings::decode(&[0xFF; 4]),
            Err(SettingsError::Deserialize)
        );
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut s = sample();
        let mut buffer = [0u8; 8];
        assert_eq!(s.encode(&mut buffer), Err(SettingsError::Serialize));
    }
}
