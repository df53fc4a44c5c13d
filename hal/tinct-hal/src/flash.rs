//! Flash storage abstractions
//!
//! Persistent key-value storage implemented by board crates on top of their
//! flash memory.

use core::future::Future;

/// Storage keys for persisted data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Color table and gradient (binary postcard format)
    MixerSettings = 0,
    /// Mixer configuration as TOML text
    MixerConfigToml = 1,
}

impl StorageKey {
    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::MixerSettings),
            1 => Some(StorageKey::MixerConfigToml),
            _ => None,
        }
    }
}

/// Errors from flash storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash operation failed
    Flash,
    /// Storage operation failed
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Data corrupted or invalid
    Corrupted,
    /// Storage is full
    Full,
}

/// Flash storage trait
///
/// Wear-leveled key-value storage. Implementations handle wear leveling
/// and write atomicity; callers add their own integrity checks on top.
pub trait FlashStorage {
    /// Read a value by key into `buffer`
    ///
    /// Returns the number of bytes read.
    fn read(
        &mut self,
        key: StorageKey,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<usize, FlashError>>;

    /// Write a value by key, replacing any previous value
    fn write(&mut self, key: StorageKey, data: &[u8]) -> impl Future<Output = Result<(), FlashError>>;

    /// Check if a key exists in storage
    fn exists(&mut self, key: StorageKey) -> impl Future<Output = bool>;

    /// Erase all stored data
    fn erase_all(&mut self) -> impl Future<Output = Result<(), FlashError>>;
}

#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        let slot = buffer
            .first_mut()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        *slot = self.as_u8();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        let byte = buffer
            .first()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        StorageKey::from_u8(*byte)
            .map(|key| (key, 1))
            .ok_or(sequential_storage::map::SerializationError::InvalidFormat)
    }
}
