//! Mixer persistence over HAL flash storage
//!
//! Stores the color table and gradient as a [`MixerSettings`] record and
//! reads the TOML configuration text. Missing or corrupt data falls back to
//! defaults so a machine always boots with a usable mixer.

use tinct_core::config::{
    parse_config, MixerConfig, MixerSettings, ParseError, SettingsError, MAX_SETTINGS_SIZE,
};
use tinct_core::Mixer;
use tinct_hal::flash::{FlashError, FlashStorage, StorageKey};

/// Maximum stored configuration text size
pub const MAX_CONFIG_TEXT_SIZE: usize = 1024;

/// Settings persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Flash operation failed
    Flash(FlashError),
    /// Stored record unusable
    Settings(SettingsError),
    /// Stored configuration text is not valid UTF-8
    Encoding,
    /// Stored configuration text failed to parse
    Parse(ParseError),
}

impl From<FlashError> for StoreError {
    fn from(e: FlashError) -> Self {
        StoreError::Flash(e)
    }
}

impl From<SettingsError> for StoreError {
    fn from(e: SettingsError) -> Self {
        StoreError::Settings(e)
    }
}

impl From<ParseError> for StoreError {
    fn from(e: ParseError) -> Self {
        StoreError::Parse(e)
    }
}

/// Mixer settings store
pub struct SettingsStore<F> {
    storage: F,
}

impl<F: FlashStorage> SettingsStore<F> {
    pub fn new(storage: F) -> Self {
        Self { storage }
    }

    /// Access the underlying storage
    pub fn storage_mut(&mut self) -> &mut F {
        &mut self.storage
    }

    /// Read and validate the stored settings record
    pub async fn load(&mut self) -> Result<MixerSettings, StoreError> {
        let mut buffer = [0u8; MAX_SETTINGS_SIZE];
        let len = self
            .storage
            .read(StorageKey::MixerSettings, &mut buffer)
            .await?;
        debug!("Read {} bytes of mixer settings from flash", len);

        let bytes = buffer.get(..len).ok_or(FlashError::BufferTooSmall)?;
        let settings = MixerSettings::decode(bytes).inspect_err(|e| {
            if *e == SettingsError::CrcMismatch {
                warn!("Mixer settings CRC mismatch");
            }
        })?;
        Ok(settings)
    }

    /// Restore the stored settings into a mixer
    ///
    /// Returns true if the mixer now holds the stored state. On any failure
    /// the mixer keeps its configured defaults.
    pub async fn load_into(&mut self, mixer: &mut Mixer<'_>) -> bool {
        let result = match self.load().await {
            Ok(settings) => mixer.restore(&settings).map_err(StoreError::Settings),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Loaded mixer settings from flash");
                true
            }
            Err(StoreError::Flash(FlashError::NotFound)) => {
                debug!("No mixer settings in flash, using defaults");
                false
            }
            Err(e) => {
                warn!("Failed to load mixer settings: {:?}, using defaults", e);
                false
            }
        }
    }

    /// Save the mixer's color table and gradient
    pub async fn save(&mut self, mixer: &Mixer<'_>) -> Result<(), StoreError> {
        let mut settings = mixer.settings();
        let mut buffer = [0u8; MAX_SETTINGS_SIZE];
        let bytes = settings.encode(&mut buffer)?;
        debug!("Saving {} bytes of mixer settings to flash", bytes.len());

        self.storage
            .write(StorageKey::MixerSettings, bytes)
            .await?;
        info!("Saved mixer settings to flash");
        Ok(())
    }

    /// Store configuration text for the next boot
    pub async fn save_config_text(&mut self, text: &str) -> Result<(), StoreError> {
        // Reject text the next boot could not use
        parse_config(text)?;
        self.storage
            .write(StorageKey::MixerConfigToml, text.as_bytes())
            .await?;
        info!("Saved mixer configuration ({} bytes)", text.len());
        Ok(())
    }

    /// Load the stored mixer configuration
    ///
    /// Falls back to [`MixerConfig::default`] when no usable text is stored.
    pub async fn load_config(&mut self) -> MixerConfig {
        match self.load_config_inner().await {
            Ok(config) => {
                info!(
                    "Loaded mixer configuration: {} feeders, {} virtual tools",
                    config.feeders,
                    config.vtools
                );
                config
            }
            Err(StoreError::Flash(FlashError::NotFound)) => {
                debug!("No mixer configuration in flash, using defaults");
                MixerConfig::default()
            }
            Err(e) => {
                warn!("Failed to load mixer configuration: {:?}, using defaults", e);
                MixerConfig::default()
            }
        }
    }

    async fn load_config_inner(&mut self) -> Result<MixerConfig, StoreError> {
        let mut buffer = [0u8; MAX_CONFIG_TEXT_SIZE];
        let len = self
            .storage
            .read(StorageKey::MixerConfigToml, &mut buffer)
            .await?;
        let bytes = buffer.get(..len).ok_or(FlashError::BufferTooSmall)?;
        let text = core::str::from_utf8(bytes).map_err(|_| StoreError::Encoding)?;
        Ok(parse_config(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use heapless::Vec;
    use tinct_core::mixer::{ColorVector, GradientEnd, PublishedMix};

    const SLOT_SIZE: usize = MAX_CONFIG_TEXT_SIZE;

    /// In-memory flash with one slot per key
    struct MockFlash {
        slots: [Option<Vec<u8, SLOT_SIZE>>; 2],
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                slots: [None, None],
            }
        }
    }

    impl FlashStorage for MockFlash {
        async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
            let data = self.slots[key.as_u8() as usize]
                .as_ref()
                .ok_or(FlashError::NotFound)?;
            let dest = buffer
                .get_mut(..data.len())
                .ok_or(FlashError::BufferTooSmall)?;
            dest.copy_from_slice(data);
            Ok(data.len())
        }

        async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
            let stored = Vec::from_slice(data).map_err(|_| FlashError::Full)?;
            self.slots[key.as_u8() as usize] = Some(stored);
            Ok(())
        }

        async fn exists(&mut self, key: StorageKey) -> bool {
            self.slots[key.as_u8() as usize].is_some()
        }

        async fn erase_all(&mut self) -> Result<(), FlashError> {
            self.slots = [None, None];
            Ok(())
        }
    }

    fn edited_mixer(published: &PublishedMix) -> Mixer<'_> {
        let mut mixer = Mixer::new(&MixerConfig::new(2, 3), published).unwrap();
        mixer.set_collector(0, 10.0).unwrap();
        mixer.set_collector(1, 30.0).unwrap();
        mixer.normalize(2).unwrap();
        mixer.set_gradient_heights(0.2, 40.0).unwrap();
        mixer
    }

    #[test]
    fn test_save_then_load_into() {
        let published = PublishedMix::new();
        let mixer = edited_mixer(&published);

        let mut store = SettingsStore::new(MockFlash::new());
        block_on(store.save(&mixer)).unwrap();
        assert!(block_on(store.storage_mut().exists(StorageKey::MixerSettings)));

        let other_slot = PublishedMix::new();
        let mut other = Mixer::new(&MixerConfig::new(2, 3), &other_slot).unwrap();
        assert!(block_on(store.load_into(&mut other)));
        assert_eq!(other.table(), mixer.table());
        assert_eq!(other.gradient().end_height(), 40.0);
    }

    #[test]
    fn test_load_missing_keeps_defaults() {
        let published = PublishedMix::new();
        let mut mixer = Mixer::new(&MixerConfig::new(2, 3), &published).unwrap();

        let mut store = SettingsStore::new(MockFlash::new());
        assert_eq!(
            block_on(store.load()),
            Err(StoreError::Flash(FlashError::NotFound))
        );
        assert!(!block_on(store.load_into(&mut mixer)));
        assert_eq!(*mixer.color(2).unwrap(), ColorVector::pure(0));
    }

    #[test]
    fn test_load_corrupt_record() {
        let published = PublishedMix::new();
        let mixer = edited_mixer(&published);

        let mut store = SettingsStore::new(MockFlash::new());
        block_on(store.save(&mixer)).unwrap();

        // Flip the last byte of the stored record (part of the CRC)
        let slot = store.storage_mut().slots[0].as_mut().unwrap();
        let last = slot.len() - 1;
        slot[last] ^= 0x01;

        assert_eq!(
            block_on(store.load()),
            Err(StoreError::Settings(SettingsError::CrcMismatch))
        );
    }

    #[test]
    fn test_load_into_rejects_other_shape() {
        let published = PublishedMix::new();
        let mixer = edited_mixer(&published);
        let mut store = SettingsStore::new(MockFlash::new());
        block_on(store.save(&mixer)).unwrap();

        let other_slot = PublishedMix::new();
        let mut other = Mixer::new(&MixerConfig::new(3, 3), &other_slot).unwrap();
        assert!(!block_on(store.load_into(&mut other)));
        assert_eq!(*other.color(2).unwrap(), ColorVector::pure(2));
    }

    #[test]
    fn test_config_text() {
        let mut store = SettingsStore::new(MockFlash::new());
        assert_eq!(block_on(store.load_config()), MixerConfig::default());

        let text = "[mixer]\nfeeders = 3\nvtools = 6\n\n[vtool.5]\nmix = [20, 30, 50]\n";
        block_on(store.save_config_text(text)).unwrap();

        let config = block_on(store.load_config());
        assert_eq!(config.feeders, 3);
        assert_eq!(config.vtools, 6);
        assert_eq!(config.presets.len(), 1);

        let published = PublishedMix::new();
        let mixer = Mixer::new(&config, &published).unwrap();
        let weights: Vec<u8, 3> = mixer
            .color(5)
            .unwrap()
            .weights()
            .iter()
            .take(3)
            .map(|w| w.raw())
            .collect();
        assert_eq!(weights.as_slice(), &[51, 76, 127]);
        assert_eq!(
            *mixer.gradient().endpoint_mix(GradientEnd::End),
            [0, 100, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_config_text_rejected() {
        let mut store = SettingsStore::new(MockFlash::new());
        assert_eq!(
            block_on(store.save_config_text("[mixer]\nfeeders = lots\n")),
            Err(StoreError::Parse(ParseError::InvalidValue))
        );
        assert!(!block_on(store.storage_mut().exists(StorageKey::MixerConfigToml)));
    }
}
