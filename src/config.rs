//! Persisted module configuration.

use crate::storage::NvStorage;
use crate::MODULE_ID;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sampling period used when nothing valid is stored.
pub const DEFAULT_PERIOD_SECS: u8 = 1;

/// Exact size of the persisted record, in bytes.
pub const CONFIG_RECORD_SIZE: usize = 1;

/// Module configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Seconds between autonomous cycles; zero disables the timer
    pub sampling_period_secs: u8,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            sampling_period_secs: DEFAULT_PERIOD_SECS,
        }
    }
}

impl ModuleConfig {
    /// The sampling period, or `None` when autonomous sampling is off.
    pub fn period(&self) -> Option<Duration> {
        match self.sampling_period_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    /// Flat on-storage layout.
    pub fn to_record(&self) -> [u8; CONFIG_RECORD_SIZE] {
        [self.sampling_period_secs]
    }

    /// Decode a stored record. Anything but an exact-size record is rejected.
    pub fn from_record(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [period] => Some(Self {
                sampling_period_secs: *period,
            }),
            _ => None,
        }
    }
}

/// Owns the in-memory configuration and its backing storage.
pub struct ConfigStore {
    current: ModuleConfig,
    storage: Box<dyn NvStorage>,
}

impl ConfigStore {
    /// Wrap `storage` without reading it. Call [`ConfigStore::load`] next.
    pub fn new(storage: Box<dyn NvStorage>) -> Self {
        Self {
            current: ModuleConfig::default(),
            storage,
        }
    }

    /// Load the persisted record, falling back to defaults if it is absent,
    /// unreadable, or the wrong size.
    pub fn load(&mut self) -> ModuleConfig {
        let stored = match self.storage.read(MODULE_ID) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Could not read stored configuration: {}", e);
                None
            }
        };

        match stored.as_deref().and_then(ModuleConfig::from_record) {
            Some(config) => self.current = config,
            None => {
                tracing::debug!(
                    "No valid configuration record ({} bytes expected), using defaults",
                    CONFIG_RECORD_SIZE
                );
                self.reset_to_default();
            }
        }
        self.current
    }

    /// Restore the compiled defaults in memory. Does not persist.
    pub fn reset_to_default(&mut self) {
        self.current = ModuleConfig::default();
    }

    /// Write the current record. Failures are logged and not retried.
    pub fn save(&mut self) {
        if let Err(e) = self.storage.write(MODULE_ID, &self.current.to_record()) {
            tracing::warn!("Could not persist configuration: {}", e);
        }
    }

    pub fn current(&self) -> ModuleConfig {
        self.current
    }

    /// Update the period in memory and persist it.
    pub fn set_period(&mut self, secs: u8) {
        self.current.sampling_period_secs = secs;
        self.save();
    }
}
