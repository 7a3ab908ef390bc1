//! Non-volatile storage primitive for module configuration records.
//!
//! Records are addressed by a one-byte id and stored as opaque byte blobs.
//! The store never interprets the bytes; size checks belong to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Raw record storage, mirroring an NVRAM `read(id)` / `write(id, buf)` pair.
pub trait NvStorage: Send {
    /// Read the record stored under `id`, or `None` if nothing was ever written.
    fn read(&self, id: u8) -> Result<Option<Vec<u8>>, StorageError>;

    /// Overwrite the record stored under `id`.
    fn write(&mut self, id: u8, data: &[u8]) -> Result<(), StorageError>;
}

/// Storage errors.
#[derive(Debug)]
pub enum StorageError {
    IoError(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IoError(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Volatile in-memory storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: HashMap<u8, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing any size convention.
    pub fn with_record(mut self, id: u8, data: &[u8]) -> Self {
        self.records.insert(id, data.to_vec());
        self
    }
}

impl NvStorage for MemoryStorage {
    fn read(&self, id: u8) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.records.get(&id).cloned())
    }

    fn write(&mut self, id: u8, data: &[u8]) -> Result<(), StorageError> {
        self.records.insert(id, data.to_vec());
        Ok(())
    }
}

/// File-backed storage: one `<id>.bin` file per record.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a store rooted at `root`. The directory is created lazily on write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted in the platform's local data directory.
    pub fn default_location() -> Self {
        Self::new(default_data_dir().join("nvram"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: u8) -> PathBuf {
        self.root.join(format!("{id:03}.bin"))
    }
}

impl NvStorage for FileStorage {
    fn read(&self, id: u8) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(&path)
            .map(Some)
            .map_err(|e| StorageError::IoError(e.to_string()))
    }

    fn write(&mut self, id: u8, data: &[u8]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|e| StorageError::IoError(e.to_string()))?;
        std::fs::write(self.record_path(id), data).map_err(|e| StorageError::IoError(e.to_string()))
    }
}

/// Base directory for persisted agent data.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilt-sensor-agent")
}
