//! Explicit configuration passed to every component at construction.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

/// Default block capacity: 60 MiB of payload.
pub const DEFAULT_CAPACITY:   u64   = 60 * 1024 * 1024;
/// Default checksum / copy chunk size: 32 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Configuration for [`BeamPacker`](crate::archive::BeamPacker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackOptions {
    /// Maximum sum of payload bytes per block.  Header and metadata
    /// overhead are not counted.
    pub capacity:         u64,
    /// Buffer size for hashing and copying.
    pub chunk_size:       usize,
    /// Validate the block footer before extracting from it.
    pub verify_integrity: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            capacity:         DEFAULT_CAPACITY,
            chunk_size:       DEFAULT_CHUNK_SIZE,
            verify_integrity: true,
        }
    }
}

impl PackOptions {
    pub fn with_capacity(capacity: u64) -> Self {
        Self { capacity, ..Self::default() }
    }

    /// Load options from a JSON file.  Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(PackError::io(path))?;
        let opts: Self = serde_json::from_slice(&bytes)
            .map_err(|e| PackError::InvalidConfig(format!("{}: {e}", path.display())))?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PackError::InvalidConfig("capacity must be greater than zero".into()));
        }
        // Sizes and offsets are persisted as signed 64-bit integers.
        if self.capacity > i64::MAX as u64 {
            return Err(PackError::InvalidConfig(format!(
                "capacity {} exceeds the largest encodable size", self.capacity
            )));
        }
        if self.chunk_size == 0 {
            return Err(PackError::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        Ok(())
    }
}
