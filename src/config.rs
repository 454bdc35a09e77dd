//! Configuration for stream readers and writers

use serde::{Deserialize, Serialize};

use crate::storage::{INDEX_CAPACITY, LIMIT_2GB};
use crate::{Result, StreamError};

/// Tunables of the container engine
///
/// The defaults reproduce the constants used by the camera SDK, so files
/// written with a default config are readable by other tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of frames between two sparse index entries
    pub index_increment: u32,
    /// A container file never grows to this many bytes
    pub size_limit: u64,
    /// Frames between two forced flushes to disk
    pub sync_interval: u32,
    /// Frame rate assumed when converting a time to a frame number
    pub assumed_frame_rate: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            index_increment: 50,
            size_limit: LIMIT_2GB,
            sync_interval: 16,
            assumed_frame_rate: 15,
        }
    }
}

impl StreamConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StreamError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| StreamError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if any value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.index_increment == 0 {
            return Err(StreamError::ConfigError(
                "index_increment must be > 0".to_string(),
            ));
        }

        // Offsets are stored as 32-bit values on disk
        if self.size_limit == 0 || self.size_limit > LIMIT_2GB {
            return Err(StreamError::ConfigError(format!(
                "size_limit must be in 1..={LIMIT_2GB:#x}, got {:#x}",
                self.size_limit
            )));
        }

        if self.sync_interval == 0 {
            return Err(StreamError::ConfigError(
                "sync_interval must be > 0".to_string(),
            ));
        }

        if self.assumed_frame_rate == 0 {
            return Err(StreamError::ConfigError(
                "assumed_frame_rate must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of frames a single file can index
    #[must_use]
    pub fn indexed_frames(&self) -> u64 {
        u64::from(self.index_increment) * INDEX_CAPACITY as u64
    }
}
