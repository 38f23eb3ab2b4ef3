//! Storage configuration structures.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BUFFER_FRAMES, DEFAULT_EXTENT_SIZE, DEFAULT_FILL_FACTOR, DEFAULT_PAGE_SIZE,
    DEFAULT_VOLUME_PAGES, MAX_PAGE_SIZE, MIN_BUFFER_FRAMES, MIN_PAGE_SIZE,
};
use crate::error::{StrataError, StrataResult};

/// Storage configuration.
///
/// # Example
///
/// ```rust
/// use strata_common::config::StorageConfig;
///
/// let config = StorageConfig::default();
/// assert_eq!(config.page_size, 8192);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Size of each page in bytes. Must be a power of 2.
    /// Default: 8192 (8 KB)
    pub page_size: usize,

    /// Number of pages per extent.
    /// Default: 16
    pub extent_size: u32,

    /// Number of pages in each volume.
    /// Default: 65536
    pub volume_pages: u32,

    /// Percentage of each extent that new allocations may fill (1 - 100).
    /// Default: 100
    pub default_fill_factor: u8,

    /// Number of frames in the buffer pool.
    /// Default: 1024
    pub buffer_frames: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            extent_size: DEFAULT_EXTENT_SIZE,
            volume_pages: DEFAULT_VOLUME_PAGES,
            default_fill_factor: DEFAULT_FILL_FACTOR,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }
}

impl StorageConfig {
    /// Creates a small configuration for testing.
    ///
    /// Pages are 4 KB so multi-page files appear after a few inserts.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            page_size: 4096,
            extent_size: 8,
            volume_pages: 1024,
            default_fill_factor: DEFAULT_FILL_FACTOR,
            buffer_frames: 64,
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> StrataResult<()> {
        if !self.page_size.is_power_of_two() {
            return Err(StrataError::invalid_config("page_size must be a power of 2"));
        }

        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err(StrataError::invalid_config(format!(
                "page_size must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE} bytes"
            )));
        }

        if self.extent_size == 0 {
            return Err(StrataError::invalid_config("extent_size must be positive"));
        }

        if self.volume_pages < self.extent_size {
            return Err(StrataError::invalid_config(
                "volume_pages must hold at least one extent",
            ));
        }

        if self.default_fill_factor == 0 || self.default_fill_factor > 100 {
            return Err(StrataError::invalid_config(
                "default_fill_factor must be between 1 and 100",
            ));
        }

        if self.buffer_frames < MIN_BUFFER_FRAMES {
            return Err(StrataError::invalid_config(format!(
                "buffer_frames must be at least {MIN_BUFFER_FRAMES}"
            )));
        }

        Ok(())
    }
}
