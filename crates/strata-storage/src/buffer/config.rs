//! Buffer pool configuration.

use strata_common::config::StorageConfig;
use strata_common::constants::{
    DEFAULT_BUFFER_FRAMES, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_BUFFER_FRAMES, MIN_PAGE_SIZE,
};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of page frames in the buffer pool.
    pub num_frames: usize,
    /// Page size in bytes.
    pub page_size: usize,
    /// Whether page checksums are verified when a page is read.
    pub verify_checksums: bool,
}

impl BufferPoolConfig {
    /// Creates a new configuration with the specified number of frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            page_size: DEFAULT_PAGE_SIZE,
            verify_checksums: true,
        }
    }

    /// Creates a configuration matching a storage configuration.
    pub fn from_storage_config(config: &StorageConfig) -> Self {
        Self::new(config.buffer_frames).with_page_size(config.page_size)
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enables or disables checksum verification on read.
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    /// Returns the total memory used by the buffer pool.
    pub fn memory_usage(&self) -> usize {
        self.num_frames * self.page_size
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.num_frames < MIN_BUFFER_FRAMES {
            return Err("num_frames is below the minimum pool size");
        }
        if !self.page_size.is_power_of_two() {
            return Err("page_size must be a power of 2");
        }
        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err("page_size is out of range");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_FRAMES)
    }
}
