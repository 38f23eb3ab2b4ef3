//! Buffer pool errors.

use strata_common::error::StrataError;
use strata_common::types::PageId;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// No free frames available for eviction.
    #[error("no free frames available, all pages are pinned")]
    NoFreeFrames,

    /// Page not found in buffer pool.
    #[error("page {page_id} not found in buffer pool")]
    PageNotFound { page_id: PageId },

    /// Page is already in the buffer pool.
    #[error("page {page_id} is already in buffer pool")]
    PageAlreadyExists { page_id: PageId },

    /// Page is pinned and cannot be dropped.
    #[error("page {page_id} is pinned")]
    PagePinned { page_id: PageId },

    /// Page store error during page read/write.
    #[error("page store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Checksum mismatch when reading page.
    #[error("checksum mismatch for page {page_id}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        page_id: PageId,
        expected: u32,
        actual: u32,
    },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames)
    }

    /// Returns true if this is a fatal error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}

impl From<BufferError> for StrataError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::NoFreeFrames => StrataError::BufferPoolFull,
            BufferError::PageNotFound { page_id } => StrataError::PageNotFound { page_id },
            BufferError::ChecksumMismatch {
                page_id,
                expected,
                actual,
            } => StrataError::ChecksumMismatch {
                page_id,
                expected,
                actual,
            },
            BufferError::Store(StoreError::Io { source }) => StrataError::Io { source },
            BufferError::Config { message } => StrataError::InvalidConfig { message },
            other => StrataError::internal(other.to_string()),
        }
    }
}
