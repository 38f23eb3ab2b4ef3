//! Page store errors.

use std::io;
use std::path::PathBuf;

use strata_common::types::PageId;
use thiserror::Error;

/// Result type for page store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing page images.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum StoreError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Store directory could not be opened.
    #[error("cannot open page store at {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    /// Buffer does not match the store's page size.
    #[error("buffer of {actual} bytes does not match page size {expected}")]
    BadBufferSize { expected: usize, actual: usize },

    /// Page lies beyond the addressable range.
    #[error("page {page_id} is out of range")]
    OutOfRange { page_id: PageId },

    /// Injected or environment-specific failure.
    #[error("page store failure on {page_id}: {message}")]
    Failed { page_id: PageId, message: String },
}

impl StoreError {
    /// Creates a generic failure for `page_id`.
    pub fn failed(page_id: PageId, message: impl Into<String>) -> Self {
        Self::Failed {
            page_id,
            message: message.into(),
        }
    }
}
