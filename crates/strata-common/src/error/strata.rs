//! Unified error types.
//!
//! Every layer defines its own `thiserror` enum; those enums convert into
//! [`StrataError`] so callers can handle failures by [`ErrorCode`].

use std::fmt;
use thiserror::Error;

use crate::types::{ObjectId, PageId, VolumeId};

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Operation not supported.
    NotSupported = 0x0002,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,

    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,
    /// Data corruption detected.
    Corruption = 0x0101,

    // Storage errors (0x0200 - 0x02FF)
    /// Page not found in storage.
    PageNotFound = 0x0200,
    /// Page is corrupted.
    PageCorrupted = 0x0201,
    /// Buffer pool is full.
    BufferPoolFull = 0x0202,
    /// No free page left on a volume.
    OutOfSpace = 0x0203,

    // Object errors (0x0300 - 0x03FF)
    /// File reference is absent or invalid.
    BadCatalogObject = 0x0300,
    /// Length is negative or out of range.
    BadLength = 0x0301,
    /// Payload buffer missing.
    BadUserBuffer = 0x0302,
    /// Object too large for a slotted page.
    LargeObject = 0x0303,
    /// Object id is stale or invalid.
    BadObjectId = 0x0304,
    /// Read start offset out of range.
    BadStart = 0x0305,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Storage",
            0x03 => "Object",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for Strata.
///
/// # Example
///
/// ```rust
/// use strata_common::error::{ErrorCode, StrataError, StrataResult};
/// use strata_common::types::{PageId, PageNo, VolumeId};
///
/// fn read_page(page_id: PageId) -> StrataResult<Vec<u8>> {
///     Err(StrataError::PageNotFound { page_id })
/// }
///
/// let err = read_page(PageId::new(VolumeId::new(1), PageNo::new(3))).unwrap_err();
/// assert_eq!(err.code(), ErrorCode::PageNotFound);
/// ```
#[derive(Debug, Error)]
pub enum StrataError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Operation not supported.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Data corruption detected.
    #[error("data corruption detected: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch.
    #[error("checksum mismatch on page {page_id}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// The page that failed verification.
        page_id: PageId,
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    /// Page not found.
    #[error("page {page_id} not found")]
    PageNotFound {
        /// The missing page ID.
        page_id: PageId,
    },

    /// Page is corrupted.
    #[error("page {page_id} is corrupted: {reason}")]
    PageCorrupted {
        /// The corrupted page ID.
        page_id: PageId,
        /// Reason for corruption.
        reason: String,
    },

    /// Buffer pool is full.
    #[error("buffer pool is full, every frame is pinned")]
    BufferPoolFull,

    /// Volume has no free page left.
    #[error("volume {volume} has no free page")]
    OutOfSpace {
        /// The exhausted volume.
        volume: VolumeId,
    },

    // ==========================================================================
    // Object Errors
    // ==========================================================================
    /// File reference is absent or does not name a file.
    #[error("bad catalog object")]
    BadCatalogObject,

    /// Length is negative or out of range.
    #[error("bad length {length}")]
    BadLength {
        /// The rejected length.
        length: i64,
    },

    /// A positive length was given without a payload buffer.
    #[error("payload buffer missing for non-empty object")]
    BadUserBuffer,

    /// Object too large for a slotted page.
    #[error("object of {length} bytes exceeds the slotted-page limit of {threshold} bytes")]
    LargeObject {
        /// Aligned object length.
        length: usize,
        /// Largest aligned length a page accepts.
        threshold: usize,
    },

    /// Object id is stale or invalid.
    #[error("bad object id {oid}")]
    BadObjectId {
        /// The rejected object id.
        oid: ObjectId,
    },

    /// Read start offset out of range.
    #[error("bad start offset {start}")]
    BadStart {
        /// The rejected offset.
        start: usize,
    },
}

impl StrataError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::InvalidArgument { .. } | Self::InvalidConfig { .. } => {
                ErrorCode::InvalidArgument
            }
            Self::Io { .. } => ErrorCode::Io,
            Self::Corruption { .. } | Self::ChecksumMismatch { .. } => ErrorCode::Corruption,
            Self::PageNotFound { .. } => ErrorCode::PageNotFound,
            Self::PageCorrupted { .. } => ErrorCode::PageCorrupted,
            Self::BufferPoolFull => ErrorCode::BufferPoolFull,
            Self::OutOfSpace { .. } => ErrorCode::OutOfSpace,
            Self::BadCatalogObject => ErrorCode::BadCatalogObject,
            Self::BadLength { .. } => ErrorCode::BadLength,
            Self::BadUserBuffer => ErrorCode::BadUserBuffer,
            Self::LargeObject { .. } => ErrorCode::LargeObject,
            Self::BadObjectId { .. } => ErrorCode::BadObjectId,
            Self::BadStart { .. } => ErrorCode::BadStart,
        }
    }

    /// Returns true if the caller passed bad parameters.
    ///
    /// Parameter errors are detected before any page is touched.
    #[must_use]
    pub const fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::BadCatalogObject
                | Self::BadLength { .. }
                | Self::BadUserBuffer
                | Self::LargeObject { .. }
                | Self::BadStart { .. }
        )
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BufferPoolFull)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    #[must_use]
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
