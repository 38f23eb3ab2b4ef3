//! Error types for the object manager.
//!
//! Errors fall into three groups:
//!
//! - **Parameter errors** are detected before any page is pinned.
//! - **Lookup errors** leave every page unmodified.
//! - **Lower-layer errors** from the buffer pool or the allocator are
//!   passed through unchanged.
//!
//! Reaching the end of a scan is not an error; scans return `Ok(None)`.

use strata_common::error::StrataError;
use strata_common::types::{ObjectId, PageId};
use strata_storage::alloc::AllocError;
use strata_storage::buffer::BufferError;
use thiserror::Error;

/// Result type for object manager operations.
pub type ObjectResult<T> = Result<T, ObjectError>;

/// Errors that can occur in object manager operations.
#[derive(Debug, Error)]
pub enum ObjectError {
    // =========================================================================
    // Parameter errors
    // =========================================================================
    /// File reference does not name a live file.
    #[error("bad catalog object")]
    BadCatalogObject,

    /// Length is negative or outside the object.
    #[error("bad length {length}")]
    BadLength {
        /// The rejected length.
        length: i64,
    },

    /// Payload buffer missing or shorter than the object length.
    #[error("payload buffer missing or too short")]
    BadUserBuffer,

    /// Object belongs to the large-object manager.
    #[error("object of {length} bytes exceeds the slotted-page limit of {threshold} bytes")]
    LargeObjectUnsupported {
        /// Aligned object length.
        length: usize,
        /// Largest aligned length a page accepts.
        threshold: usize,
    },

    /// Read start lies past the end of the object.
    #[error("bad start offset {start}")]
    BadStart {
        /// The rejected offset.
        start: usize,
    },

    /// Storage configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    // =========================================================================
    // Lookup errors
    // =========================================================================
    /// Object id is stale or does not belong to the file.
    #[error("bad object id {oid}")]
    BadObjectId {
        /// The rejected object id.
        oid: ObjectId,
    },

    /// Page is not a data page of the file.
    #[error("page {page_id} is not a data page")]
    NotDataPage {
        /// The rejected page.
        page_id: PageId,
    },

    /// The catalog page has no free entry.
    #[error("catalog page {page_id} is full")]
    CatalogFull {
        /// The full catalog page.
        page_id: PageId,
    },

    // =========================================================================
    // Structural errors
    // =========================================================================
    /// A page or list violates the object layout.
    #[error("corrupted page {page_id}: {reason}")]
    Corrupted {
        /// The offending page.
        page_id: PageId,
        /// Description of the violation.
        reason: String,
    },

    // =========================================================================
    // Lower-layer errors
    // =========================================================================
    /// Buffer pool error.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Allocator error.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

impl ObjectError {
    /// Creates a corruption error.
    pub fn corrupted(page_id: PageId, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            page_id,
            reason: reason.into(),
        }
    }

    /// Returns true if the caller passed bad parameters.
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            Self::BadCatalogObject
                | Self::BadLength { .. }
                | Self::BadUserBuffer
                | Self::LargeObjectUnsupported { .. }
                | Self::BadStart { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Returns true if the error came from the buffer pool or allocator.
    pub fn is_lower_layer(&self) -> bool {
        matches!(self, Self::Buffer(_) | Self::Alloc(_))
    }
}

impl From<ObjectError> for StrataError {
    fn from(err: ObjectError) -> Self {
        match err {
            ObjectError::BadCatalogObject => StrataError::BadCatalogObject,
            ObjectError::BadLength { length } => StrataError::BadLength { length },
            ObjectError::BadUserBuffer => StrataError::BadUserBuffer,
            ObjectError::LargeObjectUnsupported { length, threshold } => {
                StrataError::LargeObject { length, threshold }
            }
            ObjectError::BadStart { start } => StrataError::BadStart { start },
            ObjectError::InvalidConfig { message } => StrataError::InvalidConfig { message },
            ObjectError::BadObjectId { oid } => StrataError::BadObjectId { oid },
            ObjectError::Corrupted { page_id, reason } => {
                StrataError::PageCorrupted { page_id, reason }
            }
            ObjectError::Buffer(err) => err.into(),
            ObjectError::Alloc(err) => err.into(),
            other => StrataError::internal(other.to_string()),
        }
    }
}
