//! Allocator errors.

use strata_common::error::StrataError;
use strata_common::types::{PageId, VolumeId};
use thiserror::Error;

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors that can occur while allocating or freeing pages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum AllocError {
    /// No extent of the volume can take the requested pages.
    #[error("volume {volume} is full")]
    VolumeFull { volume: VolumeId },

    /// Volume was never registered with the allocator.
    #[error("unknown volume {volume}")]
    UnknownVolume { volume: VolumeId },

    /// Volume is already registered.
    #[error("volume {volume} already exists")]
    VolumeExists { volume: VolumeId },

    /// Page lies past the end of its volume.
    #[error("page {page_id} is out of range")]
    OutOfRange { page_id: PageId },

    /// Page is not allocated.
    #[error("page {page_id} is not allocated")]
    NotAllocated { page_id: PageId },

    /// Fill factor outside 1..=100.
    #[error("invalid fill factor {fill_factor}")]
    BadFillFactor { fill_factor: u8 },
}

impl From<AllocError> for StrataError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::VolumeFull { volume } => StrataError::OutOfSpace { volume },
            AllocError::BadFillFactor { .. } => StrataError::invalid_argument(err.to_string()),
            AllocError::NotAllocated { .. } => StrataError::corruption(err.to_string()),
            other => StrataError::internal(other.to_string()),
        }
    }
}
