//! Error handling for Strata.
//!
//! This module provides the unified error type and result alias that every
//! layer's error converts into.

mod strata;

pub use strata::{ErrorCode, StrataError};

/// Result type alias for Strata operations.
pub type StrataResult<T> = std::result::Result<T, StrataError>;
