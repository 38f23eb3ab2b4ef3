//! # strata-common
//!
//! Common types, errors, and configuration for Strata.
//!
//! This crate provides the foundational types shared by the storage and
//! object layers:
//!
//! - **Types**: page, file, and object identifiers
//! - **Errors**: a unified `StrataError` with stable error codes
//! - **Config**: storage configuration
//! - **Constants**: system-wide sizes and limits
//!
//! ## Example
//!
//! ```rust
//! use strata_common::types::{ObjectId, PageId, PageNo, SlotNo, Unique, VolumeId};
//!
//! let page = PageId::new(VolumeId::new(1), PageNo::new(42));
//! let oid = ObjectId::new(page, 3, Unique::new(7));
//! assert_eq!(oid.page_id(), page);
//! assert_eq!(oid.slot, 3 as SlotNo);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::StorageConfig;
pub use constants::*;
pub use error::{ErrorCode, StrataError, StrataResult};
pub use types::{ExtentNo, FileId, ObjectId, PageId, PageNo, SlotNo, Unique, VolumeId};
