//! # strata-object
//!
//! Object manager for Strata.
//!
//! Objects are variable-length byte strings stored in the slotted pages of a
//! file. A file is a chain of pages described by an entry on a catalog page;
//! each file also keeps a free-space directory of its pages that still have
//! room. This crate provides:
//!
//! - **Create**: place an object on a page near a hint, from the free-space
//!   directory, or on a new page
//! - **Destroy**: remove an object and unlink pages that become empty
//! - **Read**: fetch an object's header or a window of its payload
//! - **Scan**: step forward and backward through a file in page-chain order
//! - **Verify**: check the page chain and free-space directory of a file

#![warn(missing_docs)]
#![warn(clippy::all)]

/// File catalog
pub mod catalog;

/// Object creation
pub mod create;

/// Deferred page deallocation
pub mod dealloc;

/// Object destruction
pub mod destroy;

/// Error types
pub mod error;

/// Page chain of a file
pub mod file_map;

/// Object manager
pub mod manager;

/// Object reads
pub mod read;

/// Scan cursor
pub mod scan;

/// Free-space directory
pub mod space_list;

/// Structural checks
pub mod verify;

pub use catalog::{CatalogRef, FileEntry};
pub use create::ObjectSpec;
pub use dealloc::{DeallocEntry, DeallocList};
pub use error::{ObjectError, ObjectResult};
pub use manager::{ObjectManager, PageStats, DEFAULT_VOLUME};
pub use scan::ScanItem;
pub use verify::VerifyReport;
