//! # strata-storage
//!
//! Page-level storage for Strata.
//!
//! This crate provides everything below the object manager:
//!
//! - **Page**: the slotted-page layout, object headers, and compaction
//! - **Buffer**: a pin/unpin page cache with dirty tracking
//! - **Store**: in-memory and file-backed page stores
//! - **Alloc**: extent-based raw page allocation

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Raw page allocation
pub mod alloc;

/// Buffer pool
pub mod buffer;

/// Page layout and disk format
pub mod page;

/// Page stores
pub mod store;
