//! Raw page allocation.
//!
//! The allocator hands out pages of a volume in extents of
//! `extent_size` consecutive pages. It only tracks which pages are in use;
//! page contents belong to the buffer pool and the layers above it.

mod error;
mod extent;

pub use error::{AllocError, AllocResult};
pub use extent::ExtentAllocator;
