//! Page stores.
//!
//! A [`PageStore`] persists fixed-size page images addressed by [`PageId`].
//! The buffer pool is the only component that talks to a store directly.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            PageStore Trait              │
//! │   (read_page, write_page, sync)         │
//! └─────────────────────────────────────────┘
//!              │                   │
//!              ▼                   ▼
//! ┌─────────────────────┐  ┌─────────────────────┐
//! │    MemoryStore      │  │     FileStore       │
//! │  (HashMap images)   │  │ (one file / volume) │
//! └─────────────────────┘  └─────────────────────┘
//! ```
//!
//! Pages that were never written read back as zeros in both stores.

mod error;
mod file;
mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

use strata_common::types::PageId;

/// Persistent storage for page images.
pub trait PageStore: Send + Sync {
    /// Returns the page size of this store.
    fn page_size(&self) -> usize;

    /// Reads the image of `page_id` into `buf`.
    ///
    /// `buf` must be exactly one page long.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()>;

    /// Writes `buf` as the image of `page_id`.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> StoreResult<()>;

    /// Makes all written pages durable.
    fn sync(&self) -> StoreResult<()>;
}

/// Checks that `len` is exactly one page.
pub(crate) fn check_buffer(page_size: usize, len: usize) -> StoreResult<()> {
    if len == page_size {
        Ok(())
    } else {
        Err(StoreError::BadBufferSize {
            expected: page_size,
            actual: len,
        })
    }
}
