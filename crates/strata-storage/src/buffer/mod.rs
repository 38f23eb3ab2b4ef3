//! Buffer pool for Strata pages.
//!
//! The buffer pool keeps a fixed number of page frames in memory in front
//! of a [`PageStore`](crate::store::PageStore):
//!
//! - **Page Caching**: keep recently used pages in memory
//! - **Pin/Unpin**: a pinned page is never evicted; guards unpin on drop
//! - **Dirty Tracking**: modified pages are written back on eviction or flush
//! - **Eviction Policy**: clock algorithm for page replacement
//! - **Checksums**: stamped on write-back, verified on read
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BufferPool                               │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                    Page Table                             │  │
//! │  │              HashMap<PageId, FrameId>                     │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │                              ▼                                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Frame 0 │ Frame 1 │ Frame 2 │ ... │ Frame N              │  │
//! │  │  page_id, data[], dirty, pin_count, ref bit               │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │                              ▼                                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │          Clock Replacer          │      PageStore         │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_common::types::{PageId, PageNo, VolumeId};
//! use strata_storage::buffer::{BufferPool, BufferPoolConfig};
//! use strata_storage::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new(4096));
//! let pool = BufferPool::new(BufferPoolConfig::new(16).with_page_size(4096), store).unwrap();
//!
//! let page_id = PageId::new(VolumeId::new(1), PageNo::new(42));
//! {
//!     let mut guard = pool.new_page(page_id).unwrap();
//!     guard.data_mut()[100] = 1;
//! } // unpinned here
//!
//! let guard = pool.fetch_page(page_id).unwrap();
//! assert_eq!(guard.data()[100], 1);
//! ```

mod config;
mod error;
mod eviction;
mod frame;
mod guard;
mod pool;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use eviction::ClockReplacer;
pub use frame::{BufferFrame, FrameId};
pub use guard::{PageBytes, PageBytesMut, PageReadGuard, PageWriteGuard};
pub use pool::BufferPool;

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (required a store read).
    pub misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of dirty pages written back.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
