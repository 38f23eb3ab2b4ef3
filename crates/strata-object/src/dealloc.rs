//! Deferred page deallocation.
//!
//! Destroying the last object of a page unlinks the page from its file but
//! does not free it. The page is queued on a caller-owned [`DeallocList`]
//! and returned to the allocator when the caller releases the list.

use strata_common::types::PageId;
use strata_storage::alloc::ExtentAllocator;
use strata_storage::buffer::BufferPool;
use strata_storage::page::SlottedPage;
use tracing::debug;

use crate::error::{ObjectError, ObjectResult};

/// A page waiting to be freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeallocEntry {
    /// Head page of the file the page belonged to.
    pub physical_file: PageId,
    /// The page to free.
    pub page: PageId,
}

impl DeallocEntry {
    /// Creates an entry.
    pub const fn new(physical_file: PageId, page: PageId) -> Self {
        Self {
            physical_file,
            page,
        }
    }
}

/// Pages unlinked from their files and not yet freed.
#[derive(Debug, Default)]
pub struct DeallocList {
    entries: Vec<DeallocEntry>,
}

impl DeallocList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a page.
    pub fn push(&mut self, entry: DeallocEntry) {
        self.entries.push(entry);
    }

    /// Returns the number of queued pages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no page is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the queued pages in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &DeallocEntry> + '_ {
        self.entries.iter()
    }

    /// Retires every queued page and returns it to the allocator.
    ///
    /// Stops at the first failure and keeps that page and every page not yet
    /// freed queued, so the call can be retried.
    pub fn release(
        &mut self,
        pool: &BufferPool,
        allocator: &ExtentAllocator,
    ) -> ObjectResult<usize> {
        let mut released = 0;
        while let Some(entry) = self.entries.pop() {
            if let Err(err) = Self::free(pool, allocator, entry) {
                self.entries.push(entry);
                return Err(err);
            }
            released += 1;
        }

        if released > 0 {
            debug!("Released {} deallocated pages", released);
        }
        Ok(released)
    }

    /// Retires the page image, writes it out, and frees the page.
    ///
    /// The retired image keeps the page's tag counter, so objects created
    /// after the page is reused never repeat an old object's id.
    fn free(pool: &BufferPool, allocator: &ExtentAllocator, entry: DeallocEntry) -> ObjectResult<()> {
        {
            let mut guard = pool.fetch_page_for_write(entry.page)?;
            let mut data = guard.data_mut();
            SlottedPage::new(&mut data[..]).retire(entry.page);
        }
        pool.flush_page(entry.page)?;
        pool.discard_page(entry.page)?;
        allocator.free_page(entry.page).map_err(ObjectError::from)
    }
}
