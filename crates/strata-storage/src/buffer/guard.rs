//! Pin guards.
//!
//! Fetching a page hands out a guard that owns one pin on its frame. The pin
//! is dropped with the guard, so an early `?` return can never leak it.
//!
//! A [`PageWriteGuard`] only records that the page was changed. The frame is
//! marked dirty when the guard is released, right before the pin goes away,
//! so a page is never unpinned with unpublished changes.
//!
//! Page bytes are borrowed through the frame's lock for as long as the
//! returned view lives. Hold one view at a time per page.

use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};
use strata_common::types::PageId;

use super::frame::BufferFrame;

/// Shared view of a pinned page's bytes.
pub type PageBytes<'a> = MappedRwLockReadGuard<'a, [u8]>;

/// Exclusive view of a pinned page's bytes.
pub type PageBytesMut<'a> = MappedRwLockWriteGuard<'a, [u8]>;

/// One pin on a frame, released on drop.
struct Pin {
    frame: Arc<BufferFrame>,
    page_id: PageId,
}

impl Pin {
    fn bytes(&self) -> PageBytes<'_> {
        RwLockReadGuard::map(self.frame.read_data(), |data| data.as_slice())
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

/// Pinned page opened for reading.
pub struct PageReadGuard {
    pin: Pin,
}

impl PageReadGuard {
    pub(crate) fn new(frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pin: Pin { frame, page_id },
        }
    }

    /// Returns the pinned page.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Borrows the page bytes.
    #[inline]
    pub fn data(&self) -> PageBytes<'_> {
        self.pin.bytes()
    }
}

impl std::fmt::Debug for PageReadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.pin.page_id)
            .finish()
    }
}

/// Pinned page opened for update.
///
/// Reading through [`data`](Self::data) leaves the page clean; borrowing
/// [`data_mut`](Self::data_mut) schedules it for write-back.
pub struct PageWriteGuard {
    pin: Pin,
    changed: bool,
}

impl PageWriteGuard {
    pub(crate) fn new(frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pin: Pin { frame, page_id },
            changed: false,
        }
    }

    /// Returns the pinned page.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Borrows the page bytes without changing them.
    #[inline]
    pub fn data(&self) -> PageBytes<'_> {
        self.pin.bytes()
    }

    /// Borrows the page bytes for update.
    #[inline]
    pub fn data_mut(&mut self) -> PageBytesMut<'_> {
        self.changed = true;
        RwLockWriteGuard::map(self.pin.frame.write_data(), |data| data.as_mut_slice())
    }

    /// Schedules the page for write-back without touching its bytes.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.changed = true;
    }

    /// Returns true if the page will be marked dirty on release.
    #[inline]
    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

impl Drop for PageWriteGuard {
    fn drop(&mut self) {
        // Runs before `pin` is dropped.
        if self.changed {
            self.pin.frame.set_dirty(true);
        }
    }
}

impl std::fmt::Debug for PageWriteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.pin.page_id)
            .field("changed", &self.changed)
            .finish()
    }
}
