//! Page layout and disk format for Strata.
//!
//! All objects live in fixed-size slotted pages. A page holds a header, a
//! data area that grows forward from the end of the header, and a slot
//! array that grows backward from the end of the page.
//!
//! # Page Format
//!
//! ```text
//! +------------------+  0
//! |   Page Header    |  48 bytes
//! +------------------+  PAGE_HEADER_SIZE (data-area offset 0)
//! |   Object Data    |  grows upward: [obj hdr | payload | pad] ...
//! |        ↓         |
//! +------------------+  data-area offset `free`
//! |   Free Space     |
//! +------------------+
//! |        ↑         |
//! |   Slot Array     |  8 bytes per slot, slot 0 at the very end
//! +------------------+  page_size
//! ```
//!
//! Object offsets stored in slots are relative to the start of the data
//! area, so `offset + OBJECT_HEADER_SIZE + aligned(length) <= free` holds for
//! every live slot.

mod checksum;
mod compact;
mod header;
mod object;
mod slotted;
mod types;

pub use checksum::{compute_checksum, compute_page_checksum};
pub use header::{PageHeader, CHECKSUM_OFFSET, PAGE_HEADER_SIZE};
pub use object::{ObjectHeader, OBJECT_HEADER_SIZE};
pub use slotted::{Slot, SlottedPage, EMPTY_SLOT, SLOT_SIZE};
pub use types::PageType;

pub use strata_common::constants::{OBJECT_ALIGNMENT, PAGE_MAGIC};

/// Rounds `length` up to the next multiple of [`OBJECT_ALIGNMENT`].
///
/// # Example
///
/// ```rust
/// use strata_storage::page::aligned_length;
///
/// assert_eq!(aligned_length(0), 0);
/// assert_eq!(aligned_length(10), 12);
/// assert_eq!(aligned_length(12), 12);
/// ```
#[inline]
#[must_use]
pub const fn aligned_length(length: usize) -> usize {
    (length + OBJECT_ALIGNMENT - 1) & !(OBJECT_ALIGNMENT - 1)
}

/// Returns the size of the data area (everything after the header).
#[inline]
#[must_use]
pub const fn data_capacity(page_size: usize) -> usize {
    page_size - PAGE_HEADER_SIZE
}

/// Returns the bytes an object of aligned length `aligned` needs on a page:
/// its header, its payload, and one slot-array entry.
#[inline]
#[must_use]
pub const fn needed_space(aligned: usize) -> usize {
    OBJECT_HEADER_SIZE + aligned + SLOT_SIZE
}

/// Returns the largest aligned length a slotted page can store.
///
/// Longer objects belong to the large-object manager.
#[inline]
#[must_use]
pub const fn large_object_threshold(page_size: usize) -> usize {
    data_capacity(page_size) - OBJECT_HEADER_SIZE - SLOT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_length_law() {
        for length in 0..200 {
            let aligned = aligned_length(length);
            assert_eq!(aligned % OBJECT_ALIGNMENT, 0);
            assert!(aligned >= length);
            assert!(aligned - length < OBJECT_ALIGNMENT);
        }
    }

    #[test]
    fn test_page_geometry() {
        assert_eq!(data_capacity(4096), 4048);
        assert_eq!(needed_space(12), 28);
        assert_eq!(large_object_threshold(4096), 4032);
        assert_eq!(needed_space(large_object_threshold(4096)), data_capacity(4096));
    }
}
