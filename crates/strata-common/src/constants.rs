//! System-wide constants for Strata.

// =============================================================================
// Page Constants
// =============================================================================

/// Default page size in bytes (8 KB).
pub const DEFAULT_PAGE_SIZE: usize = 8 * 1024;

/// Minimum page size in bytes (1 KB).
pub const MIN_PAGE_SIZE: usize = 1024;

/// Maximum page size in bytes (64 KB).
///
/// Offsets inside a page are stored as 16-bit values, so the data area must
/// stay below 64 KB.
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Magic number for page header validation.
pub const PAGE_MAGIC: u16 = 0x5354; // "ST" in ASCII

/// Object payloads are padded to a multiple of this many bytes.
pub const OBJECT_ALIGNMENT: usize = 4;

// =============================================================================
// Free-Space Directory Constants
// =============================================================================

/// Number of free-space buckets kept per file.
pub const SPACE_LIST_BUCKETS: usize = 5;

/// Minimum contiguous free space of bucket `i`, in tenths of the data area.
///
/// Bucket 0 guarantees 10% of the data area, bucket 4 guarantees 50%.
pub const SPACE_LIST_TENTHS: [usize; SPACE_LIST_BUCKETS] = [1, 2, 3, 4, 5];

// =============================================================================
// Allocation Constants
// =============================================================================

/// Default number of pages per extent.
pub const DEFAULT_EXTENT_SIZE: u32 = 16;

/// Default number of pages in a volume.
pub const DEFAULT_VOLUME_PAGES: u32 = 64 * 1024;

/// Default extent fill factor, in percent.
pub const DEFAULT_FILL_FACTOR: u8 = 100;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_FRAMES: usize = 1024;

/// Minimum number of frames in the buffer pool.
///
/// Creating an object can pin the catalog page, the destination page, its
/// chain neighbor, and a space-list neighbor at the same time.
pub const MIN_BUFFER_FRAMES: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_constants() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert!(MIN_PAGE_SIZE.is_power_of_two());
        assert!(MAX_PAGE_SIZE.is_power_of_two());
        assert!(MIN_PAGE_SIZE <= DEFAULT_PAGE_SIZE && DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
    }

    #[test]
    fn test_space_list_thresholds_ascend() {
        assert!(SPACE_LIST_TENTHS.windows(2).all(|w| w[0] < w[1]));
        assert!(SPACE_LIST_TENTHS[SPACE_LIST_BUCKETS - 1] <= 10);
    }
}
