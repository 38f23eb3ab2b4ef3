//! Page checksum utilities.
//!
//! Uses CRC32 via `crc32fast`, which picks a hardware-accelerated
//! implementation when the CPU offers one.

/// Computes a CRC32 checksum for the given data.
///
/// # Example
///
/// ```rust
/// use strata_storage::page::compute_checksum;
///
/// let checksum = compute_checksum(b"Hello, Strata!");
/// assert_ne!(checksum, 0);
/// ```
#[inline]
#[must_use]
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Computes a checksum for a page, excluding the checksum field itself.
///
/// # Arguments
///
/// * `page_data` - The full page data
/// * `checksum_offset` - The offset of the 4-byte checksum field
#[must_use]
pub fn compute_page_checksum(page_data: &[u8], checksum_offset: usize) -> u32 {
    debug_assert!(checksum_offset + 4 <= page_data.len());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&page_data[..checksum_offset]);

    let after_checksum = checksum_offset + 4;
    if after_checksum < page_data.len() {
        hasher.update(&page_data[after_checksum..]);
    }

    hasher.finalize()
}
