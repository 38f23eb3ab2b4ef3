//! Page header format.
//!
//! Every page in Strata starts with a 48-byte header.
//!
//! # Header Layout (48 bytes, little endian)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       2   magic (0x5354 = "ST")
//!   2       1   page_type
//!   3       1   space_bucket (free-space bucket the page is linked into, 0xFF = none)
//!   4       2   volume
//!   6       2   n_slots (slot-array entries, empty ones included)
//!   8       4   page_no
//!  12       4   file_id (owning file)
//!  16       4   prev_page (file page chain, 0xFFFFFFFF = none)
//!  20       4   next_page
//!  24       4   space_prev (free-space list links)
//!  28       4   space_next
//!  32       2   free (start of contiguous free space in the data area)
//!  34       2   unused (bytes held by holes before `free`)
//!  36       4   unique (next object tag to mint)
//!  40       4   checksum (CRC32 of the page, excluding this field)
//!  44       4   reserved
//! ```

use strata_common::types::{FileId, PageId, PageNo, Unique, VolumeId};

use super::checksum::compute_page_checksum;
use super::types::PageType;
use super::PAGE_MAGIC;

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 48;

/// Offset of the checksum field in the header.
pub const CHECKSUM_OFFSET: usize = 40;

/// Raw value of `space_bucket` for a page that is in no bucket.
const NO_BUCKET: u8 = 0xFF;

/// Page header view.
///
/// Wraps a whole page buffer and reads or writes the header fields at the
/// front of it. Read accessors need `T: AsRef<[u8]>`, setters additionally
/// need `T: AsMut<[u8]>`.
///
/// # Example
///
/// ```rust
/// use strata_common::types::{FileId, PageId, PageNo, VolumeId};
/// use strata_storage::page::{PageHeader, PageType};
///
/// let mut buffer = vec![0u8; 4096];
/// let page_id = PageId::new(VolumeId::new(1), PageNo::new(7));
/// let mut header = PageHeader::new(buffer.as_mut_slice());
///
/// header.initialize(page_id, FileId::new(3), PageType::Data);
/// assert_eq!(header.page_id(), page_id);
/// assert_eq!(header.next_page(), None);
/// ```
#[derive(Debug)]
pub struct PageHeader<T> {
    data: T,
}

#[inline]
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

impl<T: AsRef<[u8]>> PageHeader<T> {
    /// Creates a new header view over the given page buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than `PAGE_HEADER_SIZE`.
    #[inline]
    pub fn new(data: T) -> Self {
        assert!(
            data.as_ref().len() >= PAGE_HEADER_SIZE,
            "buffer too small for page header"
        );
        Self { data }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    // =========================================================================
    // Magic (offset 0, 2 bytes)
    // =========================================================================

    /// Returns the magic bytes.
    #[inline]
    pub fn magic(&self) -> u16 {
        read_u16(self.bytes(), 0)
    }

    /// Validates the magic bytes.
    #[inline]
    pub fn is_valid_magic(&self) -> bool {
        self.magic() == PAGE_MAGIC
    }

    // =========================================================================
    // Page Type / Space Bucket (offsets 2, 3)
    // =========================================================================

    /// Returns the page type.
    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.bytes()[2]).unwrap_or(PageType::Free)
    }

    /// Returns the free-space bucket the page is linked into.
    #[inline]
    pub fn space_bucket(&self) -> Option<usize> {
        match self.bytes()[3] {
            NO_BUCKET => None,
            bucket => Some(bucket as usize),
        }
    }

    // =========================================================================
    // Identity (offsets 4, 8, 12)
    // =========================================================================

    /// Returns the page ID recorded in the header.
    #[inline]
    pub fn page_id(&self) -> PageId {
        let volume = VolumeId::new(read_u16(self.bytes(), 4));
        let page_no = PageNo::from_raw(read_u32(self.bytes(), 8));
        PageId::new(volume, page_no.unwrap_or(PageNo::new(0)))
    }

    /// Returns the owning file.
    #[inline]
    pub fn file_id(&self) -> FileId {
        FileId::new(read_u32(self.bytes(), 12))
    }

    // =========================================================================
    // Slot Count (offset 6, 2 bytes)
    // =========================================================================

    /// Returns the number of slot-array entries.
    #[inline]
    pub fn n_slots(&self) -> u16 {
        read_u16(self.bytes(), 6)
    }

    // =========================================================================
    // Page Chain (offsets 16, 20)
    // =========================================================================

    /// Returns the previous page of the file.
    #[inline]
    pub fn prev_page(&self) -> Option<PageNo> {
        PageNo::from_raw(read_u32(self.bytes(), 16))
    }

    /// Returns the next page of the file.
    #[inline]
    pub fn next_page(&self) -> Option<PageNo> {
        PageNo::from_raw(read_u32(self.bytes(), 20))
    }

    // =========================================================================
    // Free-Space List (offsets 24, 28)
    // =========================================================================

    /// Returns the previous page in the free-space list.
    #[inline]
    pub fn space_prev(&self) -> Option<PageNo> {
        PageNo::from_raw(read_u32(self.bytes(), 24))
    }

    /// Returns the next page in the free-space list.
    #[inline]
    pub fn space_next(&self) -> Option<PageNo> {
        PageNo::from_raw(read_u32(self.bytes(), 28))
    }

    // =========================================================================
    // Space Accounting (offsets 32, 34)
    // =========================================================================

    /// Returns the start of contiguous free space within the data area.
    #[inline]
    pub fn free(&self) -> u16 {
        read_u16(self.bytes(), 32)
    }

    /// Returns the bytes held by reclaimed holes before `free`.
    #[inline]
    pub fn unused(&self) -> u16 {
        read_u16(self.bytes(), 34)
    }

    // =========================================================================
    // Unique Counter (offset 36, 4 bytes)
    // =========================================================================

    /// Returns the next tag to be minted on this page.
    #[inline]
    pub fn unique(&self) -> Unique {
        Unique::new(read_u32(self.bytes(), 36))
    }

    // =========================================================================
    // Checksum (offset 40, 4 bytes)
    // =========================================================================

    /// Returns the stored checksum.
    #[inline]
    pub fn checksum(&self) -> u32 {
        read_u32(self.bytes(), CHECKSUM_OFFSET)
    }

    /// Computes the checksum of the current page contents.
    #[inline]
    pub fn compute_checksum(&self) -> u32 {
        compute_page_checksum(self.bytes(), CHECKSUM_OFFSET)
    }

    /// Verifies the page checksum.
    pub fn verify_checksum(&self) -> bool {
        self.checksum() == self.compute_checksum()
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> PageHeader<T> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    #[inline]
    fn write_u16(&mut self, at: usize, value: u16) {
        self.bytes_mut()[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn write_u32(&mut self, at: usize, value: u32) {
        self.bytes_mut()[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Initializes a fresh page: identity set, no links, no slots.
    pub fn initialize(&mut self, page_id: PageId, file_id: FileId, page_type: PageType) {
        self.bytes_mut()[..PAGE_HEADER_SIZE].fill(0);
        self.write_u16(0, PAGE_MAGIC);
        self.set_page_type(page_type);
        self.set_space_bucket(None);
        self.write_u16(4, page_id.volume.as_u16());
        self.write_u32(8, page_id.page_no.as_u32());
        self.set_file_id(file_id);
        self.set_prev_page(None);
        self.set_next_page(None);
        self.set_space_prev(None);
        self.set_space_next(None);
    }

    /// Sets the page type.
    #[inline]
    pub fn set_page_type(&mut self, page_type: PageType) {
        self.bytes_mut()[2] = page_type as u8;
    }

    /// Records the free-space bucket the page is linked into.
    #[inline]
    pub fn set_space_bucket(&mut self, bucket: Option<usize>) {
        self.bytes_mut()[3] = bucket.map_or(NO_BUCKET, |b| {
            debug_assert!(b < NO_BUCKET as usize);
            b as u8
        });
    }

    /// Sets the owning file.
    #[inline]
    pub fn set_file_id(&mut self, file_id: FileId) {
        self.write_u32(12, file_id.as_u32());
    }

    /// Sets the number of slot-array entries.
    #[inline]
    pub fn set_n_slots(&mut self, n_slots: u16) {
        self.write_u16(6, n_slots);
    }

    /// Sets the previous page of the file.
    #[inline]
    pub fn set_prev_page(&mut self, page: Option<PageNo>) {
        self.write_u32(16, PageNo::to_raw(page));
    }

    /// Sets the next page of the file.
    #[inline]
    pub fn set_next_page(&mut self, page: Option<PageNo>) {
        self.write_u32(20, PageNo::to_raw(page));
    }

    /// Sets the previous page in the free-space list.
    #[inline]
    pub fn set_space_prev(&mut self, page: Option<PageNo>) {
        self.write_u32(24, PageNo::to_raw(page));
    }

    /// Sets the next page in the free-space list.
    #[inline]
    pub fn set_space_next(&mut self, page: Option<PageNo>) {
        self.write_u32(28, PageNo::to_raw(page));
    }

    /// Sets the start of contiguous free space.
    #[inline]
    pub fn set_free(&mut self, free: u16) {
        self.write_u16(32, free);
    }

    /// Sets the bytes held by reclaimed holes.
    #[inline]
    pub fn set_unused(&mut self, unused: u16) {
        self.write_u16(34, unused);
    }

    /// Sets the next tag to be minted.
    #[inline]
    pub fn set_unique(&mut self, unique: Unique) {
        self.write_u32(36, unique.as_u32());
    }

    /// Sets the checksum.
    #[inline]
    pub fn set_checksum(&mut self, checksum: u32) {
        self.write_u32(CHECKSUM_OFFSET, checksum);
    }

    /// Computes and stores the page checksum.
    ///
    /// Call this after all other modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.set_checksum(checksum);
    }
}
