//! Core identifier types for Strata.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of page numbers, file ids, and tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Volume identifier - names one raw storage volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VolumeId(u16);

impl VolumeId {
    /// Creates a new `VolumeId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page number within a volume.
///
/// On disk, an absent page link is stored as [`PageNo::NIL_RAW`]; in memory
/// it is always represented as `Option<PageNo>`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageNo(u32);

impl PageNo {
    /// Raw encoding of "no page" in page headers and catalog entries.
    pub const NIL_RAW: u32 = u32::MAX;

    /// Creates a new `PageNo`.
    ///
    /// # Panics
    ///
    /// Panics if `no` is the reserved nil encoding.
    #[inline]
    #[must_use]
    pub const fn new(no: u32) -> Self {
        assert!(no != Self::NIL_RAW, "page number collides with the nil encoding");
        Self(no)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Decodes an optional page link.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw == Self::NIL_RAW {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Encodes an optional page link.
    #[inline]
    #[must_use]
    pub const fn to_raw(link: Option<Self>) -> u32 {
        match link {
            Some(no) => no.0,
            None => Self::NIL_RAW,
        }
    }
}

impl fmt::Debug for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageNo({})", self.0)
    }
}

impl fmt::Display for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page identifier - a page number qualified by its volume.
///
/// # Example
///
/// ```rust
/// use strata_common::types::{PageId, PageNo, VolumeId};
///
/// let page = PageId::new(VolumeId::new(2), PageNo::new(17));
/// assert_eq!(page.to_string(), "2:17");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId {
    /// Volume holding the page.
    pub volume: VolumeId,
    /// Page number within the volume.
    pub page_no: PageNo,
}

impl PageId {
    /// Creates a new `PageId`.
    #[inline]
    #[must_use]
    pub const fn new(volume: VolumeId, page_no: PageNo) -> Self {
        Self { volume, page_no }
    }

    /// Returns the page with number `page_no` on the same volume.
    #[inline]
    #[must_use]
    pub const fn sibling(self, page_no: PageNo) -> Self {
        Self::new(self.volume, page_no)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume, self.page_no)
    }
}

/// Extent number within a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ExtentNo(u32);

impl ExtentNo {
    /// Creates a new `ExtentNo`.
    #[inline]
    #[must_use]
    pub const fn new(no: u32) -> Self {
        Self(no)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExtentNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File identifier - names one logical file of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FileId(u32);

impl FileId {
    /// Creates a new `FileId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniqueness tag minted per page and copied into each [`ObjectId`].
///
/// Tags distinguish successive occupants of the same slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Unique(u32);

impl Unique {
    /// Creates a new `Unique`.
    #[inline]
    #[must_use]
    pub const fn new(tag: u32) -> Self {
        Self(tag)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Unique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a page's slot array.
pub type SlotNo = u16;

/// Stable external handle of one object.
///
/// While the object exists, the slot at `(page, slot)` stores `unique`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    /// Volume holding the object.
    pub volume: VolumeId,
    /// Page holding the object.
    pub page_no: PageNo,
    /// Slot index of the object within its page.
    pub slot: SlotNo,
    /// Tag minted when the object was created.
    pub unique: Unique,
}

impl ObjectId {
    /// Creates a new `ObjectId`.
    #[inline]
    #[must_use]
    pub const fn new(page: PageId, slot: SlotNo, unique: Unique) -> Self {
        Self {
            volume: page.volume,
            page_no: page.page_no,
            slot,
            unique,
        }
    }

    /// Returns the page holding the object.
    #[inline]
    #[must_use]
    pub const fn page_id(&self) -> PageId {
        PageId::new(self.volume, self.page_no)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.volume, self.page_no, self.slot, self.unique
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_no_links() {
        assert_eq!(PageNo::from_raw(PageNo::NIL_RAW), None);
        assert_eq!(PageNo::from_raw(5), Some(PageNo::new(5)));
        assert_eq!(PageNo::to_raw(None), u32::MAX);
        assert_eq!(PageNo::to_raw(Some(PageNo::new(9))), 9);
    }

    #[test]
    #[should_panic(expected = "nil encoding")]
    fn test_page_no_rejects_nil() {
        let _ = PageNo::new(u32::MAX);
    }

    #[test]
    fn test_page_id_sibling() {
        let page = PageId::new(VolumeId::new(3), PageNo::new(10));
        let sibling = page.sibling(PageNo::new(11));
        assert_eq!(sibling.volume, VolumeId::new(3));
        assert_eq!(sibling.page_no, PageNo::new(11));
    }

    #[test]
    fn test_object_id() {
        let page = PageId::new(VolumeId::new(1), PageNo::new(4));
        let oid = ObjectId::new(page, 2, Unique::new(99));
        assert_eq!(oid.page_id(), page);
        assert_eq!(oid.to_string(), "1:4#2@99");
    }

    #[test]
    fn test_object_id_serde() {
        let page = PageId::new(VolumeId::new(1), PageNo::new(4));
        let oid = ObjectId::new(page, 2, Unique::new(99));
        let json = serde_json::to_string(&oid).unwrap();
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
    }
}
