//! Slotted page format for variable-length objects.
//!
//! A slotted page stores variable-length objects behind an indirection
//! layer (the slot array), which lets objects be:
//!
//! - Inserted without moving existing objects
//! - Deleted by marking slots as empty, leaving a hole until compaction
//! - Moved by compaction without changing their slot index
//!
//! # Page Layout
//!
//! ```text
//! +----------------------+
//! |    Page Header       |  48 bytes (see header.rs)
//! +----------------------+
//! |    Object Data       |  grows upward from the header
//! |     [object 0]       |
//! |     [object 1]       |
//! |        ...           |
//! +----------------------+  <- free
//! |    Free Space        |
//! +----------------------+
//! |        ...           |
//! |      [slot 1]        |  offset: 2 bytes, reserved: 2, unique: 4
//! |      [slot 0]        |
//! +----------------------+
//! ```

use strata_common::constants::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use strata_common::types::{FileId, PageId, SlotNo, Unique};

use super::header::{PageHeader, PAGE_HEADER_SIZE};
use super::object::{ObjectHeader, OBJECT_HEADER_SIZE};
use super::types::PageType;
use super::data_capacity;

/// Size of each slot in bytes (offset: 2, reserved: 2, unique: 4).
pub const SLOT_SIZE: usize = 8;

/// Offset value marking a slot that holds no object.
pub const EMPTY_SLOT: u16 = 0xFFFF;

/// A slot in the slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Data-area offset of the object header, or [`EMPTY_SLOT`].
    pub offset: u16,
    /// Tag of the object occupying the slot.
    pub unique: Unique,
}

impl Slot {
    /// Creates a slot pointing at `offset`.
    #[inline]
    #[must_use]
    pub const fn new(offset: u16, unique: Unique) -> Self {
        Self { offset, unique }
    }

    /// Creates an empty slot.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            offset: EMPTY_SLOT,
            unique: Unique::new(0),
        }
    }

    /// Returns true if the slot holds no object.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.offset == EMPTY_SLOT
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let offset = u16::from_le_bytes([bytes[0], bytes[1]]);
        let unique = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self {
            offset,
            unique: Unique::new(unique),
        }
    }

    fn to_bytes(self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0u8; SLOT_SIZE];
        bytes[0..2].copy_from_slice(&self.offset.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.unique.as_u32().to_le_bytes());
        bytes
    }
}

/// A slotted page view over a page buffer.
///
/// Accessors need `T: AsRef<[u8]>`; mutations additionally need
/// `T: AsMut<[u8]>`. Both `&[u8]` and `&mut [u8]` (and owned `Vec<u8>`) work.
///
/// # Example
///
/// ```rust
/// use strata_common::types::{FileId, PageId, PageNo, VolumeId};
/// use strata_storage::page::{ObjectHeader, SlottedPage};
///
/// let mut page = SlottedPage::new(vec![0u8; 4096]);
/// page.init_data_page(PageId::new(VolumeId::new(1), PageNo::new(3)), FileId::new(1));
///
/// let (slot, _unique) = page
///     .insert_object(ObjectHeader::new(0, 0, 5), b"hello")
///     .unwrap();
/// assert_eq!(slot, 0);
/// assert_eq!(page.object_payload(slot), Some(&b"hello"[..]));
/// ```
#[derive(Debug)]
pub struct SlottedPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> SlottedPage<T> {
    /// Creates a slotted page view over the given buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer size is outside the supported page sizes.
    #[inline]
    pub fn new(data: T) -> Self {
        let len = data.as_ref().len();
        assert!(
            (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&len),
            "unsupported page size {len}"
        );
        Self { data }
    }

    /// Consumes the view and returns the buffer.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Returns the raw page bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the page size.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns the size of the data area.
    #[inline]
    pub fn capacity(&self) -> usize {
        data_capacity(self.page_size())
    }

    /// Returns a read-only view of the page header.
    #[inline]
    pub fn header(&self) -> PageHeader<&[u8]> {
        PageHeader::new(self.as_bytes())
    }

    /// Returns the number of slot-array entries, empty ones included.
    #[inline]
    pub fn n_slots(&self) -> u16 {
        self.header().n_slots()
    }

    /// Returns the start of contiguous free space in the data area.
    #[inline]
    pub fn free(&self) -> usize {
        self.header().free() as usize
    }

    /// Returns the bytes held by holes before `free`.
    #[inline]
    pub fn unused(&self) -> usize {
        self.header().unused() as usize
    }

    /// Returns the contiguous free bytes between `free` and the slot array.
    #[inline]
    pub fn contiguous_free(&self) -> usize {
        let slot_bytes = self.n_slots() as usize * SLOT_SIZE;
        self.capacity()
            .saturating_sub(self.free())
            .saturating_sub(slot_bytes)
    }

    /// Returns the free bytes available after compaction.
    #[inline]
    pub fn total_free(&self) -> usize {
        self.contiguous_free() + self.unused()
    }

    #[inline]
    fn slot_position(&self, slot_no: SlotNo) -> usize {
        self.page_size() - (slot_no as usize + 1) * SLOT_SIZE
    }

    /// Returns the slot at `slot_no`, or `None` if past the slot array.
    #[inline]
    pub fn slot(&self, slot_no: SlotNo) -> Option<Slot> {
        if slot_no >= self.n_slots() {
            return None;
        }
        let pos = self.slot_position(slot_no);
        Some(Slot::from_bytes(&self.as_bytes()[pos..pos + SLOT_SIZE]))
    }

    /// Returns the slot at `slot_no` if it holds an object.
    #[inline]
    pub fn live_slot(&self, slot_no: SlotNo) -> Option<Slot> {
        self.slot(slot_no).filter(|slot| !slot.is_empty())
    }

    /// Returns true if `slot_no` holds the object tagged `unique`.
    #[inline]
    pub fn holds(&self, slot_no: SlotNo, unique: Unique) -> bool {
        self.live_slot(slot_no)
            .is_some_and(|slot| slot.unique == unique)
    }

    /// Iterates over all live slots in index order.
    pub fn live_slots(&self) -> impl Iterator<Item = (SlotNo, Slot)> + '_ {
        (0..self.n_slots()).filter_map(move |slot_no| {
            self.live_slot(slot_no).map(|slot| (slot_no, slot))
        })
    }

    /// Returns the number of live slots.
    pub fn live_slot_count(&self) -> usize {
        self.live_slots().count()
    }

    /// Returns the first empty slot index, if any.
    pub fn find_empty_slot(&self) -> Option<SlotNo> {
        (0..self.n_slots()).find(|&slot_no| {
            self.slot(slot_no).is_some_and(|slot| slot.is_empty())
        })
    }

    /// Returns the live slot whose tag equals `unique`.
    pub fn find_slot_by_unique(&self, unique: Unique) -> Option<SlotNo> {
        self.live_slots()
            .find(|(_, slot)| slot.unique == unique)
            .map(|(slot_no, _)| slot_no)
    }

    /// Returns the lowest live slot index.
    pub fn first_live_slot(&self) -> Option<SlotNo> {
        self.next_live_slot(None)
    }

    /// Returns the highest live slot index.
    pub fn last_live_slot(&self) -> Option<SlotNo> {
        self.prev_live_slot(None)
    }

    /// Returns the lowest live slot index greater than `after`
    /// (or the first live slot when `after` is `None`).
    pub fn next_live_slot(&self, after: Option<SlotNo>) -> Option<SlotNo> {
        let start = match after {
            Some(slot_no) => slot_no.checked_add(1)?,
            None => 0,
        };
        (start..self.n_slots()).find(|&slot_no| self.live_slot(slot_no).is_some())
    }

    /// Returns the highest live slot index lower than `before`
    /// (or the last live slot when `before` is `None`).
    pub fn prev_live_slot(&self, before: Option<SlotNo>) -> Option<SlotNo> {
        let end = before.map_or(self.n_slots(), |slot_no| slot_no.min(self.n_slots()));
        (0..end)
            .rev()
            .find(|&slot_no| self.live_slot(slot_no).is_some())
    }

    /// Reads the object header stored at data-area `offset`.
    #[inline]
    pub fn object_header_at(&self, offset: usize) -> ObjectHeader {
        let start = PAGE_HEADER_SIZE + offset;
        ObjectHeader::from_bytes(&self.as_bytes()[start..start + OBJECT_HEADER_SIZE])
    }

    /// Returns the header of the object in `slot_no`.
    pub fn object_header(&self, slot_no: SlotNo) -> Option<ObjectHeader> {
        let slot = self.live_slot(slot_no)?;
        Some(self.object_header_at(slot.offset as usize))
    }

    /// Returns the payload of the object in `slot_no` (without padding).
    pub fn object_payload(&self, slot_no: SlotNo) -> Option<&[u8]> {
        let slot = self.live_slot(slot_no)?;
        let header = self.object_header_at(slot.offset as usize);
        let start = PAGE_HEADER_SIZE + slot.offset as usize + OBJECT_HEADER_SIZE;
        self.as_bytes().get(start..start + header.length as usize)
    }

    /// Returns the total bytes occupied by live objects.
    pub fn live_bytes(&self) -> usize {
        self.live_slots()
            .map(|(_, slot)| self.object_header_at(slot.offset as usize).stored_size())
            .sum()
    }

    /// Checks the structural invariants of a data page.
    ///
    /// Returns a description of the first violation found.
    pub fn check_layout(&self) -> Result<(), String> {
        let capacity = self.capacity();
        let free = self.free();
        let slot_bytes = self.n_slots() as usize * SLOT_SIZE;

        if free + slot_bytes > capacity {
            return Err(format!(
                "free {free} and {} slots overflow capacity {capacity}",
                self.n_slots()
            ));
        }
        if free + self.unused() > capacity {
            return Err(format!(
                "free {free} + unused {} exceeds capacity {capacity}",
                self.unused()
            ));
        }

        let mut extents = Vec::new();
        for (slot_no, slot) in self.live_slots() {
            let offset = slot.offset as usize;
            if offset + OBJECT_HEADER_SIZE > free {
                return Err(format!("slot {slot_no} offset {offset} is past free {free}"));
            }
            let end = offset + self.object_header_at(offset).stored_size();
            if end > free {
                return Err(format!("slot {slot_no} object ends at {end}, past free {free}"));
            }
            extents.push((offset, end, slot_no));
        }

        extents.sort_unstable();
        for pair in extents.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(format!(
                    "objects in slots {} and {} overlap",
                    pair[0].2, pair[1].2
                ));
            }
        }

        let live: usize = extents.iter().map(|(start, end, _)| end - start).sum();
        if live + self.unused() > free {
            return Err(format!(
                "live bytes {live} + unused {} exceed free {free}",
                self.unused()
            ));
        }

        Ok(())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<T> {
    /// Returns the raw page bytes mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Returns a mutable view of the page header.
    #[inline]
    pub fn header_mut(&mut self) -> PageHeader<&mut [u8]> {
        PageHeader::new(self.as_bytes_mut())
    }

    /// Initializes the page as an empty data page of `file_id`.
    ///
    /// The tag counter carries over from the previous image, so a page
    /// that is freed and reused never mints a tag it handed out before.
    pub fn init_data_page(&mut self, page_id: PageId, file_id: FileId) {
        self.reformat(page_id, file_id, PageType::Data);
    }

    /// Marks the page free, dropping its objects and links but keeping its
    /// tag counter.
    pub fn retire(&mut self, page_id: PageId) {
        self.reformat(page_id, FileId::new(0), PageType::Free);
    }

    fn reformat(&mut self, page_id: PageId, file_id: FileId, page_type: PageType) {
        let unique = self.header().unique();
        let mut header = self.header_mut();
        header.initialize(page_id, file_id, page_type);
        header.set_unique(unique);
    }

    /// Writes `slot` at index `slot_no`.
    ///
    /// # Panics
    ///
    /// Panics if `slot_no` is past the slot array.
    #[inline]
    pub fn set_slot(&mut self, slot_no: SlotNo, slot: Slot) {
        assert!(slot_no < self.n_slots(), "slot {slot_no} out of range");
        let pos = self.slot_position(slot_no);
        self.as_bytes_mut()[pos..pos + SLOT_SIZE].copy_from_slice(&slot.to_bytes());
    }

    /// Mints the next tag of this page.
    pub fn next_unique(&mut self) -> Unique {
        let unique = self.header().unique();
        let next = Unique::new(unique.as_u32().wrapping_add(1));
        self.header_mut().set_unique(next);
        unique
    }

    /// Writes an object at data-area `offset`: header, payload, zero padding.
    pub(crate) fn write_object_at(&mut self, offset: usize, header: ObjectHeader, payload: &[u8]) {
        let start = PAGE_HEADER_SIZE + offset;
        let payload_start = start + OBJECT_HEADER_SIZE;
        let end = start + header.stored_size();
        let bytes = self.as_bytes_mut();
        bytes[start..payload_start].copy_from_slice(&header.to_bytes());
        bytes[payload_start..payload_start + payload.len()].copy_from_slice(payload);
        bytes[payload_start + payload.len()..end].fill(0);
    }

    /// Stores an object at `free`, in the first empty slot or a new one.
    ///
    /// `payload` is truncated or zero-extended to `header.length`. Returns the
    /// slot index and the tag minted for it, or `None` if the object does not
    /// fit in the contiguous free space (compact the page first to use holes).
    pub fn insert_object(
        &mut self,
        header: ObjectHeader,
        payload: &[u8],
    ) -> Option<(SlotNo, Unique)> {
        let reuse = self.find_empty_slot();
        let slot_cost = if reuse.is_some() { 0 } else { SLOT_SIZE };
        let stored = header.stored_size();
        if stored + slot_cost > self.contiguous_free() {
            return None;
        }

        let slot_no = match reuse {
            Some(slot_no) => slot_no,
            None => {
                let slot_no = self.n_slots();
                self.header_mut().set_n_slots(slot_no + 1);
                slot_no
            }
        };

        let offset = self.free();
        let length = (header.length as usize).min(payload.len());
        self.write_object_at(offset, header, &payload[..length]);

        let unique = self.next_unique();
        self.set_slot(slot_no, Slot::new(offset as u16, unique));
        self.header_mut().set_free((offset + stored) as u16);

        Some((slot_no, unique))
    }

    /// Removes the object in `slot_no` and returns the bytes it occupied.
    ///
    /// Trailing empty slots are dropped from the slot array. Space at the end
    /// of the object area is returned to `free` immediately; any other hole is
    /// counted in `unused` until the page is compacted.
    pub fn remove_object(&mut self, slot_no: SlotNo) -> Option<usize> {
        let slot = self.live_slot(slot_no)?;
        let offset = slot.offset as usize;
        let size = self.object_header_at(offset).stored_size();

        self.set_slot(slot_no, Slot::empty());
        self.trim_empty_slots();

        if offset + size == self.free() {
            self.header_mut().set_free(offset as u16);
        } else {
            let unused = self.unused() + size;
            self.header_mut().set_unused(unused as u16);
        }

        Some(size)
    }

    /// Drops empty slots from the end of the slot array.
    pub fn trim_empty_slots(&mut self) {
        let mut n_slots = self.n_slots();
        while n_slots > 0 && self.slot(n_slots - 1).is_some_and(|slot| slot.is_empty()) {
            n_slots -= 1;
        }
        self.header_mut().set_n_slots(n_slots);
    }
}
