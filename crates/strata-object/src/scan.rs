//! Scan cursor.
//!
//! `next_object` and `prev_object` are stateless: the caller passes the
//! object it is positioned on and gets back its neighbor in file order
//! (chain order of pages, slot order within a page). Empty slots and pages
//! without live objects are stepped over. `Ok(None)` marks the end of the
//! scan.

use strata_common::types::{ObjectId, PageId, SlotNo};
use strata_storage::page::{ObjectHeader, SlottedPage};

use crate::catalog::{self, CatalogRef, FileEntry};
use crate::error::{ObjectError, ObjectResult};
use crate::manager::{is_file_page, ObjectManager};

/// An object returned by a scan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanItem {
    /// Id of the object.
    pub oid: ObjectId,
    /// Header of the object.
    pub header: ObjectHeader,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

impl ObjectManager {
    /// Returns the object after `current`, or the first object of the file
    /// when `current` is `None`.
    pub fn next_object(
        &self,
        file: CatalogRef,
        current: Option<ObjectId>,
    ) -> ObjectResult<Option<ScanItem>> {
        self.step(file, current, Direction::Forward)
    }

    /// Returns the object before `current`, or the last object of the file
    /// when `current` is `None`.
    pub fn prev_object(
        &self,
        file: CatalogRef,
        current: Option<ObjectId>,
    ) -> ObjectResult<Option<ScanItem>> {
        self.step(file, current, Direction::Backward)
    }

    fn step(
        &self,
        file: CatalogRef,
        current: Option<ObjectId>,
        direction: Direction,
    ) -> ObjectResult<Option<ScanItem>> {
        let entry = catalog::read_entry(self.pool(), file)?;
        let (mut page_id, mut from) = match current {
            Some(oid) => {
                self.check_current(&entry, oid)?;
                (oid.page_id(), Some(oid.slot))
            }
            None => match direction {
                Direction::Forward => (entry.first_page_id(), None),
                Direction::Backward => (entry.last_page_id(), None),
            },
        };

        for _ in 0..self.max_pages() {
            let guard = self.pool().fetch_page(page_id)?;
            let data = guard.data();
            let page = SlottedPage::new(&data[..]);
            if !is_file_page(&page, entry.file_id) {
                return Err(ObjectError::corrupted(page_id, "scan reached a page of another file"));
            }

            let (slot, neighbor) = match direction {
                Direction::Forward => (page.next_live_slot(from), page.header().next_page()),
                Direction::Backward => (page.prev_live_slot(from), page.header().prev_page()),
            };
            if let Some(slot_no) = slot {
                return scan_item(&page, page_id, slot_no).map(Some);
            }

            match neighbor {
                Some(page_no) => {
                    page_id = entry.page(page_no);
                    from = None;
                }
                None => return Ok(None),
            }
        }

        Err(ObjectError::corrupted(page_id, "page chain has a cycle"))
    }

    fn check_current(&self, entry: &FileEntry, oid: ObjectId) -> ObjectResult<()> {
        if oid.volume != entry.volume {
            return Err(ObjectError::BadObjectId { oid });
        }
        let guard = self.pool().fetch_page(oid.page_id())?;
        let data = guard.data();
        let page = SlottedPage::new(&data[..]);
        if !is_file_page(&page, entry.file_id) || !page.holds(oid.slot, oid.unique) {
            return Err(ObjectError::BadObjectId { oid });
        }
        Ok(())
    }
}

fn scan_item<T: AsRef<[u8]>>(
    page: &SlottedPage<T>,
    page_id: PageId,
    slot_no: SlotNo,
) -> ObjectResult<ScanItem> {
    let slot = page
        .live_slot(slot_no)
        .ok_or_else(|| ObjectError::corrupted(page_id, format!("slot {slot_no} is empty")))?;
    Ok(ScanItem {
        oid: ObjectId::new(page_id, slot_no, slot.unique),
        header: page.object_header_at(slot.offset as usize),
    })
}
