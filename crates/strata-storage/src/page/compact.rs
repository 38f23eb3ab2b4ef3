//! In-page compaction.
//!
//! Compaction slides every live object to the front of the data area so all
//! free bytes form one region in front of the slot array. Objects keep their
//! slot index and tag; only `slot.offset` changes.

use strata_common::types::SlotNo;

use super::header::PAGE_HEADER_SIZE;
use super::slotted::{Slot, SlottedPage};

impl<T: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<T> {
    /// Compacts the data area.
    ///
    /// Live objects are packed from offset 0 in ascending order of their
    /// current offset. If `last_slot` names a live slot, that object is
    /// placed after all others so it borders the free region. Afterwards
    /// `unused` is 0 and `free` is the end of the last object.
    ///
    /// Returns the number of bytes reclaimed.
    pub fn compact(&mut self, last_slot: Option<SlotNo>) -> usize {
        let before = self.free();
        let last_slot = last_slot.filter(|&slot_no| self.live_slot(slot_no).is_some());

        // New offsets never exceed old ones when objects move in offset
        // order, so each object can slide within the same buffer.
        let mut live: Vec<(SlotNo, Slot)> = self
            .live_slots()
            .filter(|&(slot_no, _)| Some(slot_no) != last_slot)
            .collect();
        live.sort_by_key(|(_, slot)| slot.offset);

        let saved_last = last_slot.and_then(|slot_no| {
            let slot = self.live_slot(slot_no)?;
            let start = PAGE_HEADER_SIZE + slot.offset as usize;
            let size = self.object_header_at(slot.offset as usize).stored_size();
            Some((slot_no, slot, self.as_bytes()[start..start + size].to_vec()))
        });

        let mut cursor = 0usize;
        for (slot_no, slot) in live {
            let old = slot.offset as usize;
            let size = self.object_header_at(old).stored_size();
            if old != cursor {
                self.as_bytes_mut().copy_within(
                    PAGE_HEADER_SIZE + old..PAGE_HEADER_SIZE + old + size,
                    PAGE_HEADER_SIZE + cursor,
                );
                self.set_slot(slot_no, Slot::new(cursor as u16, slot.unique));
            }
            cursor += size;
        }

        if let Some((slot_no, slot, bytes)) = saved_last {
            let start = PAGE_HEADER_SIZE + cursor;
            self.as_bytes_mut()[start..start + bytes.len()].copy_from_slice(&bytes);
            self.set_slot(slot_no, Slot::new(cursor as u16, slot.unique));
            cursor += bytes.len();
        }

        let mut header = self.header_mut();
        header.set_free(cursor as u16);
        header.set_unused(0);

        before.saturating_sub(cursor)
    }
}
