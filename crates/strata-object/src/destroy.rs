//! Object destruction.

use strata_common::types::{ObjectId, PageNo};
use strata_storage::page::SlottedPage;
use tracing::{debug, trace};

use crate::catalog::{self, CatalogRef};
use crate::dealloc::{DeallocEntry, DeallocList};
use crate::error::{ObjectError, ObjectResult};
use crate::file_map;
use crate::manager::{is_file_page, ObjectManager};
use crate::space_list;

impl ObjectManager {
    /// Destroys the object `oid` of `file`.
    ///
    /// Space at the end of the object area is reusable at once; other holes
    /// are reclaimed by compaction. When the last object of a page other
    /// than the file's head page goes, the page is unlinked from the file
    /// and queued on `dealloc`.
    pub fn destroy_object(
        &self,
        file: CatalogRef,
        oid: ObjectId,
        dealloc: &mut DeallocList,
    ) -> ObjectResult<()> {
        let mut entry = catalog::read_entry(self.pool(), file)?;
        if oid.volume != entry.volume {
            return Err(ObjectError::BadObjectId { oid });
        }

        let page_id = oid.page_id();
        let mut guard = self.pool().fetch_page_for_write(page_id)?;
        {
            let data = guard.data();
            let page = SlottedPage::new(&data[..]);
            if !is_file_page(&page, entry.file_id) || !page.holds(oid.slot, oid.unique) {
                return Err(ObjectError::BadObjectId { oid });
            }
        }

        let emptied: Option<(PageNo, Option<PageNo>)> = {
            let mut data = guard.data_mut();
            let mut page = SlottedPage::new(&mut data[..]);

            space_list::remove(self.pool(), &mut entry, &mut page)?;
            let size = page
                .remove_object(oid.slot)
                .ok_or_else(|| ObjectError::corrupted(page_id, "object vanished during destroy"))?;
            trace!("Destroyed object {}, {} bytes", oid, size);

            let (prev, next) = (page.header().prev_page(), page.header().next_page());
            match prev {
                Some(prev_no) if page.n_slots() == 0 => Some((prev_no, next)),
                _ => {
                    space_list::insert(self.pool(), &mut entry, &mut page)?;
                    None
                }
            }
        };

        if let Some((prev_no, next_no)) = emptied {
            let prev_id = entry.page(prev_no);
            {
                let mut prev_guard = self.pool().fetch_page_for_write(prev_id)?;
                let mut next_guard = next_no
                    .map(|next_no| self.pool().fetch_page_for_write(entry.page(next_no)))
                    .transpose()?;

                let mut page_data = guard.data_mut();
                let mut prev_data = prev_guard.data_mut();
                let mut next_data = next_guard.as_mut().map(|guard| guard.data_mut());
                let mut next_page = next_data.as_mut().map(|data| SlottedPage::new(&mut data[..]));
                file_map::unlink(
                    &mut entry,
                    &mut SlottedPage::new(&mut page_data[..]),
                    &mut SlottedPage::new(&mut prev_data[..]),
                    next_page.as_mut(),
                );
            }
            drop(guard);

            let head = file_map::find_head(self.pool(), prev_id, self.max_pages())?;
            dealloc.push(DeallocEntry::new(head, page_id));
            debug!(
                "Unlinked empty page {} from file {}, queued for deallocation",
                page_id, entry.file_id
            );
        }

        catalog::write_entry(self.pool(), file, &entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectSpec;
    use strata_common::config::StorageConfig;
    use strata_common::types::Unique;

    fn setup() -> (ObjectManager, CatalogRef) {
        let manager = ObjectManager::in_memory(StorageConfig::for_testing()).unwrap();
        let file = manager.create_file(None).unwrap();
        (manager, file)
    }

    fn create(manager: &ObjectManager, file: CatalogRef, len: usize) -> ObjectId {
        manager
            .create_object(file, None, &ObjectSpec::new(&vec![7; len]))
            .unwrap()
    }

    #[test]
    fn test_destroy_tail_object_frees_space() {
        let (manager, file) = setup();
        create(&manager, file, 10);
        let b = create(&manager, file, 10);

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, b, &mut dealloc).unwrap();

        let stats = manager.page_stats(b.page_id()).unwrap();
        assert_eq!(stats.n_slots, 1);
        assert_eq!(stats.free, 20);
        assert_eq!(stats.unused, 0);
        assert!(dealloc.is_empty());
    }

    #[test]
    fn test_destroy_twice_is_rejected() {
        let (manager, file) = setup();
        let a = create(&manager, file, 10);
        create(&manager, file, 10);

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, a, &mut dealloc).unwrap();
        let before = manager.page_stats(a.page_id()).unwrap();

        assert!(matches!(
            manager.destroy_object(file, a, &mut dealloc),
            Err(ObjectError::BadObjectId { .. })
        ));
        assert_eq!(manager.page_stats(a.page_id()).unwrap(), before);
    }

    #[test]
    fn test_reused_slot_rejects_old_id() {
        let (manager, file) = setup();
        let a = create(&manager, file, 10);
        create(&manager, file, 10);

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, a, &mut dealloc).unwrap();
        let c = create(&manager, file, 10);
        assert_eq!(c.slot, a.slot);
        assert_ne!(c.unique, a.unique);

        assert!(matches!(
            manager.destroy_object(file, a, &mut dealloc),
            Err(ObjectError::BadObjectId { .. })
        ));
        manager.destroy_object(file, c, &mut dealloc).unwrap();
    }

    #[test]
    fn test_wrong_file_is_rejected() {
        let (manager, file) = setup();
        let other = manager.create_file(None).unwrap();
        let a = create(&manager, file, 10);

        let mut dealloc = DeallocList::new();
        assert!(matches!(
            manager.destroy_object(other, a, &mut dealloc),
            Err(ObjectError::BadObjectId { .. })
        ));
        let forged = ObjectId::new(a.page_id(), a.slot, Unique::new(999));
        assert!(matches!(
            manager.destroy_object(file, forged, &mut dealloc),
            Err(ObjectError::BadObjectId { .. })
        ));
    }

    #[test]
    fn test_head_page_is_kept_when_empty() {
        let (manager, file) = setup();
        let a = create(&manager, file, 100);
        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, a, &mut dealloc).unwrap();

        assert!(dealloc.is_empty());
        assert_eq!(manager.file_pages(file).unwrap(), vec![a.page_id()]);
        let stats = manager.page_stats(a.page_id()).unwrap();
        assert_eq!(stats.n_slots, 0);
        assert_eq!(stats.space_bucket, Some(4));
    }

    #[test]
    fn test_empty_tail_page_is_unlinked() {
        let (manager, file) = setup();
        let a = create(&manager, file, 3000);
        let b = create(&manager, file, 3000);
        assert_ne!(a.page_id(), b.page_id());

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, b, &mut dealloc).unwrap();

        let entry = manager.file_entry(file).unwrap();
        assert_eq!(entry.last_page_id(), a.page_id());
        assert_eq!(manager.file_pages(file).unwrap(), vec![a.page_id()]);
        assert_eq!(entry.space_heads.iter().flatten().count(), 1);

        let queued: Vec<_> = dealloc.iter().copied().collect();
        assert_eq!(queued, vec![DeallocEntry::new(a.page_id(), b.page_id())]);

        assert!(manager.allocator().is_allocated(b.page_id()));
        assert_eq!(manager.release(&mut dealloc).unwrap(), 1);
        assert!(!manager.allocator().is_allocated(b.page_id()));
        manager.verify_file(file).unwrap();
    }

    #[test]
    fn test_reused_page_rejects_old_id() {
        let (manager, file) = setup();
        create(&manager, file, 3000);
        let b = create(&manager, file, 3000);

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, b, &mut dealloc).unwrap();
        manager.release(&mut dealloc).unwrap();

        let c = create(&manager, file, 3000);
        assert_eq!(c.page_id(), b.page_id());
        assert_eq!(c.slot, b.slot);
        assert_ne!(c, b);

        assert!(matches!(
            manager.read_object(file, b, 0, None),
            Err(ObjectError::BadObjectId { .. })
        ));
        assert!(matches!(
            manager.destroy_object(file, b, &mut dealloc),
            Err(ObjectError::BadObjectId { .. })
        ));
        assert!(matches!(
            manager.next_object(file, Some(b)),
            Err(ObjectError::BadObjectId { .. })
        ));
        assert_eq!(manager.read_object(file, c, 0, Some(1)).unwrap(), vec![7]);
    }

    #[test]
    fn test_empty_middle_page_is_unlinked() {
        let (manager, file) = setup();
        let a = create(&manager, file, 3000);
        let b = create(&manager, file, 3000);
        let c = create(&manager, file, 3000);

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, b, &mut dealloc).unwrap();
        assert_eq!(
            manager.file_pages(file).unwrap(),
            vec![a.page_id(), c.page_id()]
        );
        assert_eq!(dealloc.len(), 1);
        manager.verify_file(file).unwrap();

        manager.release(&mut dealloc).unwrap();
        let d = create(&manager, file, 3000);
        assert_eq!(manager.file_pages(file).unwrap().len(), 3);
        assert_eq!(manager.read_object(file, d, 0, Some(1)).unwrap(), vec![7]);
    }
}
