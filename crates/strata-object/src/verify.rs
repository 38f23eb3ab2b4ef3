//! Structural checks of a file.
//!
//! [`ObjectManager::verify_file`] walks the page chain and every free-space
//! list of a file and reports the first violation it finds as
//! [`ObjectError::Corrupted`].

use std::collections::{HashMap, HashSet};

use strata_common::types::PageNo;
use strata_storage::page::{data_capacity, SlottedPage};

use crate::catalog::{self, CatalogRef};
use crate::error::{ObjectError, ObjectResult};
use crate::manager::{is_file_page, ObjectManager};
use crate::space_list;

/// Summary of a verified file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Pages in the chain.
    pub pages: usize,
    /// Live objects.
    pub objects: usize,
    /// Pages linked into a free-space list.
    pub listed_pages: usize,
}

/// Space-list state of a chain page.
struct ListedState {
    bucket: Option<usize>,
    space_prev: Option<PageNo>,
    space_next: Option<PageNo>,
}

impl ObjectManager {
    /// Checks the page chain and the free-space lists of `file`.
    ///
    /// Every chain page must be a data page of the file with a consistent
    /// layout and no trailing empty slot; only the head page may be empty.
    /// Each page must record the highest bucket its contiguous free space
    /// qualifies for, and be listed in exactly that bucket.
    pub fn verify_file(&self, file: CatalogRef) -> ObjectResult<VerifyReport> {
        let entry = catalog::read_entry(self.pool(), file)?;
        let mut report = VerifyReport::default();
        let mut chain: HashMap<PageNo, ListedState> = HashMap::new();
        let capacity = data_capacity(self.config().page_size);

        let mut prev: Option<PageNo> = None;
        let mut current = Some(entry.first_page);
        while let Some(page_no) = current {
            let page_id = entry.page(page_no);
            if chain.contains_key(&page_no) {
                return Err(ObjectError::corrupted(page_id, "page chain revisits page"));
            }

            let guard = self.pool().fetch_page(page_id)?;
            let data = guard.data();
            let page = SlottedPage::new(&data[..]);
            let header = page.header();

            if !is_file_page(&page, entry.file_id) {
                return Err(ObjectError::corrupted(page_id, "chain page is not a page of the file"));
            }
            if header.prev_page() != prev {
                return Err(ObjectError::corrupted(
                    page_id,
                    format!("prev link {:?} should be {:?}", header.prev_page(), prev),
                ));
            }
            page.check_layout()
                .map_err(|reason| ObjectError::corrupted(page_id, reason))?;

            let n_slots = page.n_slots();
            if n_slots > 0 && page.live_slot(n_slots - 1).is_none() {
                return Err(ObjectError::corrupted(page_id, "slot array ends with an empty slot"));
            }
            if n_slots == 0 && prev.is_some() {
                return Err(ObjectError::corrupted(page_id, "empty page is still linked"));
            }

            let expected = space_list::bucket_for(capacity, page.contiguous_free());
            if header.space_bucket() != expected {
                return Err(ObjectError::corrupted(
                    page_id,
                    format!(
                        "{} contiguous bytes belong in bucket {:?}, header says {:?}",
                        page.contiguous_free(),
                        expected,
                        header.space_bucket()
                    ),
                ));
            }

            report.pages += 1;
            report.objects += page.live_slot_count();
            chain.insert(
                page_no,
                ListedState {
                    bucket: header.space_bucket(),
                    space_prev: header.space_prev(),
                    space_next: header.space_next(),
                },
            );

            prev = Some(page_no);
            current = header.next_page();
        }

        if prev != Some(entry.last_page) {
            return Err(ObjectError::corrupted(
                entry.last_page_id(),
                "page chain does not end at the last page",
            ));
        }

        let mut listed: HashSet<PageNo> = HashSet::new();
        for (bucket, head) in entry.space_heads.iter().enumerate() {
            let mut prev: Option<PageNo> = None;
            let mut current = *head;
            while let Some(page_no) = current {
                let page_id = entry.page(page_no);
                if !listed.insert(page_no) {
                    return Err(ObjectError::corrupted(page_id, "page listed more than once"));
                }
                let Some(state) = chain.get(&page_no) else {
                    return Err(ObjectError::corrupted(page_id, "listed page is not in the chain"));
                };
                if state.bucket != Some(bucket) {
                    return Err(ObjectError::corrupted(
                        page_id,
                        format!("listed in bucket {bucket}, header says {:?}", state.bucket),
                    ));
                }
                if state.space_prev != prev {
                    return Err(ObjectError::corrupted(page_id, "space list prev link is wrong"));
                }
                prev = Some(page_no);
                current = state.space_next;
            }
        }

        if let Some((&page_no, _)) = chain
            .iter()
            .find(|(page_no, state)| state.bucket.is_some() && !listed.contains(*page_no))
        {
            return Err(ObjectError::corrupted(
                entry.page(page_no),
                "page records a bucket but is not listed",
            ));
        }

        report.listed_pages = listed.len();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeallocList, ObjectSpec};
    use strata_common::config::StorageConfig;
    use strata_common::types::{ObjectId, PageId};

    fn setup(objects: usize, len: usize) -> (ObjectManager, CatalogRef, Vec<ObjectId>) {
        let manager = ObjectManager::in_memory(StorageConfig::for_testing()).unwrap();
        let file = manager.create_file(None).unwrap();
        let oids = (0..objects)
            .map(|_| {
                manager
                    .create_object(file, None, &ObjectSpec::new(&vec![3; len]))
                    .unwrap()
            })
            .collect();
        (manager, file, oids)
    }

    fn mutate(manager: &ObjectManager, page_id: PageId, f: impl FnOnce(&mut SlottedPage<&mut [u8]>)) {
        let mut guard = manager.pool().fetch_page_for_write(page_id).unwrap();
        let mut data = guard.data_mut();
        f(&mut SlottedPage::new(&mut data[..]));
    }

    fn assert_corrupted(manager: &ObjectManager, file: CatalogRef) {
        assert!(matches!(
            manager.verify_file(file),
            Err(ObjectError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_healthy_file() {
        let (manager, file, oids) = setup(12, 900);
        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, oids[5], &mut dealloc).unwrap();
        manager.destroy_object(file, oids[11], &mut dealloc).unwrap();

        let report = manager.verify_file(file).unwrap();
        assert_eq!(report.objects, 10);
        assert_eq!(report.pages, 3);
        assert_eq!(report.listed_pages, 1);
    }

    #[test]
    fn test_new_file() {
        let manager = ObjectManager::in_memory(StorageConfig::for_testing()).unwrap();
        let file = manager.create_file(None).unwrap();
        assert_eq!(
            manager.verify_file(file).unwrap(),
            VerifyReport {
                pages: 1,
                objects: 0,
                listed_pages: 1
            }
        );
    }

    #[test]
    fn test_broken_prev_link() {
        let (manager, file, oids) = setup(2, 3000);
        mutate(&manager, oids[1].page_id(), |page| {
            page.header_mut().set_prev_page(None);
        });
        assert_corrupted(&manager, file);
    }

    #[test]
    fn test_unlisted_bucket_claim() {
        let (manager, file, oids) = setup(1, 3800);
        mutate(&manager, oids[0].page_id(), |page| {
            page.header_mut().set_space_bucket(Some(2));
        });
        assert_corrupted(&manager, file);
    }

    #[test]
    fn test_stale_bucket_above_threshold() {
        let (manager, file, oids) = setup(7, 500);
        let page_id = oids[0].page_id();
        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, oids[1], &mut dealloc).unwrap();
        manager.destroy_object(file, oids[3], &mut dealloc).unwrap();
        manager.verify_file(file).unwrap();

        // Bucket 0 threshold still holds after compaction, bucket 2 is the right one.
        mutate(&manager, page_id, |page| {
            page.compact(None);
        });
        assert_corrupted(&manager, file);
    }

    #[test]
    fn test_qualifying_page_left_unlisted() {
        let (manager, file, oids) = setup(1, 10);
        let mut entry = manager.file_entry(file).unwrap();
        mutate(&manager, oids[0].page_id(), |page| {
            space_list::remove(manager.pool(), &mut entry, page).unwrap();
        });
        catalog::write_entry(manager.pool(), file, &entry).unwrap();
        assert_corrupted(&manager, file);
    }

    #[test]
    fn test_layout_violation() {
        let (manager, file, oids) = setup(1, 100);
        mutate(&manager, oids[0].page_id(), |page| {
            page.header_mut().set_free(50);
        });
        assert_corrupted(&manager, file);
    }

    #[test]
    fn test_chain_cycle() {
        let (manager, file, oids) = setup(2, 3000);
        mutate(&manager, oids[1].page_id(), |page| {
            let head = oids[0].page_no;
            page.header_mut().set_next_page(Some(head));
        });
        assert_corrupted(&manager, file);
    }
}
