//! Object reads.

use strata_common::types::ObjectId;
use strata_storage::buffer::PageReadGuard;
use strata_storage::page::{ObjectHeader, SlottedPage};

use crate::catalog::{self, CatalogRef};
use crate::error::{ObjectError, ObjectResult};
use crate::manager::{is_file_page, ObjectManager};

impl ObjectManager {
    /// Reads `length` payload bytes of `oid` starting at `start`.
    ///
    /// `None` reads to the end of the object.
    pub fn read_object(
        &self,
        file: CatalogRef,
        oid: ObjectId,
        start: usize,
        length: Option<usize>,
    ) -> ObjectResult<Vec<u8>> {
        let guard = self.pin_object(file, oid)?;
        let data = guard.data();
        let page = SlottedPage::new(&data[..]);
        let payload = page
            .object_payload(oid.slot)
            .ok_or_else(|| ObjectError::corrupted(oid.page_id(), "object payload out of page"))?;

        if start > payload.len() {
            return Err(ObjectError::BadStart { start });
        }
        let end = match length {
            Some(length) => start
                .checked_add(length)
                .filter(|&end| end <= payload.len())
                .ok_or(ObjectError::BadLength {
                    length: length as i64,
                })?,
            None => payload.len(),
        };

        Ok(payload[start..end].to_vec())
    }

    /// Returns the header of `oid`.
    pub fn object_header(&self, file: CatalogRef, oid: ObjectId) -> ObjectResult<ObjectHeader> {
        let guard = self.pin_object(file, oid)?;
        let data = guard.data();
        SlottedPage::new(&data[..])
            .object_header(oid.slot)
            .ok_or(ObjectError::BadObjectId { oid })
    }

    /// Pins the page of `oid` after checking that the object is live and
    /// belongs to `file`.
    pub(crate) fn pin_object(&self, file: CatalogRef, oid: ObjectId) -> ObjectResult<PageReadGuard> {
        let entry = catalog::read_entry(self.pool(), file)?;
        if oid.volume != entry.volume {
            return Err(ObjectError::BadObjectId { oid });
        }

        let guard = self.pool().fetch_page(oid.page_id())?;
        {
            let data = guard.data();
            let page = SlottedPage::new(&data[..]);
            if !is_file_page(&page, entry.file_id) || !page.holds(oid.slot, oid.unique) {
                return Err(ObjectError::BadObjectId { oid });
            }
        }
        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeallocList, ObjectSpec};
    use strata_common::config::StorageConfig;

    fn setup() -> (ObjectManager, CatalogRef, ObjectId) {
        let manager = ObjectManager::in_memory(StorageConfig::for_testing()).unwrap();
        let file = manager.create_file(None).unwrap();
        let oid = manager
            .create_object(file, None, &ObjectSpec::new(b"0123456789").with_tag(4))
            .unwrap();
        (manager, file, oid)
    }

    #[test]
    fn test_read_windows() {
        let (manager, file, oid) = setup();
        assert_eq!(manager.read_object(file, oid, 0, None).unwrap(), b"0123456789");
        assert_eq!(manager.read_object(file, oid, 3, Some(4)).unwrap(), b"3456");
        assert_eq!(manager.read_object(file, oid, 7, None).unwrap(), b"789");
        assert!(manager.read_object(file, oid, 10, None).unwrap().is_empty());
        assert!(manager.read_object(file, oid, 10, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_read_out_of_range() {
        let (manager, file, oid) = setup();
        assert!(matches!(
            manager.read_object(file, oid, 11, None),
            Err(ObjectError::BadStart { start: 11 })
        ));
        assert!(matches!(
            manager.read_object(file, oid, 8, Some(3)),
            Err(ObjectError::BadLength { length: 3 })
        ));
        assert!(matches!(
            manager.read_object(file, oid, 1, Some(usize::MAX)),
            Err(ObjectError::BadLength { .. })
        ));
    }

    #[test]
    fn test_padding_is_not_returned() {
        let (manager, file, _) = setup();
        let oid = manager
            .create_object(file, None, &ObjectSpec::new(b"abcde"))
            .unwrap();
        assert_eq!(manager.read_object(file, oid, 0, None).unwrap(), b"abcde");
        assert_eq!(manager.object_header(file, oid).unwrap().aligned_length(), 8);
    }

    #[test]
    fn test_header() {
        let (manager, file, oid) = setup();
        let header = manager.object_header(file, oid).unwrap();
        assert_eq!(header, ObjectHeader::new(0, 4, 10));
    }

    #[test]
    fn test_destroyed_object_is_unreadable() {
        let (manager, file, oid) = setup();
        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, oid, &mut dealloc).unwrap();
        assert!(matches!(
            manager.read_object(file, oid, 0, None),
            Err(ObjectError::BadObjectId { .. })
        ));
        assert!(matches!(
            manager.object_header(file, oid),
            Err(ObjectError::BadObjectId { .. })
        ));
    }
}
