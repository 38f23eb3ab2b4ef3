//! In-memory page store.

use std::collections::HashMap;

use parking_lot::RwLock;
use strata_common::types::PageId;

use super::{check_buffer, PageStore, StoreResult};

/// Page store that keeps every written image in memory.
///
/// Used for tests and for short-lived scratch files.
#[derive(Debug)]
pub struct MemoryStore {
    page_size: usize,
    pages: RwLock<HashMap<PageId, Box<[u8]>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of pages that have been written.
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }
}

impl PageStore for MemoryStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        check_buffer(self.page_size, buf.len())?;
        match self.pages.read().get(&page_id) {
            Some(image) => buf.copy_from_slice(image),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> StoreResult<()> {
        check_buffer(self.page_size, buf.len())?;
        self.pages.write().insert(page_id, buf.into());
        Ok(())
    }

    fn sync(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::{PageNo, VolumeId};

    fn page(no: u32) -> PageId {
        PageId::new(VolumeId::new(1), PageNo::new(no))
    }

    #[test]
    fn test_unwritten_page_reads_zero() {
        let store = MemoryStore::new(1024);
        let mut buf = vec![0xFFu8; 1024];
        store.read_page(page(7), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_then_read() {
        let store = MemoryStore::new(1024);
        let mut image = vec![0u8; 1024];
        image[10] = 42;
        store.write_page(page(1), &image).unwrap();

        let mut buf = vec![0u8; 1024];
        store.read_page(page(1), &mut buf).unwrap();
        assert_eq!(buf, image);
        assert_eq!(store.page_count(), 1);
    }

    #[test]
    fn test_rejects_wrong_buffer_size() {
        let store = MemoryStore::new(1024);
        let mut buf = vec![0u8; 100];
        assert!(store.read_page(page(1), &mut buf).is_err());
        assert!(store.write_page(page(1), &buf).is_err());
    }
}
