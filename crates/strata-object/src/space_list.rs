//! Free-space directory.
//!
//! Every file keeps [`SPACE_LIST_BUCKETS`] doubly-linked lists of its pages
//! that have room for new objects. Bucket `i` guarantees at least
//! `SPACE_LIST_TENTHS[i]` tenths of the data area as contiguous free space.
//! A page is linked into the highest bucket it qualifies for, and its header
//! records that bucket so it can be unlinked even after compaction has
//! changed its free space.
//!
//! List heads live in the file's catalog entry; the links live in the page
//! headers (`space_prev`, `space_next`).
//!
//! Callers must not hold the data of any page other than `page` while
//! calling [`insert`] or [`remove`]: list neighbors are pinned and written
//! here.

use strata_common::constants::{SPACE_LIST_BUCKETS, SPACE_LIST_TENTHS};
use strata_common::types::{PageNo, SlotNo};
use strata_storage::buffer::BufferPool;
use strata_storage::page::SlottedPage;
use tracing::trace;

use crate::catalog::FileEntry;
use crate::error::{ObjectError, ObjectResult};

/// Returns the minimum contiguous free space of each bucket.
#[inline]
pub fn thresholds(capacity: usize) -> [usize; SPACE_LIST_BUCKETS] {
    SPACE_LIST_TENTHS.map(|tenths| capacity * tenths / 10)
}

/// Returns the highest bucket a page with `free` contiguous bytes belongs to.
pub fn bucket_for(capacity: usize, free: usize) -> Option<usize> {
    thresholds(capacity)
        .iter()
        .rposition(|&threshold| free >= threshold)
}

/// Returns the first non-empty bucket that guarantees `needed` bytes,
/// together with its head page.
pub fn smallest_fit(entry: &FileEntry, capacity: usize, needed: usize) -> Option<(usize, PageNo)> {
    thresholds(capacity)
        .iter()
        .zip(entry.space_heads)
        .enumerate()
        .filter(|(_, (threshold, _))| **threshold >= needed)
        .find_map(|(bucket, (_, head))| head.map(|page_no| (bucket, page_no)))
}

/// Links `page` into the bucket matching its contiguous free space.
///
/// A page that is already linked is moved. Pages below the smallest
/// threshold stay unlinked.
pub fn insert(
    pool: &BufferPool,
    entry: &mut FileEntry,
    page: &mut SlottedPage<&mut [u8]>,
) -> ObjectResult<()> {
    if page.header().space_bucket().is_some() {
        remove(pool, entry, page)?;
    }

    let page_no = page.header().page_id().page_no;
    let Some(bucket) = bucket_for(page.capacity(), page.contiguous_free()) else {
        trace!("Page {} has no room for any space list", page_no);
        return Ok(());
    };

    let old_head = entry.space_heads[bucket];
    if let Some(head_no) = old_head {
        if head_no == page_no {
            return Err(ObjectError::corrupted(
                entry.page(page_no),
                "unlinked page is the head of a space list",
            ));
        }
        let mut guard = pool.fetch_page_for_write(entry.page(head_no))?;
        let mut data = guard.data_mut();
        SlottedPage::new(&mut data[..])
            .header_mut()
            .set_space_prev(Some(page_no));
    }

    let mut header = page.header_mut();
    header.set_space_bucket(Some(bucket));
    header.set_space_prev(None);
    header.set_space_next(old_head);
    entry.space_heads[bucket] = Some(page_no);

    trace!("Linked page {} into space list {}", page_no, bucket);
    Ok(())
}

/// Compacts `page` and moves it to the bucket its new contiguous free
/// space qualifies for. Returns the bytes reclaimed.
pub fn compact(
    pool: &BufferPool,
    entry: &mut FileEntry,
    page: &mut SlottedPage<&mut [u8]>,
    last_slot: Option<SlotNo>,
) -> ObjectResult<usize> {
    let reclaimed = page.compact(last_slot);
    insert(pool, entry, page)?;
    Ok(reclaimed)
}

/// Unlinks `page` from the bucket recorded in its header, if any.
pub fn remove(
    pool: &BufferPool,
    entry: &mut FileEntry,
    page: &mut SlottedPage<&mut [u8]>,
) -> ObjectResult<()> {
    let header = page.header();
    let Some(bucket) = header.space_bucket() else {
        return Ok(());
    };
    let page_no = header.page_id().page_no;
    let prev = header.space_prev();
    let next = header.space_next();

    if prev == Some(page_no) || next == Some(page_no) {
        return Err(ObjectError::corrupted(
            entry.page(page_no),
            "space list links to itself",
        ));
    }

    match prev {
        Some(prev_no) => {
            let mut guard = pool.fetch_page_for_write(entry.page(prev_no))?;
            let mut data = guard.data_mut();
            SlottedPage::new(&mut data[..])
                .header_mut()
                .set_space_next(next);
        }
        None => entry.space_heads[bucket] = next,
    }

    if let Some(next_no) = next {
        let mut guard = pool.fetch_page_for_write(entry.page(next_no))?;
        let mut data = guard.data_mut();
        SlottedPage::new(&mut data[..])
            .header_mut()
            .set_space_prev(prev);
    }

    let mut header = page.header_mut();
    header.set_space_bucket(None);
    header.set_space_prev(None);
    header.set_space_next(None);

    trace!("Unlinked page {} from space list {}", page_no, bucket);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_common::types::{FileId, PageId, VolumeId};
    use strata_storage::buffer::BufferPoolConfig;
    use strata_storage::page::ObjectHeader;
    use strata_storage::store::MemoryStore;

    const VOL: VolumeId = VolumeId::new(1);
    const CAPACITY: usize = 4048;

    fn setup() -> (BufferPool, FileEntry) {
        let store = Arc::new(MemoryStore::new(4096));
        let pool = BufferPool::new(BufferPoolConfig::new(16).with_page_size(4096), store).unwrap();
        let entry = FileEntry {
            volume: VOL,
            file_id: FileId::new(1),
            first_page: PageNo::new(1),
            last_page: PageNo::new(1),
            fill_factor: 100,
            space_heads: [None; SPACE_LIST_BUCKETS],
        };
        (pool, entry)
    }

    /// Creates page `no` holding one object of `fill` bytes.
    fn make_page(pool: &BufferPool, no: u32, fill: usize) {
        let page_id = PageId::new(VOL, PageNo::new(no));
        let mut guard = pool.new_page(page_id).unwrap();
        let mut data = guard.data_mut();
        let mut page = SlottedPage::new(&mut data[..]);
        page.init_data_page(page_id, FileId::new(1));
        if fill > 0 {
            page.insert_object(ObjectHeader::new(0, 0, fill as u32), &vec![1; fill])
                .unwrap();
        }
    }

    fn with_page<R>(
        pool: &BufferPool,
        no: u32,
        f: impl FnOnce(&mut SlottedPage<&mut [u8]>) -> R,
    ) -> R {
        let mut guard = pool
            .fetch_page_for_write(PageId::new(VOL, PageNo::new(no)))
            .unwrap();
        let mut data = guard.data_mut();
        let mut page = SlottedPage::new(&mut data[..]);
        f(&mut page)
    }

    fn links(pool: &BufferPool, no: u32) -> (Option<usize>, Option<PageNo>, Option<PageNo>) {
        with_page(pool, no, |page| {
            let header = page.header();
            (header.space_bucket(), header.space_prev(), header.space_next())
        })
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(thresholds(CAPACITY), [404, 809, 1214, 1619, 2024]);
    }

    #[test]
    fn test_bucket_for() {
        assert_eq!(bucket_for(CAPACITY, 0), None);
        assert_eq!(bucket_for(CAPACITY, 403), None);
        assert_eq!(bucket_for(CAPACITY, 404), Some(0));
        assert_eq!(bucket_for(CAPACITY, 1500), Some(2));
        assert_eq!(bucket_for(CAPACITY, CAPACITY), Some(4));
    }

    #[test]
    fn test_smallest_fit_skips_small_buckets() {
        let (_, mut entry) = setup();
        entry.space_heads[1] = Some(PageNo::new(7));
        entry.space_heads[3] = Some(PageNo::new(9));

        assert_eq!(smallest_fit(&entry, CAPACITY, 100), Some((1, PageNo::new(7))));
        assert_eq!(smallest_fit(&entry, CAPACITY, 1000), Some((3, PageNo::new(9))));
        assert_eq!(smallest_fit(&entry, CAPACITY, 1700), None);
    }

    #[test]
    fn test_insert_and_remove() {
        let (pool, mut entry) = setup();
        make_page(&pool, 1, 0);
        make_page(&pool, 2, 0);
        make_page(&pool, 3, 3000);

        with_page(&pool, 1, |page| insert(&pool, &mut entry, page)).unwrap();
        with_page(&pool, 2, |page| insert(&pool, &mut entry, page)).unwrap();
        with_page(&pool, 3, |page| insert(&pool, &mut entry, page)).unwrap();

        assert_eq!(entry.space_heads[4], Some(PageNo::new(2)));
        assert_eq!(links(&pool, 2), (Some(4), None, Some(PageNo::new(1))));
        assert_eq!(links(&pool, 1), (Some(4), Some(PageNo::new(2)), None));
        // 4048 - 3008 - 8 = 1032 contiguous bytes.
        assert_eq!(entry.space_heads[1], Some(PageNo::new(3)));

        with_page(&pool, 2, |page| remove(&pool, &mut entry, page)).unwrap();
        assert_eq!(entry.space_heads[4], Some(PageNo::new(1)));
        assert_eq!(links(&pool, 1), (Some(4), None, None));
        assert_eq!(links(&pool, 2), (None, None, None));
    }

    #[test]
    fn test_remove_middle() {
        let (pool, mut entry) = setup();
        for no in 1..=3 {
            make_page(&pool, no, 0);
            with_page(&pool, no, |page| insert(&pool, &mut entry, page)).unwrap();
        }
        // List order is 3, 2, 1.
        with_page(&pool, 2, |page| remove(&pool, &mut entry, page)).unwrap();
        assert_eq!(links(&pool, 3), (Some(4), None, Some(PageNo::new(1))));
        assert_eq!(links(&pool, 1), (Some(4), Some(PageNo::new(3)), None));
    }

    #[test]
    fn test_insert_moves_linked_page() {
        let (pool, mut entry) = setup();
        make_page(&pool, 1, 0);
        with_page(&pool, 1, |page| insert(&pool, &mut entry, page)).unwrap();

        with_page(&pool, 1, |page| {
            page.insert_object(ObjectHeader::new(0, 0, 3000), &[0; 3000])
                .unwrap();
            insert(&pool, &mut entry, page)
        })
        .unwrap();

        assert_eq!(entry.space_heads[4], None);
        assert_eq!(entry.space_heads[1], Some(PageNo::new(1)));
    }

    #[test]
    fn test_full_page_stays_unlinked() {
        let (pool, mut entry) = setup();
        make_page(&pool, 1, 3800);
        with_page(&pool, 1, |page| insert(&pool, &mut entry, page)).unwrap();
        assert_eq!(entry.space_heads, [None; SPACE_LIST_BUCKETS]);
        assert_eq!(links(&pool, 1).0, None);
    }
}
