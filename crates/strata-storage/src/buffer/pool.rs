//! Buffer pool implementation.
//!
//! The buffer pool manages a fixed-size cache of pages in memory,
//! handling page fetching, eviction, and flushing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use strata_common::types::PageId;
use tracing::{debug, trace, warn};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::eviction::ClockReplacer;
use super::frame::{BufferFrame, FrameId};
use super::guard::{PageReadGuard, PageWriteGuard};
use super::BufferPoolStats;
use crate::page::PageHeader;
use crate::store::PageStore;

/// The buffer pool manages page caching for a page store.
///
/// It provides:
/// - Pin/unpin through RAII guards
/// - Page replacement with the clock algorithm
/// - Dirty page tracking and write-back
/// - Checksums stamped on write-back and verified on read
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<Arc<BufferFrame>>,
    /// Page table: maps PageId -> FrameId.
    page_table: RwLock<HashMap<PageId, FrameId>>,
    /// Clock replacer for eviction.
    replacer: ClockReplacer,
    /// Backing page store.
    store: Arc<dyn PageStore>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a new buffer pool over `store`.
    pub fn new(config: BufferPoolConfig, store: Arc<dyn PageStore>) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        if store.page_size() != config.page_size {
            return Err(BufferError::config(format!(
                "store page size {} does not match pool page size {}",
                store.page_size(),
                config.page_size
            )));
        }

        let num_frames = config.num_frames;
        let frames: Vec<Arc<BufferFrame>> = (0..num_frames)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i), config.page_size)))
            .collect();

        debug!(
            "Created buffer pool with {} frames of {} bytes",
            num_frames, config.page_size
        );

        Ok(Self {
            config,
            frames,
            page_table: RwLock::new(HashMap::with_capacity(num_frames)),
            replacer: ClockReplacer::new(num_frames),
            store,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Fetches a page for reading.
    ///
    /// If the page is in the buffer pool, returns it directly.
    /// Otherwise, reads it from the store into a frame.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageReadGuard> {
        let frame = self.pin_page(page_id)?;
        Ok(PageReadGuard::new(frame, page_id))
    }

    /// Fetches a page for writing.
    pub fn fetch_page_for_write(&self, page_id: PageId) -> BufferResult<PageWriteGuard> {
        let frame = self.pin_page(page_id)?;
        Ok(PageWriteGuard::new(frame, page_id))
    }

    /// Pins a zeroed frame for a freshly allocated page.
    ///
    /// The store is not read; the page is dirty from the start.
    pub fn new_page(&self, page_id: PageId) -> BufferResult<PageWriteGuard> {
        let mut page_table = self.page_table.write();
        if page_table.contains_key(&page_id) {
            return Err(BufferError::PageAlreadyExists { page_id });
        }

        let frame = self.get_or_evict_frame(&mut page_table)?;
        frame.write_data().fill(0);
        frame.set_page_id(page_id);
        frame.set_dirty(true);
        frame.pin();
        page_table.insert(page_id, frame.frame_id());

        trace!("New page {} in frame {}", page_id, frame.frame_id().index());
        Ok(PageWriteGuard::new(frame, page_id))
    }

    /// Flushes a specific page to the store.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<()> {
        let frame = self
            .get_cached_frame(page_id)
            .ok_or(BufferError::PageNotFound { page_id })?;

        if frame.is_dirty() {
            self.write_page_to_store(&frame)?;
            frame.set_dirty(false);
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Flushes all dirty pages and syncs the store.
    ///
    /// Returns the number of pages written.
    pub fn flush_all(&self) -> BufferResult<usize> {
        let _page_table = self.page_table.read();
        let mut flushed = 0;

        for frame in &self.frames {
            if frame.is_dirty() && !frame.is_empty() {
                self.write_page_to_store(frame)?;
                frame.set_dirty(false);
                flushed += 1;
            }
        }

        self.store.sync()?;
        self.flush_count.fetch_add(flushed as u64, Ordering::Relaxed);
        debug!("Flushed {} dirty pages", flushed);
        Ok(flushed)
    }

    /// Drops the cached image of `page_id` without writing it back.
    ///
    /// Used when a page is returned to the allocator, after its retired
    /// image has been flushed. Does nothing if the page is not cached.
    pub fn discard_page(&self, page_id: PageId) -> BufferResult<()> {
        let mut page_table = self.page_table.write();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return Ok(());
        };

        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return Err(BufferError::PagePinned { page_id });
        }

        page_table.remove(&page_id);
        frame.reset();
        trace!("Discarded page {}", page_id);
        Ok(())
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;

        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    /// Returns the number of frames in the buffer pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns true if a page is in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Returns the pin count of a cached page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.get_cached_frame(page_id).map(|frame| frame.pin_count())
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Gets a cached frame if the page is in the buffer pool.
    fn get_cached_frame(&self, page_id: PageId) -> Option<Arc<BufferFrame>> {
        let page_table = self.page_table.read();
        page_table
            .get(&page_id)
            .map(|frame_id| Arc::clone(&self.frames[frame_id.index()]))
    }

    /// Pins `page_id`, loading it from the store on a miss.
    ///
    /// Frames are pinned while the page table lock is held, so a frame
    /// found in the table cannot be evicted before its pin lands.
    fn pin_page(&self, page_id: PageId) -> BufferResult<Arc<BufferFrame>> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        {
            let page_table = self.page_table.read();
            if let Some(&frame_id) = page_table.get(&page_id) {
                let frame = Arc::clone(&self.frames[frame_id.index()]);
                frame.pin();
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                return Ok(frame);
            }
        }

        let mut page_table = self.page_table.write();
        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = Arc::clone(&self.frames[frame_id.index()]);
            frame.pin();
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(frame);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame = self.get_or_evict_frame(&mut page_table)?;
        self.read_page_from_store(page_id, &frame)?;

        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        page_table.insert(page_id, frame.frame_id());

        Ok(frame)
    }

    /// Gets a free frame or evicts one.
    fn get_or_evict_frame(
        &self,
        page_table: &mut HashMap<PageId, FrameId>,
    ) -> BufferResult<Arc<BufferFrame>> {
        if let Some(frame_id) = self.replacer.find_free_frame(&self.frames) {
            return Ok(Arc::clone(&self.frames[frame_id.index()]));
        }

        let frame_id = self
            .replacer
            .find_victim(&self.frames)
            .ok_or(BufferError::NoFreeFrames)?;
        let frame = Arc::clone(&self.frames[frame_id.index()]);

        if frame.is_dirty() {
            self.write_page_to_store(&frame)?;
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(old_page_id) = frame.page_id() {
            page_table.remove(&old_page_id);
            trace!("Evicted page {} from frame {}", old_page_id, frame_id.index());
        }

        frame.reset();
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        Ok(frame)
    }

    /// Reads a page from the store into a frame and verifies its checksum.
    fn read_page_from_store(&self, page_id: PageId, frame: &BufferFrame) -> BufferResult<()> {
        let mut data = frame.write_data();
        self.store.read_page(page_id, &mut data[..])?;

        if self.config.verify_checksums {
            let header = PageHeader::new(&data[..]);
            // Never-written pages are all zeros and carry no checksum.
            if header.is_valid_magic() && !header.verify_checksum() {
                warn!("Checksum mismatch on page {}", page_id);
                return Err(BufferError::ChecksumMismatch {
                    page_id,
                    expected: header.checksum(),
                    actual: header.compute_checksum(),
                });
            }
        }

        Ok(())
    }

    /// Writes a page from a frame to the store, stamping its checksum.
    fn write_page_to_store(&self, frame: &BufferFrame) -> BufferResult<()> {
        let Some(page_id) = frame.page_id() else {
            return Ok(());
        };

        let mut data = frame.write_data();
        let mut header = PageHeader::new(&mut data[..]);
        if header.is_valid_magic() {
            header.update_checksum();
        }
        self.store.write_page(page_id, &data[..])?;

        Ok(())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("num_frames", &self.config.num_frames)
            .field("page_size", &self.config.page_size)
            .field("pages_cached", &self.page_table.read().len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageType;
    use crate::store::{FileStore, MemoryStore, StoreError};
    use strata_common::types::{FileId, PageNo, VolumeId};
    use tempfile::tempdir;

    const PAGE: usize = 1024;

    fn page(no: u32) -> PageId {
        PageId::new(VolumeId::new(1), PageNo::new(no))
    }

    fn create_test_pool(num_frames: usize) -> (BufferPool, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(PAGE));
        let config = BufferPoolConfig::new(num_frames).with_page_size(PAGE);
        let pool = BufferPool::new(config, Arc::clone(&store) as Arc<dyn PageStore>).unwrap();
        (pool, store)
    }

    fn write_header(guard: &mut PageWriteGuard) {
        let page_id = guard.page_id();
        let mut data = guard.data_mut();
        PageHeader::new(&mut data[..]).initialize(page_id, FileId::new(1), PageType::Data);
    }

    #[test]
    fn test_pool_creation() {
        let (pool, _) = create_test_pool(16);
        assert_eq!(pool.num_frames(), 16);
        assert_eq!(pool.page_size(), PAGE);
    }

    #[test]
    fn test_page_size_mismatch() {
        let store: Arc<dyn PageStore> = Arc::new(MemoryStore::new(2048));
        let config = BufferPoolConfig::new(16).with_page_size(PAGE);
        assert!(matches!(
            BufferPool::new(config, store),
            Err(BufferError::Config { .. })
        ));
    }

    #[test]
    fn test_new_page() {
        let (pool, _) = create_test_pool(16);
        let guard = pool.new_page(page(1)).unwrap();
        assert_eq!(guard.page_id(), page(1));
        assert!(pool.contains(page(1)));
        assert_eq!(pool.pin_count(page(1)), Some(1));
        assert!(guard.data().iter().all(|&b| b == 0));

        drop(guard);
        assert_eq!(pool.pin_count(page(1)), Some(0));
        assert!(matches!(
            pool.new_page(page(1)),
            Err(BufferError::PageAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_flush_and_refetch() {
        let (pool, store) = create_test_pool(16);
        {
            let mut guard = pool.new_page(page(0)).unwrap();
            write_header(&mut guard);
            guard.data_mut()[500..504].copy_from_slice(&[1, 2, 3, 4]);
        }

        pool.flush_page(page(0)).unwrap();
        assert_eq!(store.page_count(), 1);
        pool.discard_page(page(0)).unwrap();
        assert!(!pool.contains(page(0)));

        let guard = pool.fetch_page(page(0)).unwrap();
        assert_eq!(&guard.data()[500..504], &[1, 2, 3, 4]);
        assert!(PageHeader::new(&guard.data()[..]).verify_checksum());
    }

    #[test]
    fn test_cache_hit() {
        let (pool, _) = create_test_pool(16);
        drop(pool.new_page(page(0)).unwrap());
        drop(pool.fetch_page(page(0)).unwrap());

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_eviction_writes_back() {
        let (pool, store) = create_test_pool(8);
        for no in 0..20 {
            let mut guard = pool.new_page(page(no)).unwrap();
            write_header(&mut guard);
            guard.data_mut()[600] = no as u8;
        }

        assert!(pool.stats().evictions >= 12);
        assert!(store.page_count() >= 12);

        for no in 0..20 {
            let guard = pool.fetch_page(page(no)).unwrap();
            assert_eq!(guard.data()[600], no as u8);
        }
    }

    #[test]
    fn test_no_free_frames() {
        let (pool, _) = create_test_pool(8);
        let guards: Vec<_> = (0..8).map(|no| pool.new_page(page(no)).unwrap()).collect();
        assert!(matches!(
            pool.fetch_page(page(100)),
            Err(BufferError::NoFreeFrames)
        ));
        drop(guards);
        assert!(pool.fetch_page(page(100)).is_ok());
    }

    #[test]
    fn test_discard_pinned_page_fails() {
        let (pool, _) = create_test_pool(8);
        let _guard = pool.new_page(page(3)).unwrap();
        assert!(matches!(
            pool.discard_page(page(3)),
            Err(BufferError::PagePinned { .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let (pool, store) = create_test_pool(8);
        {
            let mut guard = pool.new_page(page(0)).unwrap();
            write_header(&mut guard);
        }
        pool.flush_all().unwrap();
        pool.discard_page(page(0)).unwrap();

        let mut image = vec![0u8; PAGE];
        store.read_page(page(0), &mut image).unwrap();
        image[900] ^= 0xFF;
        store.write_page(page(0), &image).unwrap();

        assert!(matches!(
            pool.fetch_page(page(0)),
            Err(BufferError::ChecksumMismatch { .. })
        ));
        assert!(!pool.contains(page(0)));
    }

    #[test]
    fn test_flush_all() {
        let (pool, _) = create_test_pool(16);
        for no in 0..5 {
            let mut guard = pool.new_page(page(no)).unwrap();
            guard.mark_dirty();
        }

        assert_eq!(pool.stats().dirty_frames, 5);
        assert_eq!(pool.flush_all().unwrap(), 5);
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_flush_uncached_page() {
        let (pool, _) = create_test_pool(8);
        assert!(matches!(
            pool.flush_page(page(9)),
            Err(BufferError::PageNotFound { .. })
        ));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn PageStore> = Arc::new(FileStore::open(dir.path(), PAGE).unwrap());
        let config = BufferPoolConfig::new(8).with_page_size(PAGE);
        {
            let pool = BufferPool::new(config.clone(), Arc::clone(&store)).unwrap();
            let mut guard = pool.new_page(page(4)).unwrap();
            write_header(&mut guard);
            guard.data_mut()[700] = 77;
            drop(guard);
            pool.flush_all().unwrap();
        }

        let pool = BufferPool::new(config, store).unwrap();
        let guard = pool.fetch_page(page(4)).unwrap();
        assert_eq!(guard.data()[700], 77);
    }

    #[test]
    fn test_store_error_propagates() {
        struct BrokenStore;

        impl PageStore for BrokenStore {
            fn page_size(&self) -> usize {
                PAGE
            }
            fn read_page(&self, page_id: PageId, _buf: &mut [u8]) -> crate::store::StoreResult<()> {
                Err(StoreError::failed(page_id, "broken"))
            }
            fn write_page(&self, page_id: PageId, _buf: &[u8]) -> crate::store::StoreResult<()> {
                Err(StoreError::failed(page_id, "broken"))
            }
            fn sync(&self) -> crate::store::StoreResult<()> {
                Ok(())
            }
        }

        let config = BufferPoolConfig::new(8).with_page_size(PAGE);
        let pool = BufferPool::new(config, Arc::new(BrokenStore)).unwrap();
        assert!(matches!(pool.fetch_page(page(1)), Err(BufferError::Store(_))));
        assert!(!pool.contains(page(1)));
    }
}
