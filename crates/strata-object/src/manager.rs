//! Object manager.
//!
//! [`ObjectManager`] ties the buffer pool, the extent allocator, and the
//! catalog of one volume together. The object operations themselves live in
//! their own modules (`create`, `destroy`, `scan`, `read`, `verify`) as
//! further `impl ObjectManager` blocks.

use std::sync::Arc;

use strata_common::config::StorageConfig;
use strata_common::types::{FileId, PageId, SlotNo, VolumeId};
use strata_storage::alloc::ExtentAllocator;
use strata_storage::buffer::{BufferPool, BufferPoolConfig};
use strata_storage::page::SlottedPage;
use strata_storage::store::{MemoryStore, PageStore};
use tracing::debug;

use crate::catalog::{self, CatalogRef, FileEntry};
use crate::dealloc::DeallocList;
use crate::error::{ObjectError, ObjectResult};
use crate::file_map;
use crate::space_list;

/// Volume used by [`ObjectManager::in_memory`].
pub const DEFAULT_VOLUME: VolumeId = VolumeId::new(1);

/// Occupancy of one data page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    /// Slot-array entries, empty ones included.
    pub n_slots: u16,
    /// Slots holding an object.
    pub live_slots: usize,
    /// Start of contiguous free space in the data area.
    pub free: usize,
    /// Bytes held by holes before `free`.
    pub unused: usize,
    /// Contiguous free bytes between `free` and the slot array.
    pub contiguous_free: usize,
    /// Free-space bucket the page is linked into.
    pub space_bucket: Option<usize>,
}

/// Manages variable-length objects stored in slotted pages.
///
/// # Example
///
/// ```rust
/// use strata_common::config::StorageConfig;
/// use strata_object::{DeallocList, ObjectManager, ObjectSpec};
///
/// let manager = ObjectManager::in_memory(StorageConfig::for_testing()).unwrap();
/// let file = manager.create_file(None).unwrap();
///
/// let oid = manager
///     .create_object(file, None, &ObjectSpec::new(b"hello"))
///     .unwrap();
/// assert_eq!(manager.read_object(file, oid, 0, None).unwrap(), b"hello");
///
/// let first = manager.next_object(file, None).unwrap().unwrap();
/// assert_eq!(first.oid, oid);
///
/// let mut dealloc = DeallocList::new();
/// manager.destroy_object(file, oid, &mut dealloc).unwrap();
/// assert!(manager.next_object(file, None).unwrap().is_none());
/// ```
pub struct ObjectManager {
    /// Storage configuration.
    config: StorageConfig,
    /// Volume holding the catalog and every file.
    volume: VolumeId,
    /// Page cache in front of the store.
    pool: Arc<BufferPool>,
    /// Raw page allocator.
    allocator: Arc<ExtentAllocator>,
    /// Catalog page of the volume.
    catalog_page: PageId,
}

impl ObjectManager {
    /// Formats a fresh volume on `store` and returns its manager.
    pub fn new(
        config: StorageConfig,
        store: Arc<dyn PageStore>,
        volume: VolumeId,
    ) -> ObjectResult<Self> {
        let (pool, allocator) = Self::build(&config, store, volume)?;
        let catalog_page = allocator.allocate_extent_head(volume)?;
        catalog::init_catalog_page(&pool, catalog_page)?;

        debug!(
            "Created object manager on volume {} with catalog page {}",
            volume, catalog_page
        );
        Ok(Self {
            config,
            volume,
            pool,
            allocator,
            catalog_page,
        })
    }

    /// Creates a manager over a fresh in-memory store.
    pub fn in_memory(config: StorageConfig) -> ObjectResult<Self> {
        let store = Arc::new(MemoryStore::new(config.page_size));
        Self::new(config, store, DEFAULT_VOLUME)
    }

    /// Opens a volume previously formatted by [`ObjectManager::new`].
    ///
    /// Allocation state is rebuilt from the catalog: the catalog page and
    /// every page reachable through a file's page chain are marked in use.
    /// Pages still waiting in an unreleased [`DeallocList`] are lost.
    pub fn open(
        config: StorageConfig,
        store: Arc<dyn PageStore>,
        volume: VolumeId,
        catalog_page: PageId,
    ) -> ObjectResult<Self> {
        let (pool, allocator) = Self::build(&config, store, volume)?;
        allocator.mark_allocated(catalog_page)?;

        let files = catalog::files(&pool, catalog_page)?;
        for (_, entry) in &files {
            for page_id in file_map::chain_pages(&pool, entry)? {
                allocator.mark_allocated(page_id)?;
            }
        }

        debug!(
            "Opened volume {} with {} files and {} pages in use",
            volume,
            files.len(),
            allocator.allocated_count(volume)?
        );
        Ok(Self {
            config,
            volume,
            pool,
            allocator,
            catalog_page,
        })
    }

    fn build(
        config: &StorageConfig,
        store: Arc<dyn PageStore>,
        volume: VolumeId,
    ) -> ObjectResult<(Arc<BufferPool>, Arc<ExtentAllocator>)> {
        config.validate().map_err(|err| ObjectError::InvalidConfig {
            message: err.to_string(),
        })?;

        let pool = BufferPool::new(BufferPoolConfig::from_storage_config(config), store)?;
        let allocator = ExtentAllocator::new(config.extent_size);
        allocator.add_volume(volume, config.volume_pages)?;
        Ok((Arc::new(pool), Arc::new(allocator)))
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// Creates an empty file.
    ///
    /// `fill_factor` defaults to the configured extent fill factor.
    pub fn create_file(&self, fill_factor: Option<u8>) -> ObjectResult<CatalogRef> {
        let fill_factor = fill_factor.unwrap_or(self.config.default_fill_factor);
        if fill_factor == 0 || fill_factor > 100 {
            return Err(ObjectError::InvalidConfig {
                message: format!("fill factor {fill_factor} is outside 1..=100"),
            });
        }
        catalog::create_file(&self.pool, &self.allocator, self.catalog_page, fill_factor)
    }

    /// Returns the catalog entry of `file`.
    pub fn file_entry(&self, file: CatalogRef) -> ObjectResult<FileEntry> {
        catalog::read_entry(&self.pool, file)
    }

    /// Returns every file of the volume.
    pub fn files(&self) -> ObjectResult<Vec<(CatalogRef, FileEntry)>> {
        catalog::files(&self.pool, self.catalog_page)
    }

    /// Returns the pages of `file` in chain order.
    pub fn file_pages(&self, file: CatalogRef) -> ObjectResult<Vec<PageId>> {
        let entry = self.file_entry(file)?;
        file_map::chain_pages(&self.pool, &entry)
    }

    // -------------------------------------------------------------------------
    // Pages
    // -------------------------------------------------------------------------

    /// Compacts a data page of `file` and returns the bytes reclaimed.
    ///
    /// If `last_slot` names a live slot, its object is placed last so it
    /// borders the free region. The page is relinked into the space list
    /// matching its new contiguous free space.
    pub fn compact_page(
        &self,
        file: CatalogRef,
        page_id: PageId,
        last_slot: Option<SlotNo>,
    ) -> ObjectResult<usize> {
        let mut entry = catalog::read_entry(&self.pool, file)?;
        if page_id.volume != entry.volume {
            return Err(ObjectError::NotDataPage { page_id });
        }

        let reclaimed = {
            let mut guard = self.pool.fetch_page_for_write(page_id)?;
            let mut data = guard.data_mut();
            let mut page = SlottedPage::new(&mut data[..]);
            if !is_file_page(&page, entry.file_id) {
                return Err(ObjectError::NotDataPage { page_id });
            }
            space_list::compact(&self.pool, &mut entry, &mut page, last_slot)?
        };

        catalog::write_entry(&self.pool, file, &entry)?;
        debug!("Compacted page {}, reclaimed {} bytes", page_id, reclaimed);
        Ok(reclaimed)
    }

    /// Returns the occupancy of a data page.
    pub fn page_stats(&self, page_id: PageId) -> ObjectResult<PageStats> {
        let guard = self.pool.fetch_page(page_id)?;
        let data = guard.data();
        let page = SlottedPage::new(&data[..]);
        if !page.header().page_type().is_data_page() {
            return Err(ObjectError::NotDataPage { page_id });
        }

        Ok(PageStats {
            n_slots: page.n_slots(),
            live_slots: page.live_slot_count(),
            free: page.free(),
            unused: page.unused(),
            contiguous_free: page.contiguous_free(),
            space_bucket: page.header().space_bucket(),
        })
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Frees every page queued in `dealloc`.
    pub fn release(&self, dealloc: &mut DeallocList) -> ObjectResult<usize> {
        dealloc.release(&self.pool, &self.allocator)
    }

    /// Writes every dirty page back to the store.
    pub fn flush(&self) -> ObjectResult<usize> {
        Ok(self.pool.flush_all()?)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Returns the storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the volume this manager owns.
    pub fn volume(&self) -> VolumeId {
        self.volume
    }

    /// Returns the catalog page.
    pub fn catalog_page(&self) -> PageId {
        self.catalog_page
    }

    /// Returns the buffer pool.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Returns the page allocator.
    pub fn allocator(&self) -> &Arc<ExtentAllocator> {
        &self.allocator
    }

    /// Upper bound on the pages of any file, used to stop walks over
    /// corrupted chains.
    pub(crate) fn max_pages(&self) -> usize {
        self.config.volume_pages as usize
    }
}

impl std::fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectManager")
            .field("volume", &self.volume)
            .field("catalog_page", &self.catalog_page)
            .field("page_size", &self.config.page_size)
            .finish()
    }
}

/// Returns true if `page` is a data page of the file `file_id`.
pub(crate) fn is_file_page<T: AsRef<[u8]>>(page: &SlottedPage<T>, file_id: FileId) -> bool {
    let header = page.header();
    header.page_type().is_data_page() && header.file_id() == file_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectSpec;
    use strata_storage::store::FileStore;
    use tempfile::tempdir;

    fn manager() -> ObjectManager {
        ObjectManager::in_memory(StorageConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_invalid_config() {
        let config = StorageConfig {
            page_size: 3000,
            ..StorageConfig::for_testing()
        };
        assert!(matches!(
            ObjectManager::in_memory(config),
            Err(ObjectError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_create_file_fill_factor() {
        let manager = manager();
        let file = manager.create_file(Some(60)).unwrap();
        assert_eq!(manager.file_entry(file).unwrap().fill_factor, 60);
        assert!(matches!(
            manager.create_file(Some(0)),
            Err(ObjectError::InvalidConfig { .. })
        ));
        assert_eq!(manager.files().unwrap().len(), 1);
    }

    #[test]
    fn test_page_stats_and_compact() {
        let manager = manager();
        let file = manager.create_file(None).unwrap();
        let a = manager
            .create_object(file, None, &ObjectSpec::new(&[1; 100]))
            .unwrap();
        manager
            .create_object(file, None, &ObjectSpec::new(&[2; 100]))
            .unwrap();

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, a, &mut dealloc).unwrap();

        let stats = manager.page_stats(a.page_id()).unwrap();
        assert_eq!(stats.n_slots, 2);
        assert_eq!(stats.live_slots, 1);
        assert_eq!(stats.unused, 108);
        assert_eq!(stats.free, 216);

        assert_eq!(manager.compact_page(file, a.page_id(), None).unwrap(), 108);
        let stats = manager.page_stats(a.page_id()).unwrap();
        assert_eq!(stats.unused, 0);
        assert_eq!(stats.free, 108);
    }

    #[test]
    fn test_compact_moves_page_to_matching_space_list() {
        let manager = manager();
        let file = manager.create_file(None).unwrap();
        let oids: Vec<_> = (0..7)
            .map(|_| {
                manager
                    .create_object(file, None, &ObjectSpec::new(&[3; 500]))
                    .unwrap()
            })
            .collect();
        let page_id = oids[0].page_id();
        assert!(oids.iter().all(|oid| oid.page_id() == page_id));

        let mut dealloc = DeallocList::new();
        manager.destroy_object(file, oids[1], &mut dealloc).unwrap();
        manager.destroy_object(file, oids[3], &mut dealloc).unwrap();
        let stats = manager.page_stats(page_id).unwrap();
        assert_eq!(stats.contiguous_free, 436);
        assert_eq!(stats.space_bucket, Some(0));

        assert_eq!(manager.compact_page(file, page_id, None).unwrap(), 1016);
        let stats = manager.page_stats(page_id).unwrap();
        assert_eq!(stats.contiguous_free, 1452);
        assert_eq!(stats.space_bucket, Some(2));

        let entry = manager.file_entry(file).unwrap();
        assert_eq!(entry.space_heads[0], None);
        assert_eq!(entry.space_heads[2], Some(page_id.page_no));
        manager.verify_file(file).unwrap();
    }

    #[test]
    fn test_compact_rejects_page_of_other_file() {
        let manager = manager();
        let file = manager.create_file(None).unwrap();
        let other = manager.create_file(None).unwrap();
        let oid = manager
            .create_object(file, None, &ObjectSpec::new(&[1; 10]))
            .unwrap();

        assert!(matches!(
            manager.compact_page(other, oid.page_id(), None),
            Err(ObjectError::NotDataPage { .. })
        ));
        assert!(matches!(
            manager.compact_page(file, manager.catalog_page(), None),
            Err(ObjectError::NotDataPage { .. })
        ));
    }

    #[test]
    fn test_page_stats_rejects_catalog_page() {
        let manager = manager();
        assert!(matches!(
            manager.page_stats(manager.catalog_page()),
            Err(ObjectError::NotDataPage { .. })
        ));
    }

    #[test]
    fn test_reopen_file_store() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::for_testing();
        let volume = VolumeId::new(2);

        let (file, catalog_page, oid, pages_in_use) = {
            let store = Arc::new(FileStore::open(dir.path(), config.page_size).unwrap());
            let manager = ObjectManager::new(config.clone(), store, volume).unwrap();
            let file = manager.create_file(None).unwrap();
            let mut oid = None;
            for i in 0..200u32 {
                let payload = i.to_le_bytes().repeat(20);
                oid = Some(manager.create_object(file, None, &ObjectSpec::new(&payload)).unwrap());
            }
            manager.flush().unwrap();
            let in_use = manager.allocator().allocated_count(volume).unwrap();
            (file, manager.catalog_page(), oid.unwrap(), in_use)
        };

        let store = Arc::new(FileStore::open(dir.path(), config.page_size).unwrap());
        let manager = ObjectManager::open(config, store, volume, catalog_page).unwrap();
        assert_eq!(
            manager.allocator().allocated_count(volume).unwrap(),
            pages_in_use
        );
        assert_eq!(
            manager.read_object(file, oid, 0, Some(4)).unwrap(),
            199u32.to_le_bytes()
        );
        assert!(manager.file_pages(file).unwrap().len() > 1);
    }
}
