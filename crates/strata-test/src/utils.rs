//! Fixtures shared by the integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use strata_common::config::StorageConfig;
use strata_common::types::{ObjectId, PageId, VolumeId};
use strata_object::{CatalogRef, ObjectManager, ObjectResult, ObjectSpec, ScanItem};
use strata_storage::store::{MemoryStore, PageStore, StoreError, StoreResult};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-writer `fmt` subscriber once per process.
///
/// `RUST_LOG` overrides the default of warnings from the Strata crates.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("strata_object=warn,strata_storage=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// An object manager with one file.
pub struct TestVolume {
    /// The manager under test.
    pub manager: ObjectManager,
    /// The file all helpers operate on.
    pub file: CatalogRef,
}

impl TestVolume {
    /// Creates an in-memory volume with the test configuration.
    pub fn in_memory() -> Self {
        Self::with_config(StorageConfig::for_testing())
    }

    /// Creates an in-memory volume with `config`.
    pub fn with_config(config: StorageConfig) -> Self {
        init_tracing();
        let manager = ObjectManager::in_memory(config).expect("failed to create manager");
        let file = manager.create_file(None).expect("failed to create file");
        Self { manager, file }
    }

    /// Creates a volume over `store`.
    pub fn on_store(config: StorageConfig, store: Arc<dyn PageStore>, volume: VolumeId) -> Self {
        init_tracing();
        let manager = ObjectManager::new(config, store, volume).expect("failed to create manager");
        let file = manager.create_file(None).expect("failed to create file");
        Self { manager, file }
    }

    /// Creates an object holding `payload`.
    pub fn create(&self, payload: &[u8]) -> ObjectId {
        self.manager
            .create_object(self.file, None, &ObjectSpec::new(payload))
            .expect("create failed")
    }

    /// Creates an object holding `payload` near `near`.
    pub fn create_near(&self, near: ObjectId, payload: &[u8]) -> ObjectId {
        self.manager
            .create_object(self.file, Some(near), &ObjectSpec::new(payload))
            .expect("create failed")
    }

    /// Reads the whole payload of `oid`.
    pub fn read(&self, oid: ObjectId) -> Vec<u8> {
        self.manager
            .read_object(self.file, oid, 0, None)
            .expect("read failed")
    }

    /// Returns every object in forward scan order.
    pub fn scan_forward(&self) -> ObjectResult<Vec<ScanItem>> {
        scan_forward(&self.manager, self.file)
    }

    /// Returns every object in backward scan order.
    pub fn scan_backward(&self) -> ObjectResult<Vec<ScanItem>> {
        scan_backward(&self.manager, self.file)
    }

    /// Returns the pages of the file in chain order.
    pub fn pages(&self) -> Vec<PageId> {
        self.manager.file_pages(self.file).expect("chain walk failed")
    }
}

/// Collects the objects of `file` with repeated `next_object` calls.
pub fn scan_forward(manager: &ObjectManager, file: CatalogRef) -> ObjectResult<Vec<ScanItem>> {
    let mut items = Vec::new();
    let mut current = None;
    while let Some(item) = manager.next_object(file, current)? {
        current = Some(item.oid);
        items.push(item);
    }
    Ok(items)
}

/// Collects the objects of `file` with repeated `prev_object` calls.
pub fn scan_backward(manager: &ObjectManager, file: CatalogRef) -> ObjectResult<Vec<ScanItem>> {
    let mut items = Vec::new();
    let mut current = None;
    while let Some(item) = manager.prev_object(file, current)? {
        current = Some(item.oid);
        items.push(item);
    }
    Ok(items)
}

/// Deterministic payload of `len` bytes derived from `seed`.
pub fn payload(seed: u32, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (seed as usize).wrapping_mul(31).wrapping_add(i) as u8)
        .collect()
}

/// Memory store that fails reads or writes on demand.
#[derive(Debug)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FailingStore {
    /// Creates a store that does not fail yet.
    pub fn new(page_size: usize) -> Self {
        Self {
            inner: MemoryStore::new(page_size),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Makes every following read fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every following write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of reads attempted.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns the number of writes attempted.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PageStore for FailingStore {
    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::failed(page_id, "injected read failure"));
        }
        self.inner.read_page(page_id, buf)
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::failed(page_id, "injected write failure"));
        }
        self.inner.write_page(page_id, buf)
    }

    fn sync(&self) -> StoreResult<()> {
        self.inner.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::PageNo;

    #[test]
    fn test_payload_is_deterministic() {
        assert_eq!(payload(3, 16), payload(3, 16));
        assert_ne!(payload(3, 16), payload(4, 16));
        assert_eq!(payload(0, 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failing_store_switches() {
        let store = FailingStore::new(1024);
        let page_id = PageId::new(VolumeId::new(1), PageNo::new(1));
        let mut buf = vec![0u8; 1024];

        store.write_page(page_id, &buf).unwrap();
        store.fail_writes(true);
        assert!(store.write_page(page_id, &buf).is_err());
        store.fail_reads(true);
        assert!(store.read_page(page_id, &mut buf).is_err());
        store.fail_reads(false);
        store.read_page(page_id, &mut buf).unwrap();

        assert_eq!(store.writes(), 2);
        assert_eq!(store.reads(), 2);
    }

    #[test]
    fn test_volume_fixture() {
        let vol = TestVolume::in_memory();
        let oid = vol.create(b"fixture");
        assert_eq!(vol.read(oid), b"fixture");
        assert_eq!(vol.scan_forward().unwrap().len(), 1);
        assert_eq!(vol.pages().len(), 1);
    }
}
