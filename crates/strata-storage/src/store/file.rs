//! File-backed page store.
//!
//! Each volume lives in its own file `vol-<id>.dat` inside the store
//! directory; page `n` is stored at byte offset `n * page_size`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use strata_common::types::{PageId, VolumeId};
use tracing::debug;

use super::{check_buffer, PageStore, StoreError, StoreResult};

/// Page store backed by one file per volume.
pub struct FileStore {
    dir: PathBuf,
    page_size: usize,
    volumes: RwLock<HashMap<VolumeId, Arc<Mutex<File>>>>,
}

impl FileStore {
    /// Opens (creating if necessary) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>, page_size: usize) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Open {
            path: dir.clone(),
            source,
        })?;
        debug!("Opened page store at {} (page size {})", dir.display(), page_size);
        Ok(Self {
            dir,
            page_size,
            volumes: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the directory holding the volume files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn volume_path(&self, volume: VolumeId) -> PathBuf {
        self.dir.join(format!("vol-{}.dat", volume.as_u16()))
    }

    fn volume_file(&self, volume: VolumeId) -> StoreResult<Arc<Mutex<File>>> {
        if let Some(file) = self.volumes.read().get(&volume) {
            return Ok(Arc::clone(file));
        }

        let mut volumes = self.volumes.write();
        if let Some(file) = volumes.get(&volume) {
            return Ok(Arc::clone(file));
        }

        let path = self.volume_path(volume);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StoreError::Open { path, source })?;
        let file = Arc::new(Mutex::new(file));
        volumes.insert(volume, Arc::clone(&file));
        Ok(file)
    }

    fn offset(&self, page_id: PageId) -> u64 {
        u64::from(page_id.page_no.as_u32()) * self.page_size as u64
    }
}

impl PageStore for FileStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> StoreResult<()> {
        check_buffer(self.page_size, buf.len())?;
        let file = self.volume_file(page_id.volume)?;
        let mut file = file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;

        let mut total = 0;
        while total < buf.len() {
            let n = file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        // Past end of file: the page was never written.
        buf[total..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> StoreResult<()> {
        check_buffer(self.page_size, buf.len())?;
        let file = self.volume_file(page_id.volume)?;
        let mut file = file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn sync(&self) -> StoreResult<()> {
        for file in self.volumes.read().values() {
            file.lock().sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("page_size", &self.page_size)
            .field("open_volumes", &self.volumes.read().len())
            .finish()
    }
}
