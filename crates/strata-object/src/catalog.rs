//! File catalog.
//!
//! Each file is described by one fixed-size entry on a catalog page. The
//! entry holds the file's page chain ends, its extent fill factor, and the
//! heads of its free-space buckets. Entries are read and written through
//! the buffer pool; the catalog page is never kept pinned across an
//! operation.
//!
//! # Catalog Page Layout
//!
//! ```text
//! +----------------------+
//! |    Page Header       |  48 bytes, type Catalog, unique = last file id
//! +----------------------+
//! |    entry 0           |  40 bytes each
//! |    entry 1           |
//! |      ...             |
//! +----------------------+
//! ```
//!
//! Entry layout:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     in_use
//! 1       1     fill_factor
//! 2       2     reserved
//! 4       4     file_id
//! 8       4     first_page
//! 12      4     last_page
//! 16      20    space_heads[5]
//! 36      4     reserved
//! ```

use bytes::{Buf, BufMut};
use strata_common::constants::SPACE_LIST_BUCKETS;
use strata_common::types::{FileId, PageId, PageNo, Unique, VolumeId};
use strata_storage::alloc::ExtentAllocator;
use strata_storage::buffer::BufferPool;
use strata_storage::page::{PageHeader, PageType, SlottedPage, PAGE_HEADER_SIZE};
use tracing::debug;

use crate::error::{ObjectError, ObjectResult};
use crate::space_list;

/// Size of one catalog entry in bytes.
pub const CATALOG_ENTRY_SIZE: usize = 40;

const IN_USE: u8 = 1;

/// Reference to a file: a catalog page and an entry index on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogRef {
    /// Catalog page holding the entry.
    pub page: PageId,
    /// Entry index on the catalog page.
    pub index: u16,
}

impl CatalogRef {
    /// Creates a new catalog reference.
    #[inline]
    pub const fn new(page: PageId, index: u16) -> Self {
        Self { page, index }
    }

    #[inline]
    fn offset(&self) -> usize {
        PAGE_HEADER_SIZE + self.index as usize * CATALOG_ENTRY_SIZE
    }
}

/// Catalog entry of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Volume holding the file's pages.
    pub volume: VolumeId,
    /// Identifier stamped into every page of the file.
    pub file_id: FileId,
    /// Head of the page chain.
    pub first_page: PageNo,
    /// Tail of the page chain.
    pub last_page: PageNo,
    /// Percentage of each extent the file may fill.
    pub fill_factor: u8,
    /// First page of each free-space bucket, smallest bucket first.
    pub space_heads: [Option<PageNo>; SPACE_LIST_BUCKETS],
}

impl FileEntry {
    /// Returns the id of page `page_no` of this file.
    #[inline]
    pub fn page(&self, page_no: PageNo) -> PageId {
        PageId::new(self.volume, page_no)
    }

    /// Returns the id of the head page.
    #[inline]
    pub fn first_page_id(&self) -> PageId {
        self.page(self.first_page)
    }

    /// Returns the id of the tail page.
    #[inline]
    pub fn last_page_id(&self) -> PageId {
        self.page(self.last_page)
    }

    fn encode(&self, mut buf: &mut [u8]) {
        buf.put_u8(IN_USE);
        buf.put_u8(self.fill_factor);
        buf.put_u16_le(0);
        buf.put_u32_le(self.file_id.as_u32());
        buf.put_u32_le(self.first_page.as_u32());
        buf.put_u32_le(self.last_page.as_u32());
        for head in self.space_heads {
            buf.put_u32_le(PageNo::to_raw(head));
        }
        buf.put_u32_le(0);
    }

    fn decode(volume: VolumeId, mut buf: &[u8]) -> Option<Self> {
        if buf.get_u8() != IN_USE {
            return None;
        }
        let fill_factor = buf.get_u8();
        buf.advance(2);
        let file_id = FileId::new(buf.get_u32_le());
        let first_page = PageNo::from_raw(buf.get_u32_le())?;
        let last_page = PageNo::from_raw(buf.get_u32_le())?;
        let mut space_heads = [None; SPACE_LIST_BUCKETS];
        for head in &mut space_heads {
            *head = PageNo::from_raw(buf.get_u32_le());
        }
        Some(Self {
            volume,
            file_id,
            first_page,
            last_page,
            fill_factor,
            space_heads,
        })
    }
}

/// Returns the number of entries a catalog page of `page_size` holds.
#[inline]
pub const fn entries_per_page(page_size: usize) -> usize {
    (page_size - PAGE_HEADER_SIZE) / CATALOG_ENTRY_SIZE
}

/// Formats `page_id` as an empty catalog page.
pub fn init_catalog_page(pool: &BufferPool, page_id: PageId) -> ObjectResult<()> {
    let mut guard = pool.new_page(page_id)?;
    let mut data = guard.data_mut();
    PageHeader::new(&mut data[..]).initialize(page_id, FileId::new(0), PageType::Catalog);
    debug!("Initialized catalog page {}", page_id);
    Ok(())
}

/// Creates a file with an empty head page and returns its reference.
///
/// The head page is the first page of an unused extent so the file can
/// grow next to it.
pub fn create_file(
    pool: &BufferPool,
    allocator: &ExtentAllocator,
    catalog_page: PageId,
    fill_factor: u8,
) -> ObjectResult<CatalogRef> {
    let mut catalog_guard = pool.fetch_page_for_write(catalog_page)?;
    let mut catalog_data = catalog_guard.data_mut();
    if PageHeader::new(&catalog_data[..]).page_type() != PageType::Catalog {
        return Err(ObjectError::BadCatalogObject);
    }

    let index = (0..entries_per_page(catalog_data.len()))
        .find(|&index| catalog_data[CatalogRef::new(catalog_page, index as u16).offset()] != IN_USE)
        .ok_or(ObjectError::CatalogFull { page_id: catalog_page })?;
    let cref = CatalogRef::new(catalog_page, index as u16);

    let volume = catalog_page.volume;
    let head = allocator.allocate_extent_head(volume)?;
    let mut head_guard = match pool.fetch_page_for_write(head) {
        Ok(guard) => guard,
        Err(err) => {
            allocator.free_page(head)?;
            return Err(err.into());
        }
    };

    let mut catalog_header = PageHeader::new(&mut catalog_data[..]);
    let file_id = FileId::new(catalog_header.unique().as_u32() + 1);
    catalog_header.set_unique(Unique::new(file_id.as_u32()));

    let mut entry = FileEntry {
        volume,
        file_id,
        first_page: head.page_no,
        last_page: head.page_no,
        fill_factor,
        space_heads: [None; SPACE_LIST_BUCKETS],
    };

    let mut head_data = head_guard.data_mut();
    let mut head_page = SlottedPage::new(&mut head_data[..]);
    head_page.init_data_page(head, file_id);
    space_list::insert(pool, &mut entry, &mut head_page)?;

    let offset = cref.offset();
    entry.encode(&mut catalog_data[offset..offset + CATALOG_ENTRY_SIZE]);

    debug!(
        "Created file {} at catalog entry {} with head page {}",
        file_id, index, head
    );
    Ok(cref)
}

/// Reads the entry `cref` refers to.
///
/// Fails with [`ObjectError::BadCatalogObject`] if `cref` does not name a
/// live entry of a catalog page.
pub fn read_entry(pool: &BufferPool, cref: CatalogRef) -> ObjectResult<FileEntry> {
    let guard = pool.fetch_page(cref.page)?;
    let data = guard.data();
    if PageHeader::new(&data[..]).page_type() != PageType::Catalog
        || cref.index as usize >= entries_per_page(data.len())
    {
        return Err(ObjectError::BadCatalogObject);
    }

    let offset = cref.offset();
    FileEntry::decode(cref.page.volume, &data[offset..offset + CATALOG_ENTRY_SIZE])
        .ok_or(ObjectError::BadCatalogObject)
}

/// Writes `entry` back to the slot `cref` refers to.
pub fn write_entry(pool: &BufferPool, cref: CatalogRef, entry: &FileEntry) -> ObjectResult<()> {
    let mut guard = pool.fetch_page_for_write(cref.page)?;
    let mut data = guard.data_mut();
    if PageHeader::new(&data[..]).page_type() != PageType::Catalog
        || cref.index as usize >= entries_per_page(data.len())
    {
        return Err(ObjectError::BadCatalogObject);
    }

    let offset = cref.offset();
    entry.encode(&mut data[offset..offset + CATALOG_ENTRY_SIZE]);
    Ok(())
}

/// Returns every live entry of `catalog_page`.
pub fn files(pool: &BufferPool, catalog_page: PageId) -> ObjectResult<Vec<(CatalogRef, FileEntry)>> {
    let guard = pool.fetch_page(catalog_page)?;
    let data = guard.data();
    if PageHeader::new(&data[..]).page_type() != PageType::Catalog {
        return Err(ObjectError::BadCatalogObject);
    }

    Ok((0..entries_per_page(data.len()))
        .filter_map(|index| {
            let cref = CatalogRef::new(catalog_page, index as u16);
            let offset = cref.offset();
            FileEntry::decode(catalog_page.volume, &data[offset..offset + CATALOG_ENTRY_SIZE])
                .map(|entry| (cref, entry))
        })
        .collect())
}
