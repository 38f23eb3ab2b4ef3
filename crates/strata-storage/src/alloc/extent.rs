//! Extent-based page allocator.

use std::collections::HashMap;

use parking_lot::Mutex;
use strata_common::types::{ExtentNo, PageId, PageNo, VolumeId};
use tracing::{debug, trace};

use super::error::{AllocError, AllocResult};

/// Allocation state of one volume.
#[derive(Debug)]
struct VolumeMap {
    /// Number of pages in the volume.
    pages: u32,
    /// One bit per page, set when allocated.
    bitmap: Vec<u64>,
    /// Allocated pages per extent.
    extent_counts: Vec<u32>,
}

impl VolumeMap {
    fn new(pages: u32, extent_size: u32) -> Self {
        let words = (pages as usize).div_ceil(64);
        let extents = pages.div_ceil(extent_size) as usize;
        Self {
            pages,
            bitmap: vec![0; words],
            extent_counts: vec![0; extents],
        }
    }

    #[inline]
    fn is_set(&self, page_no: u32) -> bool {
        self.bitmap[(page_no / 64) as usize] & (1 << (page_no % 64)) != 0
    }

    #[inline]
    fn set(&mut self, page_no: u32) {
        self.bitmap[(page_no / 64) as usize] |= 1 << (page_no % 64);
    }

    #[inline]
    fn clear(&mut self, page_no: u32) {
        self.bitmap[(page_no / 64) as usize] &= !(1 << (page_no % 64));
    }

    fn allocated(&self) -> usize {
        self.bitmap.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// Page allocator that groups the pages of each volume into extents.
///
/// Pages of one file are kept close together: allocation starts right
/// after a hint page inside the hint's extent and spreads to later extents
/// before wrapping around. The fill factor caps how many pages of an extent
/// may be handed out, leaving room for later growth near existing pages.
///
/// # Example
///
/// ```rust
/// use strata_common::types::{PageId, PageNo, VolumeId};
/// use strata_storage::alloc::ExtentAllocator;
///
/// let volume = VolumeId::new(1);
/// let alloc = ExtentAllocator::new(8);
/// alloc.add_volume(volume, 64).unwrap();
///
/// let head = alloc.allocate_extent_head(volume).unwrap();
/// let pages = alloc.allocate_pages(volume, head, 100, 2).unwrap();
/// assert_eq!(pages[0].page_no, PageNo::new(1));
/// assert_eq!(alloc.extent_of(pages[1]).as_u32(), 0);
/// ```
#[derive(Debug)]
pub struct ExtentAllocator {
    /// Pages per extent.
    extent_size: u32,
    /// Registered volumes.
    volumes: Mutex<HashMap<VolumeId, VolumeMap>>,
}

impl ExtentAllocator {
    /// Creates an allocator with `extent_size` pages per extent.
    ///
    /// # Panics
    ///
    /// Panics if `extent_size` is zero.
    pub fn new(extent_size: u32) -> Self {
        assert!(extent_size > 0, "extent size must be positive");
        Self {
            extent_size,
            volumes: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of pages per extent.
    #[inline]
    pub fn extent_size(&self) -> u32 {
        self.extent_size
    }

    /// Registers a volume of `pages` pages, all free.
    pub fn add_volume(&self, volume: VolumeId, pages: u32) -> AllocResult<()> {
        let mut volumes = self.volumes.lock();
        if volumes.contains_key(&volume) {
            return Err(AllocError::VolumeExists { volume });
        }
        volumes.insert(volume, VolumeMap::new(pages, self.extent_size));
        debug!(
            "Added volume {} with {} pages in extents of {}",
            volume, pages, self.extent_size
        );
        Ok(())
    }

    /// Returns the extent containing `page_id`.
    #[inline]
    pub fn extent_of(&self, page_id: PageId) -> ExtentNo {
        ExtentNo::new(page_id.page_no.as_u32() / self.extent_size)
    }

    /// Allocates `count` pages of `volume`, placed as close after `near` as
    /// the fill factor allows.
    ///
    /// Candidates are the pages after `near` in its extent, then the pages
    /// of later extents, then earlier extents, then the rest of `near`'s
    /// extent. An extent gives out pages only while fewer than
    /// `ceil(extent_size * fill_factor / 100)` of them are allocated.
    /// Either all `count` pages are allocated or none is.
    pub fn allocate_pages(
        &self,
        volume: VolumeId,
        near: PageId,
        fill_factor: u8,
        count: usize,
    ) -> AllocResult<Vec<PageId>> {
        if fill_factor == 0 || fill_factor > 100 {
            return Err(AllocError::BadFillFactor { fill_factor });
        }

        let mut volumes = self.volumes.lock();
        let map = volumes
            .get_mut(&volume)
            .ok_or(AllocError::UnknownVolume { volume })?;
        if map.pages == 0 {
            return Err(AllocError::VolumeFull { volume });
        }

        let limit = self.extent_limit(fill_factor);
        let near_no = near.page_no.as_u32().min(map.pages.saturating_sub(1));
        let near_extent = near_no / self.extent_size;

        let mut pending: Vec<u32> = Vec::with_capacity(count);
        let mut pending_counts: HashMap<u32, u32> = HashMap::new();
        for page_no in self.candidates(map.pages, near_no) {
            if pending.len() == count {
                break;
            }
            let extent = page_no / self.extent_size;
            let used = map.extent_counts[extent as usize]
                + pending_counts.get(&extent).copied().unwrap_or(0);
            if used >= limit || map.is_set(page_no) {
                continue;
            }
            pending.push(page_no);
            *pending_counts.entry(extent).or_insert(0) += 1;
        }

        if pending.len() < count {
            debug!(
                "Volume {} cannot supply {} pages near extent {}",
                volume, count, near_extent
            );
            return Err(AllocError::VolumeFull { volume });
        }

        let pages = pending
            .into_iter()
            .map(|page_no| {
                map.set(page_no);
                map.extent_counts[(page_no / self.extent_size) as usize] += 1;
                PageId::new(volume, PageNo::new(page_no))
            })
            .collect::<Vec<_>>();

        trace!(
            "Allocated {} pages on volume {} near {}",
            pages.len(),
            volume,
            near
        );
        Ok(pages)
    }

    /// Allocates the first page of an untouched extent.
    ///
    /// Used for the head page of a new file so that the file's later pages
    /// can grow into the same extent.
    pub fn allocate_extent_head(&self, volume: VolumeId) -> AllocResult<PageId> {
        let mut volumes = self.volumes.lock();
        let map = volumes
            .get_mut(&volume)
            .ok_or(AllocError::UnknownVolume { volume })?;

        let extent = map
            .extent_counts
            .iter()
            .position(|&count| count == 0)
            .ok_or(AllocError::VolumeFull { volume })?;

        let page_no = extent as u32 * self.extent_size;
        map.set(page_no);
        map.extent_counts[extent] += 1;

        debug!("Allocated extent head {} on volume {}", page_no, volume);
        Ok(PageId::new(volume, PageNo::new(page_no)))
    }

    /// Marks a known page as allocated.
    ///
    /// Used to rebuild allocation state from the pages reachable from a
    /// catalog when a volume is reopened. Marking an allocated page again
    /// is a no-op.
    pub fn mark_allocated(&self, page_id: PageId) -> AllocResult<()> {
        let mut volumes = self.volumes.lock();
        let map = volumes
            .get_mut(&page_id.volume)
            .ok_or(AllocError::UnknownVolume {
                volume: page_id.volume,
            })?;

        let page_no = page_id.page_no.as_u32();
        if page_no >= map.pages {
            return Err(AllocError::OutOfRange { page_id });
        }
        if !map.is_set(page_no) {
            map.set(page_no);
            map.extent_counts[(page_no / self.extent_size) as usize] += 1;
        }
        Ok(())
    }

    /// Returns a page to its volume.
    pub fn free_page(&self, page_id: PageId) -> AllocResult<()> {
        let mut volumes = self.volumes.lock();
        let map = volumes
            .get_mut(&page_id.volume)
            .ok_or(AllocError::UnknownVolume {
                volume: page_id.volume,
            })?;

        let page_no = page_id.page_no.as_u32();
        if page_no >= map.pages {
            return Err(AllocError::OutOfRange { page_id });
        }
        if !map.is_set(page_no) {
            return Err(AllocError::NotAllocated { page_id });
        }

        map.clear(page_no);
        map.extent_counts[(page_no / self.extent_size) as usize] -= 1;
        trace!("Freed page {}", page_id);
        Ok(())
    }

    /// Returns true if `page_id` is allocated.
    pub fn is_allocated(&self, page_id: PageId) -> bool {
        let volumes = self.volumes.lock();
        volumes.get(&page_id.volume).is_some_and(|map| {
            let page_no = page_id.page_no.as_u32();
            page_no < map.pages && map.is_set(page_no)
        })
    }

    /// Returns the number of allocated pages of `volume`.
    pub fn allocated_count(&self, volume: VolumeId) -> AllocResult<usize> {
        let volumes = self.volumes.lock();
        volumes
            .get(&volume)
            .map(VolumeMap::allocated)
            .ok_or(AllocError::UnknownVolume { volume })
    }

    /// Maximum allocated pages per extent under `fill_factor`.
    #[inline]
    fn extent_limit(&self, fill_factor: u8) -> u32 {
        (self.extent_size * fill_factor as u32).div_ceil(100).max(1)
    }

    /// Page numbers in allocation preference order around `near`.
    fn candidates(&self, pages: u32, near: u32) -> impl Iterator<Item = u32> {
        let extent_size = self.extent_size;
        let extents = pages.div_ceil(extent_size);
        let near_extent = near / extent_size;
        let extent_pages =
            move |extent: u32| extent * extent_size..((extent + 1) * extent_size).min(pages);

        let first = extent_pages(near_extent);
        let after_near = near + 1..first.end;
        let before_near = first.start..near + 1;

        after_near
            .chain(
                (near_extent + 1..extents)
                    .chain(0..near_extent)
                    .flat_map(extent_pages),
            )
            .chain(before_near)
    }
}
