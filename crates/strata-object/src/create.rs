//! Object creation.
//!
//! A new object goes to the first page that can take it, tried in order:
//!
//! 1. With a near hint: the hint's page, or else a new page allocated after
//!    it and spliced in behind it.
//! 2. Without a hint: the head of the smallest free-space bucket that
//!    guarantees the needed space, then the file's last page, or else a new
//!    page appended to the chain.
//!
//! The hint's page and the last page are compacted before their free space
//! is tested, whether or not they end up taking the object.
//!
//! The destination page is unlinked from the free-space directory while it
//! is written and linked back into the bucket matching its new free space.

use strata_common::types::{ObjectId, PageId};
use strata_storage::buffer::PageWriteGuard;
use strata_storage::page::{
    aligned_length, data_capacity, large_object_threshold, needed_space, ObjectHeader,
    SlottedPage,
};
use tracing::{debug, trace};

use crate::catalog::{self, CatalogRef, FileEntry};
use crate::error::{ObjectError, ObjectResult};
use crate::file_map;
use crate::manager::{is_file_page, ObjectManager};
use crate::space_list;

/// Description of an object to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpec<'a> {
    /// Opaque caller flags stored in the object header.
    pub properties: u8,
    /// Opaque caller tag stored in the object header.
    pub tag: u16,
    /// Logical length of the object.
    pub length: i64,
    /// Payload; must hold at least `length` bytes when `length > 0`.
    pub data: Option<&'a [u8]>,
}

impl<'a> ObjectSpec<'a> {
    /// Creates a spec for an object holding exactly `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            properties: 0,
            tag: 0,
            length: data.len() as i64,
            data: Some(data),
        }
    }

    /// Sets the header properties.
    #[must_use]
    pub fn with_properties(mut self, properties: u8) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the header tag.
    #[must_use]
    pub fn with_tag(mut self, tag: u16) -> Self {
        self.tag = tag;
        self
    }

    /// Checks the spec against a page size and returns the object header
    /// and payload to store.
    fn validate(&self, page_size: usize) -> ObjectResult<(ObjectHeader, &'a [u8])> {
        if self.length < 0 {
            return Err(ObjectError::BadLength {
                length: self.length,
            });
        }

        let threshold = large_object_threshold(page_size);
        let length = usize::try_from(self.length).map_err(|_| ObjectError::BadLength {
            length: self.length,
        })?;
        if aligned_length(length) > threshold {
            return Err(ObjectError::LargeObjectUnsupported {
                length: aligned_length(length),
                threshold,
            });
        }

        let payload = match self.data {
            Some(data) if data.len() >= length => &data[..length],
            Some(_) => return Err(ObjectError::BadUserBuffer),
            None if length > 0 => return Err(ObjectError::BadUserBuffer),
            None => &[],
        };

        Ok((
            ObjectHeader::new(self.properties, self.tag, length as u32),
            payload,
        ))
    }
}

impl ObjectManager {
    /// Creates an object in `file` and returns its id.
    ///
    /// With `near`, the object is placed on the same page as that object
    /// or, if it does not fit there, on a new page right after it.
    pub fn create_object(
        &self,
        file: CatalogRef,
        near: Option<ObjectId>,
        spec: &ObjectSpec<'_>,
    ) -> ObjectResult<ObjectId> {
        let (header, payload) = spec.validate(self.config().page_size)?;
        let needed = needed_space(header.aligned_length());
        let mut entry = catalog::read_entry(self.pool(), file)?;

        let oid = match near {
            Some(near) => self.create_near(&mut entry, near, needed, header, payload)?,
            None => self.create_anywhere(&mut entry, needed, header, payload)?,
        };

        catalog::write_entry(self.pool(), file, &entry)?;
        trace!("Created object {} of {} bytes", oid, header.length);
        Ok(oid)
    }

    fn create_near(
        &self,
        entry: &mut FileEntry,
        near: ObjectId,
        needed: usize,
        header: ObjectHeader,
        payload: &[u8],
    ) -> ObjectResult<ObjectId> {
        if near.volume != entry.volume {
            return Err(ObjectError::BadObjectId { oid: near });
        }

        let page_id = near.page_id();
        let mut guard = self.pool().fetch_page_for_write(page_id)?;
        {
            let data = guard.data();
            let page = SlottedPage::new(&data[..]);
            if !is_file_page(&page, entry.file_id) || !page.holds(near.slot, near.unique) {
                return Err(ObjectError::BadObjectId { oid: near });
            }
        }

        if self.compact_for(entry, &mut guard, needed)? {
            return self.place_object(entry, &mut guard, header, payload);
        }
        self.create_on_new_page(entry, guard, header, payload)
    }

    fn create_anywhere(
        &self,
        entry: &mut FileEntry,
        needed: usize,
        header: ObjectHeader,
        payload: &[u8],
    ) -> ObjectResult<ObjectId> {
        let capacity = data_capacity(self.config().page_size);

        if let Some((bucket, page_no)) = space_list::smallest_fit(entry, capacity, needed) {
            let page_id = entry.page(page_no);
            trace!("Taking page {} from space list {}", page_id, bucket);
            let mut guard = self.pool().fetch_page_for_write(page_id)?;
            {
                let data = guard.data();
                let page = SlottedPage::new(&data[..]);
                if !is_file_page(&page, entry.file_id) || page.contiguous_free() < needed {
                    return Err(ObjectError::corrupted(
                        page_id,
                        format!("page listed in space list {bucket} cannot hold {needed} bytes"),
                    ));
                }
            }
            return self.place_object(entry, &mut guard, header, payload);
        }

        let last_id = entry.last_page_id();
        let mut guard = self.pool().fetch_page_for_write(last_id)?;
        {
            let data = guard.data();
            if !is_file_page(&SlottedPage::new(&data[..]), entry.file_id) {
                return Err(ObjectError::corrupted(last_id, "last page is not a page of the file"));
            }
        }

        if self.compact_for(entry, &mut guard, needed)? {
            return self.place_object(entry, &mut guard, header, payload);
        }
        self.create_on_new_page(entry, guard, header, payload)
    }

    /// Compacts a pinned candidate page if it has holes, and returns true
    /// if it then has `needed` contiguous free bytes.
    fn compact_for(
        &self,
        entry: &mut FileEntry,
        guard: &mut PageWriteGuard,
        needed: usize,
    ) -> ObjectResult<bool> {
        let holes = SlottedPage::new(&guard.data()[..]).unused() > 0;
        if holes {
            let page_id = guard.page_id();
            let mut data = guard.data_mut();
            let mut page = SlottedPage::new(&mut data[..]);
            let reclaimed = space_list::compact(self.pool(), entry, &mut page, None)?;
            trace!("Compacted page {} for insert, reclaimed {} bytes", page_id, reclaimed);
        }

        let data = guard.data();
        let fits = SlottedPage::new(&data[..]).contiguous_free() >= needed;
        Ok(fits)
    }

    /// Stores the object on a pinned page that has room for it, keeping the
    /// page's space-list membership current.
    fn place_object(
        &self,
        entry: &mut FileEntry,
        guard: &mut PageWriteGuard,
        header: ObjectHeader,
        payload: &[u8],
    ) -> ObjectResult<ObjectId> {
        let page_id = guard.page_id();
        let mut data = guard.data_mut();
        let mut page = SlottedPage::new(&mut data[..]);

        space_list::remove(self.pool(), entry, &mut page)?;
        let (slot, unique) = page
            .insert_object(header, payload)
            .ok_or_else(|| ObjectError::corrupted(page_id, "object does not fit its page"))?;
        space_list::insert(self.pool(), entry, &mut page)?;

        Ok(ObjectId::new(page_id, slot, unique))
    }

    /// Allocates a page after `prev`, splices it into the chain, and stores
    /// the object there.
    ///
    /// Nothing is linked until the new page is pinned and formatted, so a
    /// failed allocation leaves the chain untouched.
    fn create_on_new_page(
        &self,
        entry: &mut FileEntry,
        mut prev_guard: PageWriteGuard,
        header: ObjectHeader,
        payload: &[u8],
    ) -> ObjectResult<ObjectId> {
        let prev_id = prev_guard.page_id();
        let next_no = {
            let data = prev_guard.data();
            SlottedPage::new(&data[..]).header().next_page()
        };
        let mut next_guard = next_no
            .map(|next_no| self.pool().fetch_page_for_write(entry.page(next_no)))
            .transpose()?;

        let page_id = self.allocate_page_after(entry, prev_id)?;
        // A reused page is read back so its tag counter carries over.
        let mut page_guard = match self.pool().fetch_page_for_write(page_id) {
            Ok(guard) => guard,
            Err(err) => {
                self.allocator().free_page(page_id)?;
                return Err(err.into());
            }
        };

        {
            let mut prev_data = prev_guard.data_mut();
            let mut page_data = page_guard.data_mut();
            let mut next_data = next_guard.as_mut().map(|guard| guard.data_mut());

            let mut page = SlottedPage::new(&mut page_data[..]);
            page.init_data_page(page_id, entry.file_id);
            let mut next_page = next_data.as_mut().map(|data| SlottedPage::new(&mut data[..]));
            file_map::link_after(
                entry,
                &mut SlottedPage::new(&mut prev_data[..]),
                &mut page,
                next_page.as_mut(),
            );
        }
        drop(next_guard);
        drop(prev_guard);

        debug!("Added page {} to file {} after {}", page_id, entry.file_id, prev_id);

        let mut data = page_guard.data_mut();
        let mut page = SlottedPage::new(&mut data[..]);
        let (slot, unique) = page
            .insert_object(header, payload)
            .ok_or_else(|| ObjectError::corrupted(page_id, "object does not fit an empty page"))?;
        space_list::insert(self.pool(), entry, &mut page)?;

        Ok(ObjectId::new(page_id, slot, unique))
    }

    fn allocate_page_after(&self, entry: &FileEntry, prev_id: PageId) -> ObjectResult<PageId> {
        let mut pages =
            self.allocator()
                .allocate_pages(entry.volume, prev_id, entry.fill_factor, 1)?;
        pages
            .pop()
            .ok_or_else(|| ObjectError::corrupted(prev_id, "allocator returned no page"))
    }
}
