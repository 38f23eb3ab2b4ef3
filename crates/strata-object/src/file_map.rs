//! Page chain of a file.
//!
//! The pages of a file form one doubly-linked list through the
//! `prev_page`/`next_page` header fields, from the catalog entry's
//! `first_page` to its `last_page`. Scans follow this order.

use std::collections::HashSet;

use strata_common::types::{PageId, PageNo};
use strata_storage::buffer::BufferPool;
use strata_storage::page::SlottedPage;

use crate::catalog::FileEntry;
use crate::error::{ObjectError, ObjectResult};

/// Splices `page` into the chain right after `prev`.
///
/// `next` must be the page currently following `prev`, if there is one.
pub fn link_after(
    entry: &mut FileEntry,
    prev: &mut SlottedPage<&mut [u8]>,
    page: &mut SlottedPage<&mut [u8]>,
    next: Option<&mut SlottedPage<&mut [u8]>>,
) {
    let prev_no = prev.header().page_id().page_no;
    let page_no = page.header().page_id().page_no;
    let next_no = next
        .as_ref()
        .map(|next| next.header().page_id().page_no);
    debug_assert_eq!(prev.header().next_page(), next_no);

    let mut header = page.header_mut();
    header.set_prev_page(Some(prev_no));
    header.set_next_page(next_no);
    prev.header_mut().set_next_page(Some(page_no));

    match next {
        Some(next) => next.header_mut().set_prev_page(Some(page_no)),
        None => entry.last_page = page_no,
    }
}

/// Removes `page` from the chain.
///
/// `prev` and `next` must be the pages its header links to. The head page
/// has no predecessor and is never unlinked.
pub fn unlink(
    entry: &mut FileEntry,
    page: &mut SlottedPage<&mut [u8]>,
    prev: &mut SlottedPage<&mut [u8]>,
    next: Option<&mut SlottedPage<&mut [u8]>>,
) {
    let prev_no = prev.header().page_id().page_no;
    let next_no = page.header().next_page();
    debug_assert_eq!(page.header().prev_page(), Some(prev_no));

    prev.header_mut().set_next_page(next_no);
    match next {
        Some(next) => next.header_mut().set_prev_page(Some(prev_no)),
        None => entry.last_page = prev_no,
    }

    let mut header = page.header_mut();
    header.set_prev_page(None);
    header.set_next_page(None);
}

/// Walks `prev_page` links from `page_id` back to the head of its chain.
pub fn find_head(pool: &BufferPool, page_id: PageId, max_pages: usize) -> ObjectResult<PageId> {
    let mut current = page_id;
    for _ in 0..max_pages {
        let guard = pool.fetch_page(current)?;
        let data = guard.data();
        match SlottedPage::new(&data[..]).header().prev_page() {
            Some(prev) => current = current.sibling(prev),
            None => return Ok(current),
        }
    }
    Err(ObjectError::corrupted(page_id, "page chain has a cycle"))
}

/// Returns the pages of the file in chain order.
pub fn chain_pages(pool: &BufferPool, entry: &FileEntry) -> ObjectResult<Vec<PageId>> {
    let mut pages = Vec::new();
    let mut seen: HashSet<PageNo> = HashSet::new();
    let mut current = Some(entry.first_page);

    while let Some(page_no) = current {
        let page_id = entry.page(page_no);
        if !seen.insert(page_no) {
            return Err(ObjectError::corrupted(page_id, "page chain revisits page"));
        }
        let guard = pool.fetch_page(page_id)?;
        let data = guard.data();
        current = SlottedPage::new(&data[..]).header().next_page();
        pages.push(page_id);
    }

    Ok(pages)
}
