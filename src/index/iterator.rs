//! Standalone forward cursor over a B+ tree's leaf chain (spec.md §4.5.4
//! "begin()/end()"). Grounded on
//! `original_source/src/index/index_iterator.cpp`, with one deliberate
//! change: the original holds its current leaf page pinned for the
//! cursor's entire lifetime (`FetchPage` in the constructor,
//! `UnpinPage` only in the destructor). This crate's buffer pool
//! discipline never holds a pin across steps (spec.md §9, the same
//! constraint `table::TableIterator` follows), so each `next()` re-fetches
//! its leaf page and unpins before returning.

use crate::buffer::{with_read_page, BufferPoolManager};
use crate::error::StorageResult;
use crate::types::{PageId, RowId, INVALID_PAGE_ID};

use super::page::LeafPageView;

pub struct IndexIterator<'a> {
    bpm: &'a BufferPoolManager,
    current_page_id: PageId,
    item_index: u32,
}

impl<'a> IndexIterator<'a> {
    pub fn new(bpm: &'a BufferPoolManager, current_page_id: PageId, item_index: u32) -> Self {
        Self {
            bpm,
            current_page_id,
            item_index,
        }
    }

    pub fn end(bpm: &'a BufferPoolManager) -> Self {
        Self {
            bpm,
            current_page_id: INVALID_PAGE_ID,
            item_index: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.current_page_id == INVALID_PAGE_ID
    }

    /// The `(key, RowId)` pair the cursor currently points at, or `None`
    /// at `end()` (`operator*`).
    pub fn item(&self) -> StorageResult<Option<(Vec<u8>, RowId)>> {
        if self.is_end() {
            return Ok(None);
        }
        with_read_page(self.bpm, self.current_page_id, |bytes| {
            let page = LeafPageView::new(bytes);
            (page.key_at(self.item_index).to_vec(), page.value_at(self.item_index))
        })
        .map(Some)
    }

    /// Advances to the next entry, crossing into the next leaf page when
    /// the current one is exhausted (`operator++`).
    pub fn advance(&mut self) -> StorageResult<()> {
        if self.is_end() {
            return Ok(());
        }
        let (size, next_page_id) = with_read_page(self.bpm, self.current_page_id, |bytes| {
            let page = LeafPageView::new(bytes);
            (page.size(), page.next_page_id())
        })?;

        if self.item_index + 1 < size {
            self.item_index += 1;
        } else if next_page_id != INVALID_PAGE_ID {
            self.current_page_id = next_page_id;
            self.item_index = 0;
        } else {
            self.current_page_id = INVALID_PAGE_ID;
            self.item_index = 0;
        }
        Ok(())
    }
}

impl<'a> Iterator for IndexIterator<'a> {
    type Item = (Vec<u8>, RowId);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.item().ok().flatten()?;
        self.advance().ok()?;
        Some(current)
    }
}
