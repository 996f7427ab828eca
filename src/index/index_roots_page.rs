//! Index roots page: maps `index_id -> root_page_id` for every B+ tree in
//! the database, resident at the fixed logical page
//! [`crate::config::INDEX_ROOTS_PAGE_ID`] (spec.md §4.5, §6). No source
//! for this page survived retrieval filtering; the layout below is this
//! crate's own design, following the same small-header-plus-packed-array
//! idiom as [`super::page`] and `src/table/table_page.rs`.
//!
//! Layout: `[count: u32]` followed by up to [`MAX_ENTRIES`] packed
//! `[index_id: u32][root_page_id: i32]` pairs, linearly scanned (this page
//! never holds enough entries for a linear scan to matter).

use std::convert::TryInto;

use crate::config::PAGE_SIZE;
use crate::types::PageId;

const ENTRY_SIZE: usize = 8;
const HEADER_SIZE: usize = 4;

pub const MAX_ENTRIES: usize = (PAGE_SIZE - HEADER_SIZE) / ENTRY_SIZE;

/// Reads one entry without requiring a write latch, for
/// [`super::b_plus_tree::BPlusTree::open`].
pub fn read_root_id(bytes: &[u8], index_id: u32) -> Option<PageId> {
    let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    (0..count).find_map(|i| {
        let off = HEADER_SIZE + i as usize * ENTRY_SIZE;
        let id = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        if id == index_id {
            Some(i32::from_le_bytes(bytes[off + 4..off + 8].try_into().unwrap()))
        } else {
            None
        }
    })
}

pub struct IndexRootsPage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> IndexRootsPage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        assert_eq!(bytes.len(), PAGE_SIZE);
        Self { bytes }
    }

    pub fn init(&mut self) {
        self.set_count(0);
    }

    fn count(&self) -> u32 {
        u32::from_le_bytes(self.bytes[0..4].try_into().unwrap())
    }

    fn set_count(&mut self, count: u32) {
        self.bytes[0..4].copy_from_slice(&count.to_le_bytes());
    }

    fn entry_offset(index: u32) -> usize {
        HEADER_SIZE + index as usize * ENTRY_SIZE
    }

    fn entry_at(&self, index: u32) -> (u32, PageId) {
        let off = Self::entry_offset(index);
        let index_id = u32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap());
        let root_page_id = i32::from_le_bytes(self.bytes[off + 4..off + 8].try_into().unwrap());
        (index_id, root_page_id)
    }

    fn set_entry_at(&mut self, index: u32, index_id: u32, root_page_id: PageId) {
        let off = Self::entry_offset(index);
        self.bytes[off..off + 4].copy_from_slice(&index_id.to_le_bytes());
        self.bytes[off + 4..off + 8].copy_from_slice(&root_page_id.to_le_bytes());
    }

    fn find(&self, index_id: u32) -> Option<u32> {
        (0..self.count()).find(|&i| self.entry_at(i).0 == index_id)
    }

    pub fn get_root_id(&self, index_id: u32) -> Option<PageId> {
        self.find(index_id).map(|i| self.entry_at(i).1)
    }

    /// Inserts a brand-new index's root. Returns `false` if `index_id` is
    /// already present or the page is full.
    pub fn insert(&mut self, index_id: u32, root_page_id: PageId) -> bool {
        if self.find(index_id).is_some() {
            return false;
        }
        let count = self.count();
        if count as usize >= MAX_ENTRIES {
            return false;
        }
        self.set_entry_at(count, index_id, root_page_id);
        self.set_count(count + 1);
        true
    }

    /// Updates an existing index's root (called only when the root itself
    /// changes: a new root from a split/merge, never after an ordinary
    /// non-root split). Returns `false` if `index_id` is unknown.
    pub fn update(&mut self, index_id: u32, root_page_id: PageId) -> bool {
        match self.find(index_id) {
            Some(i) => {
                self.set_entry_at(i, index_id, root_page_id);
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, index_id: u32) -> bool {
        match self.find(index_id) {
            Some(i) => {
                let last = self.count() - 1;
                if i != last {
                    let (id, root) = self.entry_at(last);
                    self.set_entry_at(i, id, root);
                }
                self.set_count(last);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Vec<u8> {
        let mut bytes = vec![0u8; PAGE_SIZE];
        IndexRootsPage::new(&mut bytes).init();
        bytes
    }

    #[test]
    fn insert_get_update_delete() {
        let mut bytes = fresh();
        let mut page = IndexRootsPage::new(&mut bytes);
        assert!(page.insert(1, 10));
        assert!(!page.insert(1, 99));
        assert_eq!(page.get_root_id(1), Some(10));
        assert!(page.update(1, 20));
        assert_eq!(page.get_root_id(1), Some(20));
        assert!(page.delete(1));
        assert_eq!(page.get_root_id(1), None);
    }
}
