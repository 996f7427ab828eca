//! Slotted page layout for table heap pages (spec.md §3 "Table heap",
//! §4.4). The original's `TablePage` header/slot-directory implementation
//! was not part of the retrieved source (only `table_heap.cpp` and the
//! iterator survived filtering), so the exact byte layout here is this
//! crate's own design, following the standard slotted-page idiom also
//! used by `small-db`'s page types: a small fixed header, a slot
//! directory that grows forward from the header, and tuple bytes that
//! grow backward from the end of the page.
//!
//! Header: `[next_page_id: i32][tuple_count: u32][free_space_ptr: u32]`.
//! Slot `i` (at `HEADER_SIZE + i * SLOT_SIZE`): `[offset: u32][size: i32]`.
//! `size > 0` is a live tuple of that length at `offset`. `size < 0` is a
//! tombstoned tuple (marked deleted, `-size` is its length, bytes are
//! still present for `rollback_delete`). `size == 0` is an empty slot
//! available for reuse; deleted tuple bytes are not compacted, since
//! reclaiming them would require shifting every other tuple's offset.

use std::convert::TryInto;

use crate::config::PAGE_SIZE;
use crate::types::{PageId, INVALID_PAGE_ID};

const HEADER_SIZE: usize = 12;
const SLOT_SIZE: usize = 8;

/// Per-tuple overhead charged against a page's usable space: one slot
/// directory entry plus a small safety margin, matching spec.md §3's
/// "≈32 bytes" bound on a tuple's maximum serialised size.
pub const SLOT_HEADER_OVERHEAD: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Ok,
    OutOfBounds,
    Deleted,
    TooLarge,
}

fn slot_field_offset(slot: u32) -> usize {
    HEADER_SIZE + slot as usize * SLOT_SIZE
}

fn read_raw_slot(bytes: &[u8], slot: u32) -> (u32, i32) {
    let off = slot_field_offset(slot);
    let offset = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    let size = i32::from_le_bytes(bytes[off + 4..off + 8].try_into().unwrap());
    (offset, size)
}

fn read_tuple_count(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[4..8].try_into().unwrap())
}

fn read_next_page_id(bytes: &[u8]) -> PageId {
    i32::from_le_bytes(bytes[0..4].try_into().unwrap())
}

fn read_first_tuple_slot(bytes: &[u8]) -> Option<u32> {
    (0..read_tuple_count(bytes)).find(|&slot| read_raw_slot(bytes, slot).1 > 0)
}

fn read_next_tuple_slot(bytes: &[u8], after: u32) -> Option<u32> {
    ((after + 1)..read_tuple_count(bytes)).find(|&slot| read_raw_slot(bytes, slot).1 > 0)
}

fn read_tuple(bytes: &[u8], slot: u32) -> Option<Vec<u8>> {
    if slot >= read_tuple_count(bytes) {
        return None;
    }
    let (offset, size) = read_raw_slot(bytes, slot);
    if size <= 0 {
        return None;
    }
    let offset = offset as usize;
    Some(bytes[offset..offset + size as usize].to_vec())
}

/// Read-only view over a table page's bytes, for callers holding only a
/// read latch (`get_tuple`, iteration, the next-page-id check during
/// insert's page walk).
pub struct TablePageView<'a> {
    bytes: &'a [u8],
}

impl<'a> TablePageView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        assert_eq!(bytes.len(), PAGE_SIZE);
        Self { bytes }
    }

    pub fn next_page_id(&self) -> PageId {
        read_next_page_id(self.bytes)
    }

    pub fn tuple_count(&self) -> u32 {
        read_tuple_count(self.bytes)
    }

    pub fn get_tuple(&self, slot: u32) -> Option<Vec<u8>> {
        read_tuple(self.bytes, slot)
    }

    pub fn first_tuple_slot(&self) -> Option<u32> {
        read_first_tuple_slot(self.bytes)
    }

    pub fn next_tuple_slot(&self, after: u32) -> Option<u32> {
        read_next_tuple_slot(self.bytes, after)
    }
}

pub struct TablePage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> TablePage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        assert_eq!(bytes.len(), PAGE_SIZE);
        Self { bytes }
    }

    pub fn init(&mut self, next_page_id: PageId) {
        self.set_next_page_id(next_page_id);
        self.set_tuple_count(0);
        self.set_free_space_pointer(PAGE_SIZE as u32);
    }

    pub fn next_page_id(&self) -> PageId {
        i32::from_le_bytes(self.bytes[0..4].try_into().unwrap())
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        self.bytes[0..4].copy_from_slice(&page_id.to_le_bytes());
    }

    pub fn tuple_count(&self) -> u32 {
        u32::from_le_bytes(self.bytes[4..8].try_into().unwrap())
    }

    fn set_tuple_count(&mut self, count: u32) {
        self.bytes[4..8].copy_from_slice(&count.to_le_bytes());
    }

    fn free_space_pointer(&self) -> u32 {
        u32::from_le_bytes(self.bytes[8..12].try_into().unwrap())
    }

    fn set_free_space_pointer(&mut self, ptr: u32) {
        self.bytes[8..12].copy_from_slice(&ptr.to_le_bytes());
    }

    fn slot_offset_field(&self, slot: u32) -> usize {
        HEADER_SIZE + slot as usize * SLOT_SIZE
    }

    fn raw_slot(&self, slot: u32) -> (u32, i32) {
        let off = self.slot_offset_field(slot);
        let offset = u32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap());
        let size = i32::from_le_bytes(self.bytes[off + 4..off + 8].try_into().unwrap());
        (offset, size)
    }

    fn set_raw_slot(&mut self, slot: u32, offset: u32, size: i32) {
        let off = self.slot_offset_field(slot);
        self.bytes[off..off + 4].copy_from_slice(&offset.to_le_bytes());
        self.bytes[off + 4..off + 8].copy_from_slice(&size.to_le_bytes());
    }

    /// End of the slot directory, i.e. where tuple bytes must not overlap.
    fn directory_end(&self, tuple_count: u32) -> usize {
        HEADER_SIZE + tuple_count as usize * SLOT_SIZE
    }

    fn first_empty_slot(&self) -> Option<u32> {
        for slot in 0..self.tuple_count() {
            if self.raw_slot(slot).1 == 0 {
                return Some(slot);
            }
        }
        None
    }

    /// Inserts `tuple_bytes`, reusing an empty slot if one exists, else
    /// appending a new slot. Returns the slot number, or `None` if the
    /// page has no room.
    pub fn insert_tuple(&mut self, tuple_bytes: &[u8]) -> Option<u32> {
        let tuple_count = self.tuple_count();
        let reuse = self.first_empty_slot();
        let needs_new_slot = reuse.is_none();
        let directory_end = self.directory_end(tuple_count)
            + if needs_new_slot { SLOT_SIZE } else { 0 };
        let free_space_ptr = self.free_space_pointer() as usize;
        if free_space_ptr < tuple_bytes.len() || free_space_ptr - tuple_bytes.len() < directory_end
        {
            return None;
        }

        let new_ptr = free_space_ptr - tuple_bytes.len();
        self.bytes[new_ptr..new_ptr + tuple_bytes.len()].copy_from_slice(tuple_bytes);
        self.set_free_space_pointer(new_ptr as u32);

        let slot = match reuse {
            Some(slot) => slot,
            None => {
                self.set_tuple_count(tuple_count + 1);
                tuple_count
            }
        };
        self.set_raw_slot(slot, new_ptr as u32, tuple_bytes.len() as i32);
        Some(slot)
    }

    pub fn get_tuple(&self, slot: u32) -> Option<Vec<u8>> {
        if slot >= self.tuple_count() {
            return None;
        }
        let (offset, size) = self.raw_slot(slot);
        if size <= 0 {
            return None;
        }
        let offset = offset as usize;
        Some(self.bytes[offset..offset + size as usize].to_vec())
    }

    /// `None` if the slot is out of range, already empty, or already
    /// tombstoned.
    pub fn mark_delete(&mut self, slot: u32) -> Option<()> {
        if slot >= self.tuple_count() {
            return None;
        }
        let (offset, size) = self.raw_slot(slot);
        if size <= 0 {
            return None;
        }
        self.set_raw_slot(slot, offset, -size);
        Some(())
    }

    pub fn rollback_delete(&mut self, slot: u32) -> Option<()> {
        if slot >= self.tuple_count() {
            return None;
        }
        let (offset, size) = self.raw_slot(slot);
        if size >= 0 {
            return None;
        }
        self.set_raw_slot(slot, offset, -size);
        Some(())
    }

    /// Physically frees the slot (bytes are not reclaimed). No-op if
    /// already empty.
    pub fn apply_delete(&mut self, slot: u32) {
        if slot >= self.tuple_count() {
            return;
        }
        self.set_raw_slot(slot, 0, 0);
    }

    pub fn update_tuple(&mut self, slot: u32, new_bytes: &[u8]) -> UpdateResult {
        if slot >= self.tuple_count() {
            return UpdateResult::OutOfBounds;
        }
        let (offset, size) = self.raw_slot(slot);
        if size <= 0 {
            return UpdateResult::Deleted;
        }
        if new_bytes.len() > size as usize {
            return UpdateResult::TooLarge;
        }
        let offset = offset as usize;
        self.bytes[offset..offset + new_bytes.len()].copy_from_slice(new_bytes);
        self.set_raw_slot(slot, offset as u32, new_bytes.len() as i32);
        UpdateResult::Ok
    }

    /// Lowest slot index holding a live (non-tombstoned, non-empty) tuple.
    pub fn first_tuple_slot(&self) -> Option<u32> {
        (0..self.tuple_count()).find(|&slot| self.raw_slot(slot).1 > 0)
    }

    /// Lowest live slot index strictly greater than `after`.
    pub fn next_tuple_slot(&self, after: u32) -> Option<u32> {
        ((after + 1)..self.tuple_count()).find(|&slot| self.raw_slot(slot).1 > 0)
    }
}

pub fn empty_page_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; PAGE_SIZE];
    let mut page = TablePage::new(&mut bytes);
    page.init(INVALID_PAGE_ID);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_roundtrip() {
        let mut buf = empty_page_bytes();
        let mut page = TablePage::new(&mut buf);
        let slot = page.insert_tuple(b"hello world").unwrap();
        assert_eq!(page.get_tuple(slot).unwrap(), b"hello world");
    }

    #[test]
    fn mark_delete_hides_then_rollback_restores() {
        let mut buf = empty_page_bytes();
        let mut page = TablePage::new(&mut buf);
        let slot = page.insert_tuple(b"abc").unwrap();
        page.mark_delete(slot).unwrap();
        assert!(page.get_tuple(slot).is_none());
        page.rollback_delete(slot).unwrap();
        assert_eq!(page.get_tuple(slot).unwrap(), b"abc");
    }

    #[test]
    fn apply_delete_frees_slot_for_reuse() {
        let mut buf = empty_page_bytes();
        let mut page = TablePage::new(&mut buf);
        let slot = page.insert_tuple(b"abc").unwrap();
        page.apply_delete(slot);
        assert!(page.get_tuple(slot).is_none());
        let reused = page.insert_tuple(b"xyz").unwrap();
        assert_eq!(reused, slot);
        assert_eq!(page.get_tuple(slot).unwrap(), b"xyz");
    }

    #[test]
    fn update_in_place_vs_too_large() {
        let mut buf = empty_page_bytes();
        let mut page = TablePage::new(&mut buf);
        let slot = page.insert_tuple(b"abcde").unwrap();
        assert_eq!(page.update_tuple(slot, b"xyz"), UpdateResult::Ok);
        assert_eq!(page.get_tuple(slot).unwrap(), b"xyz");
        assert_eq!(
            page.update_tuple(slot, b"this is way too long"),
            UpdateResult::TooLarge
        );
    }

    #[test]
    fn insert_fails_when_page_is_full() {
        let mut buf = empty_page_bytes();
        let mut page = TablePage::new(&mut buf);
        let tuple = vec![0xABu8; 200];
        let mut inserted = 0;
        while page.insert_tuple(&tuple).is_some() {
            inserted += 1;
        }
        assert!(inserted > 0);
        assert!(page.insert_tuple(&tuple).is_none());
    }
}
