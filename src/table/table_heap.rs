//! Table Heap (C4): a singly-linked list of slotted pages rooted at
//! `first_page_id` (spec.md §4.4). Grounded on
//! `original_source/src/storage/table_heap.cpp` for the insert
//! page-walk/page-allocate algorithm and the four-way `update_tuple`
//! branching (in-place / out-of-bounds / tombstoned / relocate).

use std::sync::{Arc, Mutex};

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::config::PAGE_SIZE;
use crate::error::{StorageError, StorageResult};
use crate::lock_manager::{LockManager, NoOpLockManager};
use crate::log_manager::{LogManager, NoOpLogManager};
use crate::record::{Row, Schema};
use crate::types::{PageId, RowId, INVALID_PAGE_ID};

use super::table_page::{TablePage, TablePageView, UpdateResult, SLOT_HEADER_OVERHEAD};

pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    schema: Schema,
    log_manager: Mutex<Box<dyn LogManager + Send>>,
    lock_manager: Mutex<Box<dyn LockManager + Send>>,
}

impl TableHeap {
    /// Allocates the heap's first page and returns the new heap.
    pub fn create(bpm: Arc<BufferPoolManager>, schema: Schema) -> StorageResult<Self> {
        let pinned = bpm.new_page()?;
        {
            let mut bytes = pinned.data.write().unwrap();
            let mut page = TablePage::new(&mut bytes);
            page.init(INVALID_PAGE_ID);
        }
        let first_page_id = pinned.page_id;
        bpm.unpin_page(first_page_id, true)?;
        Ok(Self {
            bpm,
            first_page_id,
            schema,
            log_manager: Mutex::new(Box::new(NoOpLogManager)),
            lock_manager: Mutex::new(Box::new(NoOpLockManager)),
        })
    }

    /// Reopens a heap whose first page already exists on disk.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId, schema: Schema) -> Self {
        Self {
            bpm,
            first_page_id,
            schema,
            log_manager: Mutex::new(Box::new(NoOpLogManager)),
            lock_manager: Mutex::new(Box::new(NoOpLockManager)),
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn insert_tuple(&self, row: &mut Row) -> StorageResult<bool> {
        let row_size = row.serialized_size();
        if row_size + SLOT_HEADER_OVERHEAD > PAGE_SIZE {
            return Err(StorageError::TupleTooLarge { size: row_size });
        }

        let mut cur_page_id = self.first_page_id;
        loop {
            let pinned = self.bpm.fetch_page(cur_page_id)?;
            let slot = {
                let mut bytes = pinned.data.write().unwrap();
                let mut page = TablePage::new(&mut bytes);
                // Tentatively use an invalid rid for sizing; the real rid
                // is assigned once the slot is known, then re-encoded.
                page.insert_tuple(&row.encode())
            };

            if let Some(slot) = slot {
                row.rid = RowId::new(cur_page_id, slot);
                {
                    let mut bytes = pinned.data.write().unwrap();
                    let mut page = TablePage::new(&mut bytes);
                    page.update_tuple(slot, &row.encode());
                }
                self.log_manager.lock().unwrap().log_insert(cur_page_id);
                self.bpm.unpin_page(cur_page_id, true)?;
                return Ok(true);
            }

            let next_page_id = {
                let bytes = pinned.data.read().unwrap();
                TablePageView::new(&bytes).next_page_id()
            };

            if next_page_id != INVALID_PAGE_ID {
                self.bpm.unpin_page(cur_page_id, false)?;
                cur_page_id = next_page_id;
                continue;
            }

            let new_pinned = match self.bpm.new_page() {
                Ok(p) => p,
                Err(e) => {
                    self.bpm.unpin_page(cur_page_id, false)?;
                    return Err(e);
                }
            };
            {
                let mut bytes = new_pinned.data.write().unwrap();
                let mut page = TablePage::new(&mut bytes);
                page.init(INVALID_PAGE_ID);
            }
            {
                let mut bytes = pinned.data.write().unwrap();
                let mut page = TablePage::new(&mut bytes);
                page.set_next_page_id(new_pinned.page_id);
            }
            debug!(
                "table heap: extending chain {} -> {}",
                cur_page_id, new_pinned.page_id
            );
            self.bpm.unpin_page(cur_page_id, true)?;
            cur_page_id = new_pinned.page_id;
            self.bpm.unpin_page(new_pinned.page_id, false)?;
        }
    }

    pub fn mark_delete(&self, rid: RowId) -> StorageResult<bool> {
        let pinned = self.bpm.fetch_page(rid.page_id)?;
        let ok = {
            let mut bytes = pinned.data.write().unwrap();
            let mut page = TablePage::new(&mut bytes);
            page.mark_delete(rid.slot_num).is_some()
        };
        self.log_manager.lock().unwrap().log_delete(rid.page_id);
        self.bpm.unpin_page(rid.page_id, true)?;
        Ok(ok)
    }

    pub fn rollback_delete(&self, rid: RowId) -> StorageResult<bool> {
        let pinned = self.bpm.fetch_page(rid.page_id)?;
        let ok = {
            let mut bytes = pinned.data.write().unwrap();
            let mut page = TablePage::new(&mut bytes);
            page.rollback_delete(rid.slot_num).is_some()
        };
        self.bpm.unpin_page(rid.page_id, true)?;
        Ok(ok)
    }

    pub fn apply_delete(&self, rid: RowId) -> StorageResult<()> {
        let pinned = self.bpm.fetch_page(rid.page_id)?;
        {
            let mut bytes = pinned.data.write().unwrap();
            let mut page = TablePage::new(&mut bytes);
            page.apply_delete(rid.slot_num);
        }
        self.log_manager.lock().unwrap().log_delete(rid.page_id);
        self.bpm.unpin_page(rid.page_id, true)?;
        Ok(())
    }

    /// On relocation (tuple grew too large for its slot) `row.rid` is
    /// updated to the new location; callers must refresh any index
    /// entries pointing at the old `rid`.
    pub fn update_tuple(&self, row: &mut Row, rid: RowId) -> StorageResult<bool> {
        let pinned = self.bpm.fetch_page(rid.page_id)?;
        row.rid = rid;
        let result = {
            let mut bytes = pinned.data.write().unwrap();
            let mut page = TablePage::new(&mut bytes);
            page.update_tuple(rid.slot_num, &row.encode())
        };
        match result {
            UpdateResult::Ok => {
                self.log_manager.lock().unwrap().log_update(rid.page_id);
                self.bpm.unpin_page(rid.page_id, true)?;
                Ok(true)
            }
            UpdateResult::OutOfBounds => {
                self.bpm.unpin_page(rid.page_id, false)?;
                Ok(false)
            }
            UpdateResult::Deleted => {
                {
                    let mut bytes = pinned.data.write().unwrap();
                    let mut page = TablePage::new(&mut bytes);
                    page.apply_delete(rid.slot_num);
                }
                self.bpm.unpin_page(rid.page_id, false)?;
                Ok(true)
            }
            UpdateResult::TooLarge => {
                {
                    let mut bytes = pinned.data.write().unwrap();
                    let mut page = TablePage::new(&mut bytes);
                    page.apply_delete(rid.slot_num);
                }
                self.bpm.unpin_page(rid.page_id, true)?;
                self.insert_tuple(row)
            }
        }
    }

    pub fn get_tuple(&self, rid: RowId) -> StorageResult<Option<Row>> {
        let pinned = self.bpm.fetch_page(rid.page_id)?;
        let tuple_bytes = {
            let bytes = pinned.data.read().unwrap();
            TablePageView::new(&bytes).get_tuple(rid.slot_num)
        };
        self.bpm.unpin_page(rid.page_id, false)?;
        Ok(tuple_bytes.map(|bytes| {
            let mut cursor = std::io::Cursor::new(bytes);
            Row::decode_from(&mut cursor, &self.schema)
        }))
    }

    /// First live tuple's RowId starting at `first_page_id`, or
    /// `RowId::INVALID` (= `end()`) if the heap is empty.
    pub(crate) fn first_rid(&self) -> StorageResult<RowId> {
        let mut page_id = self.first_page_id;
        loop {
            let pinned = self.bpm.fetch_page(page_id)?;
            let (slot, next_page_id) = {
                let bytes = pinned.data.read().unwrap();
                let page = TablePageView::new(&bytes);
                (page.first_tuple_slot(), page.next_page_id())
            };
            self.bpm.unpin_page(page_id, false)?;
            if let Some(slot) = slot {
                return Ok(RowId::new(page_id, slot));
            }
            if next_page_id == INVALID_PAGE_ID {
                return Ok(RowId::INVALID);
            }
            page_id = next_page_id;
        }
    }

    /// Frees every page in the chain starting at `first_page_id`. The
    /// heap must not be used afterwards.
    pub fn delete_table(&self) -> StorageResult<()> {
        let mut page_id = self.first_page_id;
        while page_id != INVALID_PAGE_ID {
            let next_page_id = {
                let pinned = self.bpm.fetch_page(page_id)?;
                let bytes = pinned.data.read().unwrap();
                TablePageView::new(&bytes).next_page_id()
            };
            self.bpm.unpin_page(page_id, false)?;
            self.bpm.delete_page(page_id)?;
            page_id = next_page_id;
        }
        Ok(())
    }

    /// The live RowId following `rid`, or `RowId::INVALID` at the end of
    /// the chain.
    pub(crate) fn next_rid(&self, rid: RowId) -> StorageResult<RowId> {
        let mut page_id = rid.page_id;
        let mut after = Some(rid.slot_num);
        loop {
            let pinned = self.bpm.fetch_page(page_id)?;
            let (slot, next_page_id) = {
                let bytes = pinned.data.read().unwrap();
                let page = TablePageView::new(&bytes);
                let slot = match after {
                    Some(after) => page.next_tuple_slot(after),
                    None => page.first_tuple_slot(),
                };
                (slot, page.next_page_id())
            };
            self.bpm.unpin_page(page_id, false)?;
            if let Some(slot) = slot {
                return Ok(RowId::new(page_id, slot));
            }
            if next_page_id == INVALID_PAGE_ID {
                return Ok(RowId::INVALID);
            }
            page_id = next_page_id;
            after = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use crate::record::{Column, Field};
    use crate::table::TableIterator;
    use tempfile::NamedTempFile;

    fn fresh_heap() -> (NamedTempFile, TableHeap) {
        let file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::open(file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(8, dm));
        let schema = Schema::new(
            vec![
                Column::new_int("id", 0, false, true),
                Column::new_char("payload", 180, 1, true, false),
            ],
            false,
        );
        let heap = TableHeap::create(bpm, schema).unwrap();
        (file, heap)
    }

    fn make_row(heap: &TableHeap, id: i32) -> Row {
        let payload = vec![b'x'; 180];
        let mut row = Row::new(vec![Field::Int(Some(id)), Field::Char(Some(payload))]);
        row.rid = RowId::INVALID;
        let _ = heap;
        row
    }

    #[test]
    fn insert_and_get() {
        let (_f, heap) = fresh_heap();
        let mut row = make_row(&heap, 1);
        assert!(heap.insert_tuple(&mut row).unwrap());
        let fetched = heap.get_tuple(row.rid).unwrap().unwrap();
        assert_eq!(fetched.fields[0], Field::Int(Some(1)));
    }

    #[test]
    fn mark_then_apply_delete_hides_tuple() {
        let (_f, heap) = fresh_heap();
        let mut row = make_row(&heap, 1);
        heap.insert_tuple(&mut row).unwrap();
        assert!(heap.mark_delete(row.rid).unwrap());
        assert!(heap.get_tuple(row.rid).unwrap().is_none());
        heap.apply_delete(row.rid).unwrap();
        assert!(heap.get_tuple(row.rid).unwrap().is_none());
    }

    #[test]
    fn rollback_delete_restores_visibility() {
        let (_f, heap) = fresh_heap();
        let mut row = make_row(&heap, 1);
        heap.insert_tuple(&mut row).unwrap();
        heap.mark_delete(row.rid).unwrap();
        heap.rollback_delete(row.rid).unwrap();
        assert!(heap.get_tuple(row.rid).unwrap().is_some());
    }

    #[test]
    fn delete_table_frees_every_page_in_the_chain() {
        let (_f, heap) = fresh_heap();
        for i in 0..100 {
            let mut row = make_row(&heap, i);
            heap.insert_tuple(&mut row).unwrap();
        }
        heap.delete_table().unwrap();
    }

    #[test]
    fn heap_wrap_1000_tuples_every_third_deleted() {
        let (_f, heap) = fresh_heap();
        let mut rids = Vec::with_capacity(1000);
        for i in 0..1000 {
            let mut row = make_row(&heap, i);
            heap.insert_tuple(&mut row).unwrap();
            rids.push(row.rid);
        }

        let count = TableIterator::begin(&heap).unwrap().count();
        assert_eq!(count, 1000);

        for (i, rid) in rids.iter().enumerate() {
            if i % 3 == 2 {
                heap.apply_delete(*rid).unwrap();
            }
        }

        let deleted: std::collections::HashSet<_> = rids
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == 2)
            .map(|(_, r)| *r)
            .collect();

        let mut seen = 0;
        let mut it = TableIterator::begin(&heap).unwrap();
        while let Some(row) = it.next() {
            assert!(!deleted.contains(&row.rid));
            seen += 1;
        }
        assert_eq!(seen, 667);
    }
}
