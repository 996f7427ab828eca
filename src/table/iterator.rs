//! Standalone forward iterator over a table heap's live tuples (spec.md
//! §4.4 "begin()/end()"). Grounded on
//! `original_source/src/storage/table_iterator.cpp`: the iterator stores
//! only the current `RowId`, re-fetching pages on each step rather than
//! holding a pin across steps (spec.md §9, "iterators store only the
//! current PageId + slot index to survive eviction").

use crate::record::Row;
use crate::types::RowId;

use super::table_heap::TableHeap;

pub struct TableIterator<'a> {
    heap: &'a TableHeap,
    current: RowId,
}

impl<'a> TableIterator<'a> {
    pub fn begin(heap: &'a TableHeap) -> crate::error::StorageResult<Self> {
        let current = heap.first_rid()?;
        Ok(Self { heap, current })
    }

    pub fn end(heap: &'a TableHeap) -> Self {
        Self {
            heap,
            current: RowId::INVALID,
        }
    }

    pub fn is_end(&self) -> bool {
        !self.current.is_valid()
    }
}

impl<'a> Iterator for TableIterator<'a> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.is_end() {
            return None;
        }
        let rid = self.current;
        let row = self
            .heap
            .get_tuple(rid)
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("table iterator landed on a missing tuple at {:?}", rid));
        self.current = self.heap.next_rid(rid).unwrap_or(RowId::INVALID);
        Some(row)
    }
}
