//! B+ Tree Index (C5): a disk-resident B+ tree mapping fixed-size opaque
//! keys to [`RowId`]s (spec.md §4.5). Grounded on
//! `original_source/src/index/b_plus_tree.cpp` for the tree-level
//! algorithms (GetValue/Insert/StartNewTree/InsertIntoLeaf/Split/
//! InsertIntoParent/Remove/CoalesceOrRedistribute/Coalesce/Redistribute/
//! AdjustRoot/FindLeafPage/UpdateRootPageId), translated onto the
//! [`super::page::LeafPage`]/[`super::page::InternalPage`] byte layouts
//! with two deliberate divergences (spec.md §9):
//!
//! - `UpdateRootPageId` is called only when `root_page_id` itself changes
//!   (a fresh tree, a new root from a split, or a root collapse), never
//!   after an ordinary non-root split. The original calls it
//!   unconditionally after every leaf split.
//! - `End()`'s contract (spec.md §4.5.4: "one past the last entry of the
//!   rightmost leaf") is met without ever descending the rightmost path:
//!   the sentinel `IndexIterator::end` state is exactly the state any
//!   live iterator reaches once it steps past its chain's last entry, so
//!   `end()` just returns that sentinel directly. The original's `End()`
//!   calls `FindLeafPage(nullptr, ..., false)`, whose descent condition
//!   (`leftMost || key == nullptr`) is true regardless of the `leftMost`
//!   argument when `key` is null — it actually walks the leftmost path,
//!   not the rightmost one its own naming implies.

use std::sync::{Arc, Mutex};

use crate::buffer::{with_read_page, with_two_write_pages, with_write_page, BufferPoolManager};
use crate::error::StorageResult;
use crate::lock_manager::{LockManager, NoOpLockManager};
use crate::log_manager::{LogManager, NoOpLogManager};
use crate::types::{PageId, RowId, INVALID_PAGE_ID};

use super::index_roots_page::{read_root_id, IndexRootsPage};
use super::iterator::IndexIterator;
use super::key::KeyManager;
use super::page::{
    is_root, page_kind, parent_page_id, set_parent_page_id, size, InternalPage, InternalPageView,
    LeafPage, LeafPageView, PageKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

pub struct BPlusTree {
    bpm: Arc<BufferPoolManager>,
    index_id: u32,
    index_roots_page_id: PageId,
    key_manager: Box<dyn KeyManager>,
    key_size: usize,
    leaf_max_size: u32,
    internal_max_size: u32,
    root_page_id: Mutex<PageId>,
    log_manager: Mutex<Box<dyn LogManager + Send>>,
    lock_manager: Mutex<Box<dyn LockManager + Send>>,
}

impl BPlusTree {
    /// Registers a brand-new, empty index in the roots page.
    pub fn create(
        bpm: Arc<BufferPoolManager>,
        index_id: u32,
        index_roots_page_id: PageId,
        key_manager: Box<dyn KeyManager>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> StorageResult<Self> {
        let key_size = key_manager.key_size();
        with_write_page(&bpm, index_roots_page_id, |bytes| {
            IndexRootsPage::new(bytes).insert(index_id, INVALID_PAGE_ID);
        })?;
        Ok(Self {
            bpm,
            index_id,
            index_roots_page_id,
            key_manager,
            key_size,
            leaf_max_size,
            internal_max_size,
            root_page_id: Mutex::new(INVALID_PAGE_ID),
            log_manager: Mutex::new(Box::new(NoOpLogManager)),
            lock_manager: Mutex::new(Box::new(NoOpLockManager)),
        })
    }

    /// Reopens an index whose root is already recorded on the roots page.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        index_id: u32,
        index_roots_page_id: PageId,
        key_manager: Box<dyn KeyManager>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> StorageResult<Self> {
        let key_size = key_manager.key_size();
        let root = with_read_page(&bpm, index_roots_page_id, |bytes| {
            read_root_id(bytes, index_id)
        })?
        .unwrap_or(INVALID_PAGE_ID);
        Ok(Self {
            bpm,
            index_id,
            index_roots_page_id,
            key_manager,
            key_size,
            leaf_max_size,
            internal_max_size,
            root_page_id: Mutex::new(root),
            log_manager: Mutex::new(Box::new(NoOpLogManager)),
            lock_manager: Mutex::new(Box::new(NoOpLockManager)),
        })
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id() == INVALID_PAGE_ID
    }

    /// Recursively frees every page reachable from the root
    /// (internal-then-children, leaves deleted directly). The tree must
    /// not be used afterwards.
    pub fn destroy(&self) -> StorageResult<()> {
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            return Ok(());
        }
        self.destroy_subtree(root)?;
        self.update_root_page_id(INVALID_PAGE_ID)
    }

    fn destroy_subtree(&self, page_id: PageId) -> StorageResult<()> {
        let children = with_read_page(&self.bpm, page_id, |bytes| match page_kind(bytes) {
            PageKind::Internal => InternalPageView::new(bytes).children(),
            _ => Vec::new(),
        })?;
        for child in children {
            self.destroy_subtree(child)?;
        }
        self.bpm.delete_page(page_id)?;
        Ok(())
    }

    fn min_size(max_size: u32) -> u32 {
        (max_size + 1) / 2
    }

    fn update_root_page_id(&self, new_root: PageId) -> StorageResult<()> {
        with_write_page(&self.bpm, self.index_roots_page_id, |bytes| {
            let mut page = IndexRootsPage::new(bytes);
            if !page.update(self.index_id, new_root) {
                page.insert(self.index_id, new_root);
            }
        })?;
        *self.root_page_id.lock().unwrap() = new_root;
        Ok(())
    }

    fn descend(&self, chooser: impl Fn(&InternalPageView) -> PageId) -> StorageResult<PageId> {
        let mut page_id = self.root_page_id();
        loop {
            let next = with_read_page(&self.bpm, page_id, |bytes| match page_kind(bytes) {
                PageKind::Leaf => None,
                PageKind::Internal => Some(chooser(&InternalPageView::new(bytes))),
                PageKind::Invalid => panic!("b+ tree descended into an uninitialized page"),
            })?;
            match next {
                Some(child) => page_id = child,
                None => return Ok(page_id),
            }
        }
    }

    fn find_leaf_for_key(&self, key: &[u8]) -> StorageResult<PageId> {
        self.descend(|page| page.lookup(key, self.key_manager.as_ref()))
    }

    fn find_leftmost_leaf(&self) -> StorageResult<PageId> {
        self.descend(|page| page.value_at(0))
    }

    pub fn get_value(&self, key: &[u8]) -> StorageResult<Option<RowId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_id = self.find_leaf_for_key(key)?;
        with_read_page(&self.bpm, leaf_id, |bytes| {
            LeafPageView::new(bytes).lookup(key, self.key_manager.as_ref())
        })
    }

    /// Inserts `(key, value)`. Returns `false` if `key` is already
    /// present (spec.md §4.5.2: "duplicate keys are rejected").
    pub fn insert(&self, key: &[u8], value: RowId) -> StorageResult<bool> {
        let inserted = if self.is_empty() {
            self.start_new_tree(key, value)?;
            true
        } else {
            self.insert_into_leaf(key, value)?
        };
        if inserted {
            self.log_manager.lock().unwrap().log_insert(value.page_id);
        }
        Ok(inserted)
    }

    fn start_new_tree(&self, key: &[u8], value: RowId) -> StorageResult<()> {
        let pinned = self.bpm.new_page()?;
        let leaf_id = pinned.page_id;
        {
            let mut bytes = pinned.data.write().unwrap();
            let mut leaf = LeafPage::new(&mut bytes);
            leaf.init(self.key_size, self.leaf_max_size, INVALID_PAGE_ID);
            leaf.insert(key, value, self.key_manager.as_ref());
        }
        self.bpm.unpin_page(leaf_id, true)?;
        self.update_root_page_id(leaf_id)
    }

    fn insert_into_leaf(&self, key: &[u8], value: RowId) -> StorageResult<bool> {
        let leaf_id = self.find_leaf_for_key(key)?;
        let inserted_size = with_write_page(&self.bpm, leaf_id, |bytes| {
            LeafPage::new(bytes).insert(key, value, self.key_manager.as_ref())
        })?;
        let new_size = match inserted_size {
            Some(s) => s,
            None => return Ok(false),
        };
        if new_size > self.leaf_max_size {
            let (split_key, new_leaf_id) = self.split_leaf(leaf_id)?;
            self.insert_into_parent(leaf_id, &split_key, new_leaf_id)?;
        }
        Ok(true)
    }

    /// Allocates a sibling leaf, moves the upper half of `leaf_id`'s
    /// entries onto it, and splices it into the leaf chain.
    fn split_leaf(&self, leaf_id: PageId) -> StorageResult<(Vec<u8>, PageId)> {
        let pinned = self.bpm.new_page()?;
        let new_id = pinned.page_id;
        {
            let mut bytes = pinned.data.write().unwrap();
            LeafPage::new(&mut bytes).init(self.key_size, self.leaf_max_size, INVALID_PAGE_ID);
        }
        self.bpm.unpin_page(new_id, true)?;

        let split_key = with_two_write_pages(&self.bpm, leaf_id, new_id, |leaf_bytes, new_bytes| {
            let mut leaf = LeafPage::new(leaf_bytes);
            let mut new_leaf = LeafPage::new(new_bytes);
            let old_next = leaf.next_page_id();
            leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(old_next);
            leaf.set_next_page_id(new_id);
            new_leaf.key_at(0).to_vec()
        })?;
        Ok((split_key, new_id))
    }

    /// Allocates a sibling internal page, moves the upper half of
    /// `node_id`'s entries onto it, and reparents the moved children.
    fn split_internal(&self, node_id: PageId) -> StorageResult<(Vec<u8>, PageId)> {
        let pinned = self.bpm.new_page()?;
        let new_id = pinned.page_id;
        {
            let mut bytes = pinned.data.write().unwrap();
            InternalPage::new(&mut bytes).init(self.key_size, self.internal_max_size, INVALID_PAGE_ID);
        }
        self.bpm.unpin_page(new_id, true)?;

        let (pushed_key, moved_children) =
            with_two_write_pages(&self.bpm, node_id, new_id, |node_bytes, new_bytes| {
                let mut node = InternalPage::new(node_bytes);
                let mut new_internal = InternalPage::new(new_bytes);
                let split_index = node.size() / 2;
                let pushed_key = node.key_at(split_index).to_vec();
                node.move_half_to(&mut new_internal);
                (pushed_key, new_internal.children())
            })?;
        for child in moved_children {
            with_write_page(&self.bpm, child, |bytes| set_parent_page_id(bytes, new_id))?;
        }
        Ok((pushed_key, new_id))
    }

    /// Splices `new_id` in after `old_id`, pushing `split_key` up into
    /// `old_id`'s parent (creating a new root if `old_id` had none).
    fn insert_into_parent(&self, old_id: PageId, split_key: &[u8], new_id: PageId) -> StorageResult<()> {
        let parent_id = with_read_page(&self.bpm, old_id, |bytes| parent_page_id(bytes))?;

        if parent_id == INVALID_PAGE_ID {
            let pinned = self.bpm.new_page()?;
            let new_root_id = pinned.page_id;
            {
                let mut bytes = pinned.data.write().unwrap();
                let mut root = InternalPage::new(&mut bytes);
                root.init(self.key_size, self.internal_max_size, INVALID_PAGE_ID);
                root.populate_new_root(old_id, split_key, new_id);
            }
            self.bpm.unpin_page(new_root_id, true)?;
            with_write_page(&self.bpm, old_id, |bytes| set_parent_page_id(bytes, new_root_id))?;
            with_write_page(&self.bpm, new_id, |bytes| set_parent_page_id(bytes, new_root_id))?;
            return self.update_root_page_id(new_root_id);
        }

        with_write_page(&self.bpm, new_id, |bytes| set_parent_page_id(bytes, parent_id))?;
        let new_parent_size = with_write_page(&self.bpm, parent_id, |bytes| {
            InternalPage::new(bytes).insert_node_after(old_id, split_key, new_id)
        })?;
        if new_parent_size > self.internal_max_size {
            let (pushed_key, sibling_id) = self.split_internal(parent_id)?;
            self.insert_into_parent(parent_id, &pushed_key, sibling_id)?;
        }
        Ok(())
    }

    /// Removes `key`. Returns `false` if it was not present.
    pub fn remove(&self, key: &[u8]) -> StorageResult<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        let leaf_id = self.find_leaf_for_key(key)?;
        let removed = with_write_page(&self.bpm, leaf_id, |bytes| {
            LeafPage::new(bytes).remove(key, self.key_manager.as_ref())
        })?;
        if !removed {
            return Ok(false);
        }
        self.log_manager.lock().unwrap().log_delete(leaf_id);
        self.coalesce_or_redistribute(leaf_id)?;
        Ok(true)
    }

    /// Fixes an underflow at `node_id` by merging it into a sibling or
    /// borrowing an entry from one, recursing up the tree as needed
    /// (`CoalesceOrRedistribute`).
    fn coalesce_or_redistribute(&self, node_id: PageId) -> StorageResult<()> {
        let (kind, node_size, parent_id, root) = with_read_page(&self.bpm, node_id, |bytes| {
            (page_kind(bytes), size(bytes), parent_page_id(bytes), is_root(bytes))
        })?;
        if root {
            return self.adjust_root(node_id);
        }

        let max_size = match kind {
            PageKind::Leaf => self.leaf_max_size,
            PageKind::Internal => self.internal_max_size,
            PageKind::Invalid => unreachable!(),
        };
        if node_size >= Self::min_size(max_size) {
            return Ok(());
        }

        let node_index =
            with_read_page(&self.bpm, parent_id, |bytes| InternalPageView::new(bytes).value_index(node_id))?;
        let (sibling_index, node_is_left) = if node_index == 0 {
            (1, true)
        } else {
            (node_index - 1, false)
        };
        let sibling_id = with_read_page(&self.bpm, parent_id, |bytes| {
            InternalPageView::new(bytes).value_at(sibling_index)
        })?;
        let sibling_size = with_read_page(&self.bpm, sibling_id, |bytes| size(bytes))?;

        if node_size + sibling_size < max_size {
            self.coalesce(kind, node_id, sibling_id, node_is_left, parent_id)
        } else {
            self.redistribute(kind, node_id, sibling_id, node_index, sibling_index, node_is_left, parent_id)
        }
    }

    /// Merges `node_id` and `sibling_id` into the left of the pair,
    /// drops the right page, and removes its entry from the parent
    /// (`Coalesce`).
    fn coalesce(
        &self,
        kind: PageKind,
        node_id: PageId,
        sibling_id: PageId,
        node_is_left: bool,
        parent_id: PageId,
    ) -> StorageResult<()> {
        let (left_id, right_id) = if node_is_left {
            (node_id, sibling_id)
        } else {
            (sibling_id, node_id)
        };
        let separator_index =
            with_read_page(&self.bpm, parent_id, |bytes| InternalPageView::new(bytes).value_index(right_id))?;
        let separator_key = with_read_page(&self.bpm, parent_id, |bytes| {
            InternalPageView::new(bytes).key_at(separator_index).to_vec()
        })?;

        let moved_children = with_two_write_pages(&self.bpm, right_id, left_id, |right_bytes, left_bytes| {
            match kind {
                PageKind::Leaf => {
                    let mut right = LeafPage::new(right_bytes);
                    let mut left = LeafPage::new(left_bytes);
                    right.move_all_to(&mut left);
                    Vec::new()
                }
                PageKind::Internal => {
                    let mut right = InternalPage::new(right_bytes);
                    let mut left = InternalPage::new(left_bytes);
                    let children = right.children();
                    right.move_all_to(&mut left, &separator_key);
                    children
                }
                PageKind::Invalid => unreachable!(),
            }
        })?;
        for child in moved_children {
            with_write_page(&self.bpm, child, |bytes| set_parent_page_id(bytes, left_id))?;
        }
        self.bpm.delete_page(right_id)?;
        with_write_page(&self.bpm, parent_id, |bytes| {
            let mut parent = InternalPage::new(bytes);
            let idx = parent.value_index(right_id);
            parent.remove(idx);
        })?;
        self.coalesce_or_redistribute(parent_id)
    }

    /// Borrows one entry from `sibling_id` to bring `node_id` back up to
    /// its minimum size, updating the separator key in the parent
    /// (`Redistribute`).
    #[allow(clippy::too_many_arguments)]
    fn redistribute(
        &self,
        kind: PageKind,
        node_id: PageId,
        sibling_id: PageId,
        node_index: u32,
        sibling_index: u32,
        node_is_left: bool,
        parent_id: PageId,
    ) -> StorageResult<()> {
        match kind {
            PageKind::Leaf => {
                if node_is_left {
                    with_two_write_pages(&self.bpm, sibling_id, node_id, |sib_bytes, node_bytes| {
                        LeafPage::new(sib_bytes).move_first_to_end_of(&mut LeafPage::new(node_bytes));
                    })?;
                    let new_separator =
                        with_read_page(&self.bpm, sibling_id, |bytes| LeafPageView::new(bytes).key_at(0).to_vec())?;
                    with_write_page(&self.bpm, parent_id, |bytes| {
                        InternalPage::new(bytes).set_key_at(sibling_index, &new_separator)
                    })?;
                } else {
                    with_two_write_pages(&self.bpm, sibling_id, node_id, |sib_bytes, node_bytes| {
                        LeafPage::new(sib_bytes).move_last_to_front_of(&mut LeafPage::new(node_bytes));
                    })?;
                    let new_separator =
                        with_read_page(&self.bpm, node_id, |bytes| LeafPageView::new(bytes).key_at(0).to_vec())?;
                    with_write_page(&self.bpm, parent_id, |bytes| {
                        InternalPage::new(bytes).set_key_at(node_index, &new_separator)
                    })?;
                }
            }
            PageKind::Internal => {
                if node_is_left {
                    let separator_key = with_read_page(&self.bpm, parent_id, |bytes| {
                        InternalPageView::new(bytes).key_at(sibling_index).to_vec()
                    })?;
                    let moved_child =
                        with_read_page(&self.bpm, sibling_id, |bytes| InternalPageView::new(bytes).value_at(0))?;
                    let new_separator = with_read_page(&self.bpm, sibling_id, |bytes| {
                        InternalPageView::new(bytes).key_at(1).to_vec()
                    })?;
                    with_two_write_pages(&self.bpm, sibling_id, node_id, |sib_bytes, node_bytes| {
                        InternalPage::new(sib_bytes)
                            .move_first_to_end_of(&mut InternalPage::new(node_bytes), &separator_key);
                    })?;
                    with_write_page(&self.bpm, moved_child, |bytes| set_parent_page_id(bytes, node_id))?;
                    with_write_page(&self.bpm, parent_id, |bytes| {
                        InternalPage::new(bytes).set_key_at(sibling_index, &new_separator)
                    })?;
                } else {
                    let separator_key = with_read_page(&self.bpm, parent_id, |bytes| {
                        InternalPageView::new(bytes).key_at(node_index).to_vec()
                    })?;
                    let sib_size = with_read_page(&self.bpm, sibling_id, |bytes| InternalPageView::new(bytes).size())?;
                    let moved_child = with_read_page(&self.bpm, sibling_id, |bytes| {
                        InternalPageView::new(bytes).value_at(sib_size - 1)
                    })?;
                    let new_separator = with_read_page(&self.bpm, sibling_id, |bytes| {
                        InternalPageView::new(bytes).key_at(sib_size - 1).to_vec()
                    })?;
                    with_two_write_pages(&self.bpm, sibling_id, node_id, |sib_bytes, node_bytes| {
                        InternalPage::new(sib_bytes)
                            .move_last_to_front_of(&mut InternalPage::new(node_bytes), &separator_key);
                    })?;
                    with_write_page(&self.bpm, moved_child, |bytes| set_parent_page_id(bytes, node_id))?;
                    with_write_page(&self.bpm, parent_id, |bytes| {
                        InternalPage::new(bytes).set_key_at(node_index, &new_separator)
                    })?;
                }
            }
            PageKind::Invalid => unreachable!(),
        }
        Ok(())
    }

    /// Collapses a root that has underflowed: an internal root with a
    /// single child is replaced by that child; an empty leaf root empties
    /// the whole tree (`AdjustRoot`).
    fn adjust_root(&self, root_id: PageId) -> StorageResult<()> {
        let (kind, root_size) = with_read_page(&self.bpm, root_id, |bytes| (page_kind(bytes), size(bytes)))?;
        match kind {
            PageKind::Leaf => {
                if root_size == 0 {
                    self.bpm.delete_page(root_id)?;
                    self.update_root_page_id(INVALID_PAGE_ID)?;
                }
            }
            PageKind::Internal => {
                if root_size == 1 {
                    let only_child =
                        with_read_page(&self.bpm, root_id, |bytes| InternalPageView::new(bytes).value_at(0))?;
                    with_write_page(&self.bpm, only_child, |bytes| set_parent_page_id(bytes, INVALID_PAGE_ID))?;
                    self.bpm.delete_page(root_id)?;
                    self.update_root_page_id(only_child)?;
                }
            }
            PageKind::Invalid => unreachable!(),
        }
        Ok(())
    }

    /// Cursor at the first entry of the leftmost leaf (`Begin()`).
    pub fn begin(&self) -> StorageResult<IndexIterator<'_>> {
        if self.is_empty() {
            return Ok(IndexIterator::end(&self.bpm));
        }
        let leaf_id = self.find_leftmost_leaf()?;
        Ok(IndexIterator::new(&self.bpm, leaf_id, 0))
    }

    /// Cursor at the first entry `>= key` (`Begin(key)`).
    pub fn begin_at(&self, key: &[u8]) -> StorageResult<IndexIterator<'_>> {
        if self.is_empty() {
            return Ok(IndexIterator::end(&self.bpm));
        }
        let leaf_id = self.find_leaf_for_key(key)?;
        let (idx, leaf_size) = with_read_page(&self.bpm, leaf_id, |bytes| {
            let view = LeafPageView::new(bytes);
            (view.lower_bound(key, self.key_manager.as_ref()), view.size())
        })?;
        if idx < leaf_size {
            return Ok(IndexIterator::new(&self.bpm, leaf_id, idx));
        }
        let next = with_read_page(&self.bpm, leaf_id, |bytes| LeafPageView::new(bytes).next_page_id())?;
        if next == INVALID_PAGE_ID {
            Ok(IndexIterator::end(&self.bpm))
        } else {
            Ok(IndexIterator::new(&self.bpm, next, 0))
        }
    }

    /// The sentinel one-past-the-end cursor (`End()`; see the module
    /// doc comment for why no descent is needed to produce it).
    pub fn end(&self) -> IndexIterator<'_> {
        IndexIterator::end(&self.bpm)
    }

    /// Collects every `(key, RowId)` pair satisfying `key <op> value`
    /// (spec.md §4.5.5).
    pub fn scan_key(&self, value: &[u8], op: ScanOp) -> StorageResult<Vec<(Vec<u8>, RowId)>> {
        let mut out = Vec::new();
        match op {
            ScanOp::Eq => {
                if let Some(rid) = self.get_value(value)? {
                    out.push((value.to_vec(), rid));
                }
            }
            ScanOp::Ne => {
                let mut it = self.begin()?;
                while let Some((k, v)) = it.item()? {
                    if self.key_manager.compare(&k, value) != std::cmp::Ordering::Equal {
                        out.push((k, v));
                    }
                    it.advance()?;
                }
            }
            ScanOp::Ge | ScanOp::Gt => {
                let mut it = self.begin_at(value)?;
                while let Some((k, v)) = it.item()? {
                    let skip = op == ScanOp::Gt && self.key_manager.compare(&k, value) == std::cmp::Ordering::Equal;
                    if !skip {
                        out.push((k, v));
                    }
                    it.advance()?;
                }
            }
            ScanOp::Lt | ScanOp::Le => {
                let mut it = self.begin()?;
                while let Some((k, v)) = it.item()? {
                    let cmp = self.key_manager.compare(&k, value);
                    let include = match op {
                        ScanOp::Lt => cmp == std::cmp::Ordering::Less,
                        ScanOp::Le => cmp != std::cmp::Ordering::Greater,
                        _ => unreachable!(),
                    };
                    if !include {
                        break;
                    }
                    out.push((k, v));
                    it.advance()?;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use crate::index::key::{encode_int_key, IntKeyManager};
    use tempfile::NamedTempFile;

    fn fresh_tree(leaf_max: u32, internal_max: u32) -> (NamedTempFile, Arc<BufferPoolManager>, BPlusTree, PageId) {
        let file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::open(file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, dm));
        let roots = bpm.new_page().unwrap();
        let roots_id = roots.page_id;
        {
            let mut bytes = roots.data.write().unwrap();
            IndexRootsPage::new(&mut bytes).init();
        }
        bpm.unpin_page(roots_id, true).unwrap();
        let tree = BPlusTree::create(bpm.clone(), 0, roots_id, Box::new(IntKeyManager), leaf_max, internal_max)
            .unwrap();
        (file, bpm, tree, roots_id)
    }

    #[test]
    fn insert_1_to_20_then_scan_in_order() {
        let (_f, _bpm, tree, _roots) = fresh_tree(4, 4);
        for i in 1..=20 {
            let rid = RowId::new(i, 0);
            assert!(tree.insert(&encode_int_key(i), rid).unwrap());
        }
        for i in 1..=20 {
            assert_eq!(tree.get_value(&encode_int_key(i)).unwrap(), Some(RowId::new(i, 0)));
        }
        assert!(!tree.insert(&encode_int_key(5), RowId::new(999, 0)).unwrap());

        let scanned: Vec<i32> = tree
            .begin()
            .unwrap()
            .map(|(k, _)| i32::from_be_bytes(k.try_into().unwrap()))
            .collect();
        assert_eq!(scanned, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn insert_then_delete_1_to_15_shrinks_back_to_empty() {
        let (_f, _bpm, tree, _roots) = fresh_tree(4, 4);
        for i in 1..=15 {
            assert!(tree.insert(&encode_int_key(i), RowId::new(i, 0)).unwrap());
        }
        for i in 1..=15 {
            assert!(tree.remove(&encode_int_key(i)).unwrap());
        }
        assert!(tree.is_empty());
        assert_eq!(tree.get_value(&encode_int_key(1)).unwrap(), None);
    }

    #[test]
    fn delete_every_other_key_keeps_the_rest_reachable() {
        let (_f, _bpm, tree, _roots) = fresh_tree(4, 4);
        for i in 1..=15 {
            tree.insert(&encode_int_key(i), RowId::new(i, 0)).unwrap();
        }
        for i in (1..=15).step_by(2) {
            assert!(tree.remove(&encode_int_key(i)).unwrap());
        }
        for i in 1..=15 {
            let expected = if i % 2 == 0 { Some(RowId::new(i, 0)) } else { None };
            assert_eq!(tree.get_value(&encode_int_key(i)).unwrap(), expected);
        }
        let remaining: Vec<i32> = tree
            .begin()
            .unwrap()
            .map(|(k, _)| i32::from_be_bytes(k.try_into().unwrap()))
            .collect();
        let expected: Vec<i32> = (1..=15).filter(|i| i % 2 == 0).collect();
        assert_eq!(remaining, expected);
    }

    #[test]
    fn scan_key_operators() {
        let (_f, _bpm, tree, _roots) = fresh_tree(4, 4);
        for i in 1..=10 {
            tree.insert(&encode_int_key(i), RowId::new(i, 0)).unwrap();
        }
        let decode = |pairs: Vec<(Vec<u8>, RowId)>| -> Vec<i32> {
            pairs
                .into_iter()
                .map(|(k, _)| i32::from_be_bytes(k.try_into().unwrap()))
                .collect()
        };
        assert_eq!(decode(tree.scan_key(&encode_int_key(5), ScanOp::Eq).unwrap()), vec![5]);
        assert_eq!(decode(tree.scan_key(&encode_int_key(8), ScanOp::Lt).unwrap()), (1..8).collect::<Vec<_>>());
        assert_eq!(decode(tree.scan_key(&encode_int_key(8), ScanOp::Le).unwrap()), (1..=8).collect::<Vec<_>>());
        assert_eq!(decode(tree.scan_key(&encode_int_key(8), ScanOp::Gt).unwrap()), (9..=10).collect::<Vec<_>>());
        assert_eq!(decode(tree.scan_key(&encode_int_key(8), ScanOp::Ge).unwrap()), (8..=10).collect::<Vec<_>>());
        assert_eq!(decode(tree.scan_key(&encode_int_key(8), ScanOp::Ne).unwrap()).len(), 9);
    }
}
