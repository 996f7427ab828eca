//! B+ tree page layouts (spec.md §3 "B+ tree node", §4.5). The packed
//! key/value-pair idiom (a small fixed header followed by an array of
//! fixed-size pairs) is grounded on
//! `original_source/src/page/b_plus_tree_leaf_page.cpp`'s `pairs_off`/
//! `pair_size`/`CopyNFrom`/`PairPtrAt` accessors, translated from pointer
//! arithmetic over a `char*` array into byte-offset accessors over a
//! `&mut [u8]`, the same translation `src/table/table_page.rs` applies to
//! the table heap's slotted page.
//!
//! No internal-node page source survived retrieval filtering (only the
//! leaf page did); the internal page layout below is this crate's own
//! design, built by analogy to the leaf page's packed-pair idiom with
//! `(key, child PageId)` entries instead of `(key, RowId)` ones, and with
//! entry 0's key never read (spec.md §3: "entry 0's key is ignored").

use std::convert::TryInto;

use crate::types::{PageId, RowId, INVALID_PAGE_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Invalid,
    Leaf,
    Internal,
}

impl PageKind {
    fn from_byte(b: u8) -> Self {
        match b {
            1 => PageKind::Leaf,
            2 => PageKind::Internal,
            _ => PageKind::Invalid,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            PageKind::Invalid => 0,
            PageKind::Leaf => 1,
            PageKind::Internal => 2,
        }
    }
}

/// Common header every B+ tree page starts with: `[page_kind:
/// u8][key_size: u32][size: u32][max_size: u32][parent_page_id: i32]`.
const COMMON_HEADER_SIZE: usize = 1 + 4 + 4 + 4 + 4;
/// Leaf pages append `[next_page_id: i32]` after the common header.
const LEAF_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 4;
const INTERNAL_HEADER_SIZE: usize = COMMON_HEADER_SIZE;

pub fn page_kind(bytes: &[u8]) -> PageKind {
    PageKind::from_byte(bytes[0])
}

fn set_page_kind(bytes: &mut [u8], kind: PageKind) {
    bytes[0] = kind.to_byte();
}

fn key_size(bytes: &[u8]) -> usize {
    u32::from_le_bytes(bytes[1..5].try_into().unwrap()) as usize
}

fn set_key_size(bytes: &mut [u8], key_size: usize) {
    bytes[1..5].copy_from_slice(&(key_size as u32).to_le_bytes());
}

pub fn size(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[5..9].try_into().unwrap())
}

fn set_size(bytes: &mut [u8], size: u32) {
    bytes[5..9].copy_from_slice(&size.to_le_bytes());
}

pub fn max_size(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[9..13].try_into().unwrap())
}

fn set_max_size(bytes: &mut [u8], max_size: u32) {
    bytes[9..13].copy_from_slice(&max_size.to_le_bytes());
}

pub fn parent_page_id(bytes: &[u8]) -> PageId {
    i32::from_le_bytes(bytes[13..17].try_into().unwrap())
}

pub fn set_parent_page_id(bytes: &mut [u8], page_id: PageId) {
    bytes[13..17].copy_from_slice(&page_id.to_le_bytes());
}

/// A page is the tree's root iff it has no parent.
pub fn is_root(bytes: &[u8]) -> bool {
    parent_page_id(bytes) == INVALID_PAGE_ID
}

fn key_at<'a>(bytes: &'a [u8], header: usize, pair_size: usize, index: u32) -> &'a [u8] {
    let off = header + index as usize * pair_size;
    &bytes[off..off + key_size(bytes)]
}

fn set_key_at(bytes: &mut [u8], header: usize, pair_size: usize, index: u32, key: &[u8]) {
    let ks = key_size(bytes);
    let off = header + index as usize * pair_size;
    bytes[off..off + ks].copy_from_slice(key);
}

// ---------------------------------------------------------------------
// Leaf page: packed `(key, RowId)` pairs, plus a `next_page_id` link.
// ---------------------------------------------------------------------

fn leaf_pair_size(bytes: &[u8]) -> usize {
    key_size(bytes) + 8 // RowId encodes as page_id:i32 + slot_num:u32
}

pub struct LeafPage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> LeafPage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn init(&mut self, key_size: usize, max_size: u32, parent_page_id: PageId) {
        set_page_kind(self.bytes, PageKind::Leaf);
        set_key_size(self.bytes, key_size);
        set_size(self.bytes, 0);
        set_max_size(self.bytes, max_size);
        set_parent_page_id(self.bytes, parent_page_id);
        self.set_next_page_id(INVALID_PAGE_ID);
    }

    pub fn size(&self) -> u32 {
        size(self.bytes)
    }

    fn set_size(&mut self, size: u32) {
        set_size(self.bytes, size)
    }

    pub fn max_size(&self) -> u32 {
        max_size(self.bytes)
    }

    pub fn parent_page_id(&self) -> PageId {
        parent_page_id(self.bytes)
    }

    pub fn set_parent_page_id(&mut self, page_id: PageId) {
        set_parent_page_id(self.bytes, page_id)
    }

    pub fn is_root(&self) -> bool {
        is_root(self.bytes)
    }

    pub fn next_page_id(&self) -> PageId {
        i32::from_le_bytes(
            self.bytes[COMMON_HEADER_SIZE..COMMON_HEADER_SIZE + 4]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        self.bytes[COMMON_HEADER_SIZE..COMMON_HEADER_SIZE + 4]
            .copy_from_slice(&page_id.to_le_bytes());
    }

    fn pair_size(&self) -> usize {
        leaf_pair_size(self.bytes)
    }

    pub fn key_at(&self, index: u32) -> &[u8] {
        key_at(self.bytes, LEAF_HEADER_SIZE, self.pair_size(), index)
    }

    pub fn value_at(&self, index: u32) -> RowId {
        let ks = key_size(self.bytes);
        let off = LEAF_HEADER_SIZE + index as usize * self.pair_size() + ks;
        let mut cursor = std::io::Cursor::new(&self.bytes[off..off + 8]);
        <RowId as crate::io::Decodeable>::decode_from(&mut cursor)
    }

    fn set_pair_at(&mut self, index: u32, key: &[u8], value: RowId) {
        let pair_size = self.pair_size();
        let ks = key_size(self.bytes);
        set_key_at(self.bytes, LEAF_HEADER_SIZE, pair_size, index, key);
        let off = LEAF_HEADER_SIZE + index as usize * pair_size + ks;
        let encoded = <RowId as crate::io::Encodeable>::encode(&value);
        self.bytes[off..off + 8].copy_from_slice(&encoded);
    }

    /// Lowest index whose key is `>=` the given key (`std::lower_bound`
    /// over `KeyAt`, grounded on `b_plus_tree_leaf_page.cpp`'s `KeyIndex`).
    pub fn lower_bound(&self, key: &[u8], km: &dyn super::key::KeyManager) -> u32 {
        let mut lo = 0u32;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if km.compare(self.key_at(mid), key) == std::cmp::Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// `Some(value)` iff `key` is present (`Lookup`).
    pub fn lookup(&self, key: &[u8], km: &dyn super::key::KeyManager) -> Option<RowId> {
        let idx = self.lower_bound(key, km);
        if idx < self.size() && km.compare(self.key_at(idx), key) == std::cmp::Ordering::Equal {
            Some(self.value_at(idx))
        } else {
            None
        }
    }

    /// Inserts `(key, value)` keeping entries sorted. Returns the new
    /// size, or `None` if `key` is already present (grounded on `Insert`).
    pub fn insert(&mut self, key: &[u8], value: RowId, km: &dyn super::key::KeyManager) -> Option<u32> {
        let idx = self.lower_bound(key, km);
        if idx < self.size() && km.compare(self.key_at(idx), key) == std::cmp::Ordering::Equal {
            return None;
        }
        let size = self.size();
        for i in (idx..size).rev() {
            let k = self.key_at(i).to_vec();
            let v = self.value_at(i);
            self.set_pair_at(i + 1, &k, v);
        }
        self.set_pair_at(idx, key, value);
        self.set_size(size + 1);
        Some(size + 1)
    }

    /// `true` if `key` was present and removed (`RemoveAndDeleteRecord`).
    pub fn remove(&mut self, key: &[u8], km: &dyn super::key::KeyManager) -> bool {
        let idx = self.lower_bound(key, km);
        if idx >= self.size() || km.compare(self.key_at(idx), key) != std::cmp::Ordering::Equal {
            return false;
        }
        let size = self.size();
        for i in idx..size - 1 {
            let k = self.key_at(i + 1).to_vec();
            let v = self.value_at(i + 1);
            self.set_pair_at(i, &k, v);
        }
        self.set_size(size - 1);
        true
    }

    /// Moves the upper half of `self`'s entries onto the front of
    /// `recipient`, which must already be empty (`MoveHalfTo` / split).
    pub fn move_half_to(&mut self, recipient: &mut LeafPage) {
        let size = self.size();
        let split = size / 2;
        for i in split..size {
            recipient.append(self.key_at(i), self.value_at(i));
        }
        self.set_size(split);
    }

    /// Moves every entry of `self` onto the end of `recipient`, then
    /// links `recipient`'s `next_page_id` past `self` (`MoveAllTo` /
    /// coalesce into a left sibling).
    pub fn move_all_to(&mut self, recipient: &mut LeafPage) {
        for i in 0..self.size() {
            recipient.append(self.key_at(i), self.value_at(i));
        }
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Appends one entry, assuming the caller has already verified
    /// capacity and ordering (used by split/merge/redistribute).
    fn append(&mut self, key: &[u8], value: RowId) {
        let size = self.size();
        self.set_pair_at(size, key, value);
        self.set_size(size + 1);
    }

    fn prepend(&mut self, key: &[u8], value: RowId) {
        let size = self.size();
        for i in (0..size).rev() {
            let k = self.key_at(i).to_vec();
            let v = self.value_at(i);
            self.set_pair_at(i + 1, &k, v);
        }
        self.set_pair_at(0, key, value);
        self.set_size(size + 1);
    }

    /// Moves `self`'s first entry onto the end of `recipient`
    /// (`MoveFirstToEndOf`, redistribute from right sibling).
    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafPage) {
        let key = self.key_at(0).to_vec();
        let value = self.value_at(0);
        recipient.append(&key, value);
        for i in 1..self.size() {
            let k = self.key_at(i).to_vec();
            let v = self.value_at(i);
            self.set_pair_at(i - 1, &k, v);
        }
        self.set_size(self.size() - 1);
    }

    /// Moves `self`'s last entry onto the front of `recipient`
    /// (`MoveLastToFrontOf`, redistribute from left sibling).
    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafPage) {
        let last = self.size() - 1;
        let key = self.key_at(last).to_vec();
        let value = self.value_at(last);
        self.set_size(last);
        recipient.prepend(&key, value);
    }

    pub fn entries(&self) -> Vec<(Vec<u8>, RowId)> {
        (0..self.size())
            .map(|i| (self.key_at(i).to_vec(), self.value_at(i)))
            .collect()
    }
}

pub fn leaf_capacity(key_size: usize) -> u32 {
    ((crate::config::PAGE_SIZE - LEAF_HEADER_SIZE) / (key_size + 8)) as u32
}

// ---------------------------------------------------------------------
// Internal page: packed `(key, child PageId)` pairs; entry 0's key is
// never read (the first child covers everything less than entry 1's key).
// ---------------------------------------------------------------------

fn internal_pair_size(bytes: &[u8]) -> usize {
    key_size(bytes) + 4
}

pub struct InternalPage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> InternalPage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn init(&mut self, key_size: usize, max_size: u32, parent_page_id: PageId) {
        set_page_kind(self.bytes, PageKind::Internal);
        set_key_size(self.bytes, key_size);
        set_size(self.bytes, 0);
        set_max_size(self.bytes, max_size);
        set_parent_page_id(self.bytes, parent_page_id);
    }

    pub fn size(&self) -> u32 {
        size(self.bytes)
    }

    fn set_size(&mut self, size: u32) {
        set_size(self.bytes, size)
    }

    pub fn max_size(&self) -> u32 {
        max_size(self.bytes)
    }

    pub fn parent_page_id(&self) -> PageId {
        parent_page_id(self.bytes)
    }

    pub fn set_parent_page_id(&mut self, page_id: PageId) {
        set_parent_page_id(self.bytes, page_id)
    }

    pub fn is_root(&self) -> bool {
        is_root(self.bytes)
    }

    fn pair_size(&self) -> usize {
        internal_pair_size(self.bytes)
    }

    pub fn key_at(&self, index: u32) -> &[u8] {
        key_at(self.bytes, INTERNAL_HEADER_SIZE, self.pair_size(), index)
    }

    pub fn value_at(&self, index: u32) -> PageId {
        let ks = key_size(self.bytes);
        let off = INTERNAL_HEADER_SIZE + index as usize * self.pair_size() + ks;
        i32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap())
    }

    fn set_pair_at(&mut self, index: u32, key: &[u8], value: PageId) {
        let pair_size = self.pair_size();
        let ks = key_size(self.bytes);
        set_key_at(self.bytes, INTERNAL_HEADER_SIZE, pair_size, index, key);
        let off = INTERNAL_HEADER_SIZE + index as usize * pair_size + ks;
        self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Sets up a brand-new root with exactly two children (`PopulateNewRoot`).
    pub fn populate_new_root(&mut self, left: PageId, key: &[u8], right: PageId) {
        let zero_key = vec![0u8; key_size(self.bytes)];
        self.set_pair_at(0, &zero_key, left);
        self.set_pair_at(1, key, right);
        self.set_size(2);
    }

    /// Index of `child`'s entry, or the page's size if not found
    /// (`ValueIndex`).
    pub fn value_index(&self, child: PageId) -> u32 {
        (0..self.size())
            .find(|&i| self.value_at(i) == child)
            .unwrap_or(self.size())
    }

    /// Overwrites the separator key at `index` in place, used when a
    /// redistribute pulls a new separator key up from a sibling.
    pub fn set_key_at(&mut self, index: u32, key: &[u8]) {
        let pair_size = self.pair_size();
        set_key_at(self.bytes, INTERNAL_HEADER_SIZE, pair_size, index, key);
    }

    /// Child page id to descend into for `key` (`Lookup`): the entry
    /// whose key is the greatest one `<= key`, i.e. `upper_bound - 1`.
    pub fn lookup(&self, key: &[u8], km: &dyn super::key::KeyManager) -> PageId {
        let mut lo = 1u32;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if km.compare(self.key_at(mid), key) != std::cmp::Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.value_at(lo - 1)
    }

    /// Inserts `(key, value)` directly after `old_child`'s entry
    /// (`InsertNodeAfter`). Returns the new size.
    pub fn insert_node_after(&mut self, old_child: PageId, key: &[u8], value: PageId) -> u32 {
        let idx = self.value_index(old_child) + 1;
        let size = self.size();
        for i in (idx..size).rev() {
            let k = self.key_at(i).to_vec();
            let v = self.value_at(i);
            self.set_pair_at(i + 1, &k, v);
        }
        self.set_pair_at(idx, key, value);
        self.set_size(size + 1);
        size + 1
    }

    /// Removes the entry at `index` (`Remove`).
    pub fn remove(&mut self, index: u32) {
        let size = self.size();
        for i in index..size - 1 {
            let k = self.key_at(i + 1).to_vec();
            let v = self.value_at(i + 1);
            self.set_pair_at(i, &k, v);
        }
        self.set_size(size - 1);
    }

    /// Splits off the upper half of `self`'s entries onto `recipient`
    /// (`MoveHalfTo`).
    pub fn move_half_to(&mut self, recipient: &mut InternalPage) {
        let size = self.size();
        let split = size / 2;
        for i in split..size {
            recipient.append(self.key_at(i).to_vec().as_slice(), self.value_at(i));
        }
        self.set_size(split);
    }

    fn append(&mut self, key: &[u8], value: PageId) {
        let size = self.size();
        self.set_pair_at(size, key, value);
        self.set_size(size + 1);
    }

    /// Moves every entry of `self` onto the end of `recipient`, using
    /// `middle_key` (pulled down from the parent separating the two
    /// siblings) as the key of the first moved entry (`MoveAllTo`).
    pub fn move_all_to(&mut self, recipient: &mut InternalPage, middle_key: &[u8]) {
        recipient.append(middle_key, self.value_at(0));
        for i in 1..self.size() {
            recipient.append(self.key_at(i), self.value_at(i));
        }
        self.set_size(0);
    }

    /// Moves `self`'s first entry onto the end of `recipient`, re-keying
    /// it with `middle_key` from the parent (`MoveFirstToEndOf`).
    pub fn move_first_to_end_of(&mut self, recipient: &mut InternalPage, middle_key: &[u8]) {
        let value = self.value_at(0);
        recipient.append(middle_key, value);
        for i in 1..self.size() {
            let k = self.key_at(i).to_vec();
            let v = self.value_at(i);
            self.set_pair_at(i - 1, &k, v);
        }
        self.set_size(self.size() - 1);
    }

    /// Moves `self`'s last entry onto the front of `recipient`, re-keying
    /// the recipient's former first entry with `middle_key` from the
    /// parent (`MoveLastToFrontOf`).
    pub fn move_last_to_front_of(&mut self, recipient: &mut InternalPage, middle_key: &[u8]) {
        let last = self.size() - 1;
        let moved_value = self.value_at(last);
        self.set_size(last);

        let old_first_value = recipient.value_at(0);
        let rsize = recipient.size();
        for i in (0..rsize).rev() {
            let k = recipient.key_at(i).to_vec();
            let v = recipient.value_at(i);
            recipient.set_pair_at(i + 1, &k, v);
        }
        recipient.set_pair_at(1, middle_key, old_first_value);
        let zero_key = vec![0u8; key_size(recipient.bytes)];
        recipient.set_pair_at(0, &zero_key, moved_value);
        recipient.set_size(rsize + 1);
    }

    pub fn children(&self) -> Vec<PageId> {
        (0..self.size()).map(|i| self.value_at(i)).collect()
    }
}

pub fn internal_capacity(key_size: usize) -> u32 {
    ((crate::config::PAGE_SIZE - INTERNAL_HEADER_SIZE) / (key_size + 4)) as u32
}

// ---------------------------------------------------------------------
// Read-only views, for callers holding only a read latch (point lookups,
// the index iterator). Thin wrappers around the same free functions the
// mutable types use.
// ---------------------------------------------------------------------

pub struct LeafPageView<'a> {
    bytes: &'a [u8],
}

impl<'a> LeafPageView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn size(&self) -> u32 {
        size(self.bytes)
    }

    pub fn next_page_id(&self) -> PageId {
        i32::from_le_bytes(
            self.bytes[COMMON_HEADER_SIZE..COMMON_HEADER_SIZE + 4]
                .try_into()
                .unwrap(),
        )
    }

    fn pair_size(&self) -> usize {
        leaf_pair_size(self.bytes)
    }

    pub fn key_at(&self, index: u32) -> &[u8] {
        key_at(self.bytes, LEAF_HEADER_SIZE, self.pair_size(), index)
    }

    pub fn value_at(&self, index: u32) -> RowId {
        let ks = key_size(self.bytes);
        let off = LEAF_HEADER_SIZE + index as usize * self.pair_size() + ks;
        let mut cursor = std::io::Cursor::new(&self.bytes[off..off + 8]);
        <RowId as crate::io::Decodeable>::decode_from(&mut cursor)
    }

    pub fn lower_bound(&self, key: &[u8], km: &dyn super::key::KeyManager) -> u32 {
        let mut lo = 0u32;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if km.compare(self.key_at(mid), key) == std::cmp::Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn lookup(&self, key: &[u8], km: &dyn super::key::KeyManager) -> Option<RowId> {
        let idx = self.lower_bound(key, km);
        if idx < self.size() && km.compare(self.key_at(idx), key) == std::cmp::Ordering::Equal {
            Some(self.value_at(idx))
        } else {
            None
        }
    }
}

pub struct InternalPageView<'a> {
    bytes: &'a [u8],
}

impl<'a> InternalPageView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn size(&self) -> u32 {
        size(self.bytes)
    }

    fn pair_size(&self) -> usize {
        internal_pair_size(self.bytes)
    }

    pub fn key_at(&self, index: u32) -> &[u8] {
        key_at(self.bytes, INTERNAL_HEADER_SIZE, self.pair_size(), index)
    }

    pub fn value_at(&self, index: u32) -> PageId {
        let ks = key_size(self.bytes);
        let off = INTERNAL_HEADER_SIZE + index as usize * self.pair_size() + ks;
        i32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap())
    }

    pub fn lookup(&self, key: &[u8], km: &dyn super::key::KeyManager) -> PageId {
        let mut lo = 1u32;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if km.compare(self.key_at(mid), key) != std::cmp::Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.value_at(lo - 1)
    }

    pub fn value_index(&self, child: PageId) -> u32 {
        (0..self.size())
            .find(|&i| self.value_at(i) == child)
            .unwrap_or(self.size())
    }

    pub fn children(&self) -> Vec<PageId> {
        (0..self.size()).map(|i| self.value_at(i)).collect()
    }
}
