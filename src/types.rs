//! Identifiers and small shared-state helpers used across every layer.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::io::{Decodeable, Encodeable};

pub use crate::config::INVALID_PAGE_ID;

/// A logical page number. Non-negative when valid; [`INVALID_PAGE_ID`]
/// (`-1`) is the sentinel for "no page".
pub type PageId = i32;

/// An index into the buffer pool's in-memory frame array.
pub type FrameId = usize;

/// Identifies one tuple within a table heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl RowId {
    pub const INVALID: RowId = RowId {
        page_id: INVALID_PAGE_ID,
        slot_num: u32::MAX,
    };

    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != INVALID_PAGE_ID
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Encodeable for RowId {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.page_id.encode();
        buf.extend(self.slot_num.encode());
        buf
    }
}

impl Decodeable for RowId {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let page_id = PageId::decode_from(reader);
        let slot_num = u32::decode_from(reader);
        Self { page_id, slot_num }
    }
}

/// Shorthand for the `Arc<RwLock<T>>` handles passed between the buffer
/// pool and its callers, named the way `small-db::types::Pod` is.
pub type Pod<T> = Arc<RwLock<T>>;

/// A handy shortcut to replace the `RwLock` write/read().unwrap() pattern,
/// carried over from `small-db::utils::HandyRwLock`.
pub trait HandyRwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}
