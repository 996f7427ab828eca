//! A single buffer pool frame: a fixed-size byte buffer plus the metadata
//! the pool manager needs to decide when it can be reused (spec.md §3,
//! "Page frame").

use std::sync::{Arc, RwLock};

use crate::config::PAGE_SIZE;
use crate::types::{PageId, INVALID_PAGE_ID};

/// One in-memory slot of the buffer pool. The byte buffer lives behind its
/// own `Arc<RwLock<Vec<u8>>>`, separate from the frame's bookkeeping
/// fields, so a caller can hold a read or write latch on the contents of
/// two different frames at once (needed for B+ tree parent-before-child
/// splits, spec.md §5) without holding the pool's bookkeeping lock.
pub struct Frame {
    pub page_id: PageId,
    pub pin_count: u32,
    pub is_dirty: bool,
    pub data: Arc<RwLock<Vec<u8>>>,
}

impl Frame {
    pub fn empty() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            data: Arc::new(RwLock::new(vec![0u8; PAGE_SIZE])),
        }
    }

    pub fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
        self.data.write().unwrap().iter_mut().for_each(|b| *b = 0);
    }
}
