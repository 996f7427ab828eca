//! Buffer Pool Manager (C2): a bounded in-memory cache of pages with LRU
//! eviction, pin counts, and write-back of dirty pages (spec.md §4.3).
//!
//! Grounded on `wangwhh/minisql`'s `BufferPoolManager` for the exact
//! fetch/new/delete/unpin/flush algorithms, and on `small-db`'s
//! `Pod<T> = Arc<RwLock<T>>` convention for how page bytes are handed to
//! callers: each frame's bytes live behind their own `Arc<RwLock<Vec<u8>>>`
//! so a caller can hold latches on two frames at once (needed for B+ tree
//! parent-before-child splits, spec.md §5), while the page table, free
//! list, and replacer stay behind one short-lived bookkeeping mutex
//! (spec.md §4.3, "each operation is a single critical section").

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, warn};

use crate::disk::DiskManager;
use crate::error::{StorageError, StorageResult};
use crate::types::{FrameId, PageId, INVALID_PAGE_ID};

use super::page::Frame;
use super::replacer::LruReplacer;

struct PoolState {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruReplacer,
}

/// A page's bytes, pinned in the pool. Read/write latches on the contents
/// are acquired independently of pool bookkeeping via [`PinnedPage::data`].
/// Callers must call [`BufferPoolManager::unpin_page`] exactly once per
/// pin, with the correct dirty flag.
#[derive(Clone)]
pub struct PinnedPage {
    pub page_id: PageId,
    pub data: Arc<RwLock<Vec<u8>>>,
}

pub struct BufferPoolManager {
    disk_manager: Arc<DiskManager>,
    state: Mutex<PoolState>,
    pool_size: usize,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(Frame::empty());
            free_list.push_back(i);
        }
        Self {
            disk_manager,
            state: Mutex::new(PoolState {
                frames,
                page_table: HashMap::new(),
                free_list,
                replacer: LruReplacer::new(pool_size),
            }),
            pool_size,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Picks a victim frame id, preferring the free list (FIFO), else the
    /// replacer. Returns `None` if the pool has no evictable frame (every
    /// frame pinned).
    fn pick_victim(state: &mut PoolState) -> Option<FrameId> {
        if let Some(f) = state.free_list.pop_front() {
            return Some(f);
        }
        state.replacer.victim()
    }

    /// Undoes `pick_victim`'s removal of `frame_id` from the free list or
    /// replacer, for when an operation fails before the frame is actually
    /// reused and its old page-table entry (if any) is still intact.
    fn restore_victim(state: &mut PoolState, frame_id: FrameId) {
        if state.frames[frame_id].page_id == INVALID_PAGE_ID {
            state.free_list.push_back(frame_id);
        } else {
            state.replacer.unpin(frame_id);
        }
    }

    /// Writes back the victim frame if dirty, then removes its old
    /// page-table entry (if any).
    fn evict(&self, state: &mut PoolState, frame_id: FrameId) -> StorageResult<()> {
        let (old_page_id, is_dirty, data) = {
            let f = &state.frames[frame_id];
            (f.page_id, f.is_dirty, f.data.clone())
        };
        if old_page_id != INVALID_PAGE_ID {
            if is_dirty {
                let bytes = data.read().unwrap();
                self.disk_manager.write_page(old_page_id, &bytes)?;
            }
            state.page_table.remove(&old_page_id);
        }
        Ok(())
    }

    pub fn fetch_page(&self, page_id: PageId) -> StorageResult<PinnedPage> {
        let mut state = self.state.lock().unwrap();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].pin_count += 1;
            state.replacer.pin(frame_id);
            let data = state.frames[frame_id].data.clone();
            return Ok(PinnedPage { page_id, data });
        }

        let frame_id = match Self::pick_victim(&mut state) {
            Some(f) => f,
            None => {
                warn!("buffer pool exhausted: fetch_page({})", page_id);
                return Err(StorageError::PoolExhausted);
            }
        };
        self.evict(&mut state, frame_id)?;

        let data = state.frames[frame_id].data.clone();
        {
            let mut bytes = data.write().unwrap();
            self.disk_manager.read_page(page_id, &mut bytes)?;
        }
        state.page_table.insert(page_id, frame_id);
        let f = &mut state.frames[frame_id];
        f.page_id = page_id;
        f.pin_count = 1;
        f.is_dirty = false;
        state.replacer.pin(frame_id);

        debug!("fetched page {} into frame {}", page_id, frame_id);
        Ok(PinnedPage { page_id, data })
    }

    pub fn new_page(&self) -> StorageResult<PinnedPage> {
        let mut state = self.state.lock().unwrap();

        let frame_id = match Self::pick_victim(&mut state) {
            Some(f) => f,
            None => {
                warn!("buffer pool exhausted: new_page()");
                return Err(StorageError::PoolExhausted);
            }
        };

        let page_id = match self.disk_manager.allocate_page() {
            Ok(id) => id,
            Err(e) => {
                Self::restore_victim(&mut state, frame_id);
                return Err(e);
            }
        };
        self.evict(&mut state, frame_id)?;

        let data = state.frames[frame_id].data.clone();
        data.write().unwrap().iter_mut().for_each(|b| *b = 0);

        state.page_table.insert(page_id, frame_id);
        let f = &mut state.frames[frame_id];
        f.page_id = page_id;
        f.pin_count = 1;
        f.is_dirty = false;

        debug!("new page {} in frame {}", page_id, frame_id);
        Ok(PinnedPage { page_id, data })
    }

    /// Refuses to delete a page that is still pinned in memory, returning
    /// `false` without touching the on-disk bitmap. The original this is
    /// grounded on deallocates unconditionally even if pinned; spec.md §9
    /// calls that out as a bug this design does not repeat.
    pub fn delete_page(&self, page_id: PageId) -> StorageResult<bool> {
        let mut state = self.state.lock().unwrap();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            if state.frames[frame_id].pin_count > 0 {
                return Ok(false);
            }
            self.disk_manager.deallocate_page(page_id)?;
            state.page_table.remove(&page_id);
            let f = &mut state.frames[frame_id];
            f.page_id = INVALID_PAGE_ID;
            f.pin_count = 0;
            f.is_dirty = false;
            f.data.write().unwrap().iter_mut().for_each(|b| *b = 0);
            state.replacer.pin(frame_id);
            state.free_list.push_back(frame_id);
            Ok(true)
        } else {
            self.disk_manager.deallocate_page(page_id)?;
            Ok(true)
        }
    }

    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> StorageResult<bool> {
        let mut state = self.state.lock().unwrap();
        let frame_id = match state.page_table.get(&page_id).copied() {
            Some(f) => f,
            None => return Ok(true),
        };
        let f = &mut state.frames[frame_id];
        f.is_dirty |= is_dirty;
        if f.pin_count == 0 {
            warn!("over-unpin of page {}", page_id);
            return Ok(false);
        }
        f.pin_count -= 1;
        if f.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        Ok(true)
    }

    /// Writes the page to disk if cached, regardless of the dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<bool> {
        let state = self.state.lock().unwrap();
        let frame_id = match state.page_table.get(&page_id).copied() {
            Some(f) => f,
            None => return Ok(false),
        };
        let data = state.frames[frame_id].data.clone();
        drop(state);
        {
            let bytes = data.read().unwrap();
            self.disk_manager.write_page(page_id, &bytes)?;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].is_dirty = false;
        }
        Ok(true)
    }

    /// Flushes every cached page, used on shutdown.
    pub fn flush_all(&self) -> StorageResult<()> {
        let page_ids: Vec<PageId> = {
            let state = self.state.lock().unwrap();
            state.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn debug_counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().unwrap();
        let pinned = state
            .frames
            .iter()
            .filter(|f| f.page_id != INVALID_PAGE_ID && f.pin_count > 0)
            .count();
        (state.page_table.len(), state.free_list.len(), pinned)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh(pool_size: usize) -> (NamedTempFile, BufferPoolManager) {
        let file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::open(file.path()).unwrap());
        (file, BufferPoolManager::new(pool_size, dm))
    }

    #[test]
    fn eviction_writes_back_dirty_page_and_refetch_sees_it() {
        let (_f, bpm) = fresh(3);

        let p0 = bpm.new_page().unwrap();
        let p1 = bpm.new_page().unwrap();
        let p2 = bpm.new_page().unwrap();
        for p in [&p0, &p1, &p2] {
            p.data.write().unwrap()[0] = (p.page_id % 251) as u8;
        }
        bpm.unpin_page(p0.page_id, true).unwrap();
        bpm.unpin_page(p1.page_id, true).unwrap();
        bpm.unpin_page(p2.page_id, true).unwrap();

        let p3 = bpm.new_page().unwrap();
        assert_ne!(p3.page_id, p0.page_id);
        assert_ne!(p3.page_id, p1.page_id);
        assert_ne!(p3.page_id, p2.page_id);
        bpm.unpin_page(p3.page_id, false).unwrap();

        // p0 was the least-recently-unpinned, so it should have been
        // evicted and written back; fetching it again must see the byte.
        let refetched = bpm.fetch_page(p0.page_id).unwrap();
        assert_eq!(refetched.data.read().unwrap()[0], (p0.page_id % 251) as u8);
        bpm.unpin_page(p0.page_id, false).unwrap();
    }

    #[test]
    fn pin_exhaustion_does_not_corrupt_state() {
        let (_f, bpm) = fresh(2);
        let p0 = bpm.new_page().unwrap();
        let _p1 = bpm.new_page().unwrap();

        assert!(matches!(
            bpm.new_page(),
            Err(StorageError::PoolExhausted)
        ));

        bpm.unpin_page(p0.page_id, false).unwrap();
        let p2 = bpm.new_page().unwrap();
        assert_ne!(p2.page_id, p0.page_id);
    }

    #[test]
    fn delete_page_requires_unpinned_frame() {
        let (_f, bpm) = fresh(2);
        let p0 = bpm.new_page().unwrap();
        assert_eq!(bpm.delete_page(p0.page_id).unwrap(), false);
        bpm.unpin_page(p0.page_id, false).unwrap();
        assert_eq!(bpm.delete_page(p0.page_id).unwrap(), true);
        assert!(bpm.disk_manager.is_page_free(p0.page_id).unwrap());
    }

    #[test]
    fn over_unpin_is_reported() {
        let (_f, bpm) = fresh(2);
        let p0 = bpm.new_page().unwrap();
        bpm.unpin_page(p0.page_id, false).unwrap();
        assert_eq!(bpm.unpin_page(p0.page_id, false).unwrap(), false);
    }

    #[test]
    fn invariant_frames_partition_pool_size() {
        let (_f, bpm) = fresh(4);
        let p0 = bpm.new_page().unwrap();
        let _p1 = bpm.new_page().unwrap();
        bpm.unpin_page(p0.page_id, false).unwrap();

        let (cached, free, pinned) = bpm.debug_counts();
        assert_eq!(cached, 2);
        assert_eq!(free, 2);
        assert_eq!(pinned, 1);
    }
}
