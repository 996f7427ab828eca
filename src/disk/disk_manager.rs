//! Disk Manager (C1): maps a contiguous logical page space onto a physical
//! file with bitmap-based free-page tracking (spec.md §4.1).
//!
//! Grounded on `wangwhh/minisql`'s `DiskManager` (the original this spec
//! was distilled from) for the exact allocation algorithm and file layout;
//! grounded on `small-db::io::SmallFile` for the Rust-side file-handle
//! idiom (owned `File`, serialized access through a mutex).

use std::convert::TryInto;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use log::{debug, warn};

use crate::config::{BITMAP_SIZE, META_PAGE_MAX_EXTENTS, PAGE_SIZE};
use crate::disk::bitmap_page::BitmapPage;
use crate::error::{StorageError, StorageResult};
use crate::types::{PageId, INVALID_PAGE_ID};

/// In-memory mirror of physical page 0, kept resident for the lifetime of
/// the disk manager and written back on every allocate/deallocate.
struct MetaPage {
    num_allocated_pages: u32,
    num_extents: u32,
    extent_used_page: Vec<u32>,
}

impl MetaPage {
    fn empty() -> Self {
        Self {
            num_allocated_pages: 0,
            num_extents: 0,
            extent_used_page: vec![0; META_PAGE_MAX_EXTENTS],
        }
    }

    fn decode(bytes: &[u8]) -> Self {
        let num_allocated_pages = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let num_extents = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let mut extent_used_page = vec![0u32; META_PAGE_MAX_EXTENTS];
        for (i, slot) in extent_used_page.iter_mut().enumerate() {
            let offset = 8 + i * 4;
            *slot = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        }
        Self {
            num_allocated_pages,
            num_extents,
            extent_used_page,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[0..4].copy_from_slice(&self.num_allocated_pages.to_le_bytes());
        buf[4..8].copy_from_slice(&self.num_extents.to_le_bytes());
        for (i, used) in self.extent_used_page.iter().enumerate() {
            let offset = 8 + i * 4;
            buf[offset..offset + 4].copy_from_slice(&used.to_le_bytes());
        }
        buf
    }
}

/// Owns the database file exclusively; serializes access behind an
/// internal mutex the way the original serializes `db_io_` behind a
/// recursive mutex (spec.md §5).
pub struct DiskManager {
    file: Mutex<File>,
    meta: Mutex<MetaPage>,
    closed: std::sync::atomic::AtomicBool,
}

fn phys(logical_id: PageId) -> u64 {
    (logical_id as u64) + (logical_id as u64) / (BITMAP_SIZE as u64) + 2
}

fn bitmap_phys_page(extent: u32) -> u64 {
    1 + (extent as u64) * (BITMAP_SIZE as u64 + 1)
}

impl DiskManager {
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let meta = if file_len >= PAGE_SIZE as u64 {
            let mut buf = vec![0u8; PAGE_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)?;
            MetaPage::decode(&buf)
        } else {
            let meta = MetaPage::empty();
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&meta.encode())?;
            file.flush()?;
            meta
        };

        Ok(Self {
            file: Mutex::new(file),
            meta: Mutex::new(meta),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    fn read_physical(&self, phys_page: u64, out: &mut [u8]) -> StorageResult<()> {
        debug_assert_eq!(out.len(), PAGE_SIZE);
        let mut file = self.file.lock().unwrap();
        let offset = phys_page * PAGE_SIZE as u64;
        let file_len = file.metadata()?.len();
        if offset >= file_len {
            out.iter_mut().for_each(|b| *b = 0);
            return Ok(());
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut read_so_far = 0;
        // Reads past EOF are zero-filled; a short read is treated the same
        // as a past-EOF read.
        loop {
            match file.read(&mut out[read_so_far..]) {
                Ok(0) => break,
                Ok(n) => read_so_far += n,
                Err(e) => return Err(e.into()),
            }
            if read_so_far == out.len() {
                break;
            }
        }
        if read_so_far < out.len() {
            out[read_so_far..].iter_mut().for_each(|b| *b = 0);
        }
        Ok(())
    }

    fn write_physical(&self, phys_page: u64, data: &[u8]) -> StorageResult<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        let mut file = self.file.lock().unwrap();
        let offset = phys_page * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn write_meta(&self, meta: &MetaPage) -> StorageResult<()> {
        self.write_physical(0, &meta.encode())
    }

    pub fn read_page(&self, logical_id: PageId, out: &mut [u8]) -> StorageResult<()> {
        assert!(logical_id >= 0, "invalid page id {}", logical_id);
        self.read_physical(phys(logical_id), out)
    }

    pub fn write_page(&self, logical_id: PageId, data: &[u8]) -> StorageResult<()> {
        assert!(logical_id >= 0, "invalid page id {}", logical_id);
        self.write_physical(phys(logical_id), data)
    }

    fn with_bitmap<R>(
        &self,
        extent: u32,
        f: impl FnOnce(&mut BitmapPage) -> R,
    ) -> StorageResult<R> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.read_physical(bitmap_phys_page(extent), &mut buf)?;
        let mut bitmap = BitmapPage::new(&mut buf);
        let result = f(&mut bitmap);
        self.write_physical(bitmap_phys_page(extent), &buf)?;
        Ok(result)
    }

    /// Scans extents in order for the first with free capacity, taking the
    /// lowest free bit within it; appends a new extent if none has room.
    pub fn allocate_page(&self) -> StorageResult<PageId> {
        let mut meta = self.meta.lock().unwrap();

        let mut extent = None;
        for i in 0..meta.num_extents {
            if meta.extent_used_page[i as usize] < BITMAP_SIZE as u32 {
                extent = Some(i);
                break;
            }
        }
        let extent = match extent {
            Some(e) => e,
            None => {
                if meta.num_extents as usize >= META_PAGE_MAX_EXTENTS {
                    warn!("disk manager out of pages: extent table full");
                    return Err(StorageError::OutOfPages);
                }
                let new_extent = meta.num_extents;
                meta.num_extents += 1;
                meta.extent_used_page[new_extent as usize] = 0;
                new_extent
            }
        };

        let bit = self.with_bitmap(extent, |bitmap| bitmap.allocate_page())?;
        let bit = match bit {
            Some(b) => b,
            None => {
                warn!("disk manager out of pages: extent {} full", extent);
                return Err(StorageError::OutOfPages);
            }
        };

        meta.num_allocated_pages += 1;
        meta.extent_used_page[extent as usize] += 1;
        self.write_meta(&meta)?;

        let logical_id = extent as i64 * BITMAP_SIZE as i64 + bit as i64;
        debug!("allocated logical page {}", logical_id);
        Ok(logical_id as PageId)
    }

    /// Idempotent: deallocating an already-free page is a no-op.
    pub fn deallocate_page(&self, logical_id: PageId) -> StorageResult<()> {
        if logical_id == INVALID_PAGE_ID || logical_id < 0 {
            return Ok(());
        }
        let extent = logical_id as u32 / BITMAP_SIZE as u32;
        let bit = logical_id as usize % BITMAP_SIZE;

        let mut meta = self.meta.lock().unwrap();
        if extent >= meta.num_extents {
            return Ok(());
        }

        let was_free = self.with_bitmap(extent, |bitmap| bitmap.is_page_free(bit))?;
        if was_free {
            return Ok(());
        }
        self.with_bitmap(extent, |bitmap| bitmap.deallocate_page(bit))?;
        meta.num_allocated_pages -= 1;
        meta.extent_used_page[extent as usize] -= 1;
        self.write_meta(&meta)?;
        Ok(())
    }

    pub fn is_page_free(&self, logical_id: PageId) -> StorageResult<bool> {
        let extent = logical_id as u32 / BITMAP_SIZE as u32;
        let bit = logical_id as usize % BITMAP_SIZE;
        let meta = self.meta.lock().unwrap();
        if extent >= meta.num_extents {
            return Ok(true);
        }
        drop(meta);
        self.with_bitmap(extent, |bitmap| bitmap.is_page_free(bit))
    }

    /// Flushes and closes the file exactly once.
    pub fn close(&self) -> StorageResult<()> {
        if self
            .closed
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            )
            .is_ok()
        {
            self.file.lock().unwrap().flush()?;
        }
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_tmp() -> (NamedTempFile, DiskManager) {
        let file = NamedTempFile::new().unwrap();
        let dm = DiskManager::open(file.path()).unwrap();
        (file, dm)
    }

    #[test]
    fn bitmap_allocation_lowest_free_bit() {
        let (_f, dm) = open_tmp();
        assert_eq!(dm.allocate_page().unwrap(), 0);
        assert_eq!(dm.allocate_page().unwrap(), 1);
        assert_eq!(dm.allocate_page().unwrap(), 2);
        dm.deallocate_page(1).unwrap();
        assert!(dm.is_page_free(1).unwrap());
        assert_eq!(dm.allocate_page().unwrap(), 1);
    }

    #[test]
    fn deallocate_is_idempotent() {
        let (_f, dm) = open_tmp();
        let p = dm.allocate_page().unwrap();
        dm.deallocate_page(p).unwrap();
        dm.deallocate_page(p).unwrap();
        assert!(dm.is_page_free(p).unwrap());
    }

    #[test]
    fn read_write_roundtrip() {
        let (_f, dm) = open_tmp();
        let p = dm.allocate_page().unwrap();
        let mut data = vec![0u8; PAGE_SIZE];
        data[0] = 0xab;
        data[PAGE_SIZE - 1] = 0xcd;
        dm.write_page(p, &data).unwrap();
        let mut out = vec![0u8; PAGE_SIZE];
        dm.read_page(p, &mut out).unwrap();
        assert_eq!(data, out);
    }

    #[test]
    fn read_past_eof_is_zero_filled() {
        let (_f, dm) = open_tmp();
        let mut out = vec![0xffu8; PAGE_SIZE];
        dm.read_page(500, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    #[ignore] // slow: allocates a full extent plus a few pages of the next
    fn allocate_across_extent_boundary() {
        let (_f, dm) = open_tmp();
        for i in 0..(BITMAP_SIZE as i32 + 5) {
            assert_eq!(dm.allocate_page().unwrap(), i);
        }
    }
}
