//! Compile-time constants shared by every layer of the storage core.

/// Size in bytes of every page, logical and physical alike.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel value for "no page" in any context that names a [`crate::PageId`].
pub const INVALID_PAGE_ID: i32 = -1;

/// Physical page 0: the disk manager's own bookkeeping page.
pub const META_PAGE_ID: i32 = 0;

/// Logical page 1: maps `index_id -> root_page_id` for every B+ tree in the
/// database (§4.5, §6 of the spec).
pub const INDEX_ROOTS_PAGE_ID: i32 = 1;

/// Logical page 2: reserved for the external catalog's own metadata. The
/// storage core never reads or writes it; it only reserves the slot so the
/// catalog can allocate it deterministically.
pub const CATALOG_META_PAGE_ID: i32 = 2;

/// Number of data pages tracked by a single bitmap page: the number of bits
/// that fit in one page after its 4-byte `page_allocated` header
/// (`bitmap_page::max_supported_size()`). Must track that function exactly:
/// `disk_manager.rs` uses this constant for both the extent-full check in
/// `allocate_page` and the extent's physical layout, so a mismatch against
/// the bitmap page's real capacity caps the disk manager at one extent.
pub const BITMAP_SIZE: usize = (PAGE_SIZE - 4) * 8;

/// Number of `u32` extent-usage counters that fit in the meta page, after
/// its two header fields (`num_allocated_pages`, `num_extents`).
pub const META_PAGE_MAX_EXTENTS: usize = PAGE_SIZE / 4 - 2;

/// Runtime-tunable knobs that the embedding executor picks when it opens a
/// database. Page size is not among them: it is a compile-time constant
/// (spec.md §1, Non-goals: "variable page sizes at run time").
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of frames the buffer pool manager holds in RAM.
    pub buffer_pool_size: usize,
    /// Maximum number of entries a B+ tree leaf page may hold before it
    /// must split.
    pub leaf_max_size: usize,
    /// Maximum number of entries a B+ tree internal page may hold before
    /// it must split.
    pub internal_max_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_pool_size: 64,
            leaf_max_size: 128,
            internal_max_size: 128,
        }
    }
}
