//! B+ Tree Index (C5, spec.md §4.5): a disk-resident, ordered index
//! mapping fixed-size opaque keys to [`crate::types::RowId`]s, built on
//! top of the buffer pool the same way [`crate::table`] builds the heap
//! file on it.

pub mod b_plus_tree;
pub mod index_roots_page;
pub mod iterator;
pub mod key;
pub mod page;

pub use b_plus_tree::{BPlusTree, ScanOp};
pub use index_roots_page::IndexRootsPage;
pub use iterator::IndexIterator;
pub use key::{GenericKeyManager, IntKeyManager, KeyManager};
