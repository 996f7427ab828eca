//! Typed error kinds surfaced by the storage core (spec.md §7).
//!
//! `small-db`, the repo this crate is grounded on, rolls a single untyped
//! `SmallError`. The spec calls for a closed set of kinds callers can match
//! on, so this is one place we reach past the teacher and into the rest of
//! the retrieval pack, which reaches for `thiserror` for exactly this job.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// No frame can be freed because every frame in the pool is pinned.
    #[error("buffer pool exhausted: all frames pinned")]
    PoolExhausted,

    /// The disk manager has no more logical pages to hand out.
    #[error("disk manager out of pages")]
    OutOfPages,

    /// A tuple's serialized size exceeds what any page can hold.
    #[error("tuple too large: {size} bytes exceeds page capacity")]
    TupleTooLarge { size: usize },

    /// Insert into a unique index with an already-present key.
    #[error("duplicate key")]
    DuplicateKey,

    /// A lookup found nothing.
    #[error("not found")]
    NotFound,

    /// A magic-number mismatch during deserialization. Fatal: callers must
    /// not retry or paper over it.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// An I/O failure short of corruption; the caller's operation failed
    /// but buffer pool state remains consistent.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
