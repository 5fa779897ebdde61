// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Contracts for the external collaborators the cache reads from and flushes
//! into. The segment format, the manifest, and how a reader locates the
//! right on-disk segment(s) for a key range are all out of scope here —
//! this module only states what the cache needs from them.

use crate::{key::Key, value::Value};

/// Per-item flags carried alongside a flushed item. Only deletion is defined
/// at this layer; everything else about the on-disk representation belongs
/// to the segment format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFlags {
    pub deletion: bool,
}

/// Populates the cache with items over a key range.
///
/// Implementors read from segments/the manifest, then call back into
/// [`crate::cache::Cache::add_batch`] and
/// [`crate::cache::Cache::insert_batch`] to hand the cache a coherent
/// snapshot of `[start, end]`. Called by the cache without holding its lock.
pub trait SegmentReader {
    /// Error type surfaced verbatim by the cache as `Error::Reader`.
    type Error: std::fmt::Debug;

    /// Reads every live item in `[start, end]`. The cache stages the
    /// returned pairs via `add_batch` and atomically commits them with the
    /// covering range via `insert_batch`.
    fn read_range(&self, start: &Key, end: &Key) -> Result<Vec<(Key, Value)>, Self::Error>;
}

/// Destination for a flushed prefix of dirty items, written in ascending key
/// order within one segment.
pub trait SegmentWriter {
    /// Error type for write failures.
    type Error: std::fmt::Debug;

    /// Whether `nr` additional items totalling `key_bytes`/`val_bytes` still
    /// fit in a single segment, given whatever has already been primed via
    /// [`SegmentWriter::first_item`].
    fn fits_single(&self, nr: usize, key_bytes: usize, val_bytes: usize) -> bool;

    /// Primes the segment header with the total item count and key-byte
    /// total, then writes the first item.
    fn first_item(
        &mut self,
        key: &Key,
        value: &[u8],
        flags: ItemFlags,
        nr: usize,
        key_bytes: usize,
    ) -> Result<(), Self::Error>;

    /// Appends a subsequent item.
    fn append_item(&mut self, key: &Key, value: &[u8], flags: ItemFlags) -> Result<(), Self::Error>;
}
