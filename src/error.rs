// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur while operating on the item cache.
///
/// Generic over `E`, the error type returned by the embedder's segment reader,
/// so a corrupt-on-disk error or an I/O failure from that external collaborator
/// passes through verbatim instead of being flattened into a cache-local variant.
#[derive(Debug)]
pub enum Error<E> {
    /// The key is known to be absent (the cache is fully covered for it and holds
    /// no live item).
    NotFound,

    /// `create` collided with an existing live item.
    Exists,

    /// Allocation failed; cache state is unchanged.
    OutOfMemory,

    /// A size or length contract was violated by underlying data (e.g.
    /// `lookup_exact` got a different length than expected).
    Corrupt,

    /// The caller passed invalid arguments (e.g. `start > end`, a too-small buffer).
    Invalid,

    /// Opaque error surfaced by the embedder's segment reader.
    Reader(E),
}

impl<E: std::fmt::Debug> std::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ItemCacheError: {self:?}")
    }
}

impl<E: std::fmt::Debug> std::error::Error for Error<E> {}

/// Item cache result.
pub type Result<T, E> = std::result::Result<T, Error<E>>;
