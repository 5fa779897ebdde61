// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An in-memory item cache for a log-structured key-value store.
//!
//! ##### About
//!
//! This crate holds a filesystem's (or any log-structured store's) recently
//! used and not-yet-flushed items in memory, backed by two indexes: one
//! tracking which key ranges are fully represented in memory
//! ([`RangeIndex`]), and one holding the items themselves, augmented so
//! dirty (not-yet-flushed) items can be found in key order without a full
//! scan ([`ItemIndex`]). Misses fall through to an injected
//! [`SegmentReader`]; flushing a prefix of dirty items out to a segment goes
//! through an injected [`SegmentWriter`].
//!
//! This crate does not decide *when* to flush, does not choose which segment
//! a key range lives in, and does not itself perform any disk I/O — all of
//! that is the embedder's responsibility, reached through the
//! [`SegmentReader`]/[`SegmentWriter`] traits.
//!
//! # Example usage
//!
//! ```
//! use item_cache::{Cache, CacheConfig, ItemFlags, Key, SegmentReader, SegmentWriter, Value};
//!
//! #[derive(Debug)]
//! struct EmptyReader;
//!
//! impl SegmentReader for EmptyReader {
//!     type Error = std::convert::Infallible;
//!
//!     fn read_range(&self, _start: &Key, _end: &Key) -> Result<Vec<(Key, Value)>, Self::Error> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let cache = Cache::new(EmptyReader, CacheConfig::new());
//!
//! cache.create(Key::from(b"my_key".as_slice()), Value::single(b"my_value".as_slice()))?;
//!
//! let mut out = Vec::new();
//! cache.lookup(&Key::from(b"my_key".as_slice()), &mut out, 64)?;
//! assert_eq!(out, b"my_value");
//! #
//! # Ok::<(), item_cache::Error<std::convert::Infallible>>(())
//! ```

#![doc(html_logo_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod cache;
mod config;
mod error;
mod item_index;
mod key;
mod observer;
mod range_index;
mod segment;
mod slice;
mod value;

pub use {
    cache::{BatchList, Cache},
    config::CacheConfig,
    error::{Error, Result},
    item_index::{Item, ItemIndex},
    key::Key,
    observer::{CacheObserver, NoopObserver},
    range_index::RangeIndex,
    segment::{ItemFlags, SegmentReader, SegmentWriter},
    slice::Slice,
    value::Value,
};
