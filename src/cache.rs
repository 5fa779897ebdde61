// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The public façade: reconciles lookups and mutations against the item and
//! range indexes, falling back to the embedder's segment reader on a
//! coverage miss, and drives the dirty-item flush protocol.
//!
//! A single [`std::sync::Mutex`] serializes all tree access, mirroring the
//! single cache-wide spinlock the design is grounded on. Unlike that
//! spinlock, this one is released around every segment-reader call (segment
//! reads may block on real I/O), and every such call re-checks the cache
//! after reacquiring the lock — the cache may have changed while the lock
//! was released.

use crate::{
    config::CacheConfig,
    error::{Error, Result},
    item_index::{Item, ItemIndex},
    key::Key,
    observer::{CacheObserver, NoopObserver},
    range_index::RangeIndex,
    segment::{ItemFlags, SegmentReader, SegmentWriter},
    value::Value,
};
use std::sync::Mutex;

/// Items staged by a segment reader before being committed atomically via
/// [`Cache::insert_batch`].
#[derive(Default)]
pub struct BatchList {
    items: Vec<(Key, Value)>,
}

impl BatchList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

struct Inner {
    items: ItemIndex,
    ranges: RangeIndex,
    nr_dirty_items: usize,
    dirty_key_bytes: usize,
    dirty_val_bytes: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            items: ItemIndex::new(),
            ranges: RangeIndex::new(),
            nr_dirty_items: 0,
            dirty_key_bytes: 0,
            dirty_val_bytes: 0,
        }
    }

    /// Marks the item at `key` dirty, bumping the aggregate counters iff it
    /// wasn't already dirty.
    fn mark_dirty_and_count(&mut self, key: &Key, val_len: usize) {
        if self.items.mark_dirty(key) == Some(false) {
            self.nr_dirty_items += 1;
            self.dirty_key_bytes += key.len();
            self.dirty_val_bytes += val_len;
        }
    }

    fn clear_dirty_and_count(&mut self, key: &Key, val_len: usize) {
        if self.items.clear_dirty(key) == Some(true) {
            self.nr_dirty_items -= 1;
            self.dirty_key_bytes -= key.len();
            self.dirty_val_bytes -= val_len;
        }
    }

    /// Subtracts `old`'s dirty footprint from the aggregate counters, without
    /// touching the tree. Used when a tree node has already been overwritten
    /// in place (a tombstone replaced by a fresh insert) so the usual
    /// `clear_dirty_and_count` path, which reads the tree's current dirty
    /// flag, would no longer see the item being discarded.
    fn discard_dirty_contribution(&mut self, key: &Key, old: &Item) {
        if old.dirty {
            self.nr_dirty_items -= 1;
            self.dirty_key_bytes -= key.len();
            self.dirty_val_bytes -= old.value.len();
        }
    }
}

/// The in-memory item cache.
///
/// Generic over the embedder's [`SegmentReader`] so the cache never depends
/// on a concrete segment format; a [`SegmentWriter`] is instead threaded
/// through per-call to [`Cache::dirty_seg`], since flushing is driven by the
/// caller's transaction boundary rather than something the cache schedules
/// itself.
pub struct Cache<R: SegmentReader> {
    inner: Mutex<Inner>,
    reader: R,
    observer: Box<dyn CacheObserver>,
    config: CacheConfig,
}

impl<R: SegmentReader> Cache<R> {
    /// Creates an empty cache around `reader`, with a no-op observer.
    #[must_use]
    pub fn new(reader: R, config: CacheConfig) -> Self {
        Self::with_observer(reader, config, Box::new(NoopObserver))
    }

    #[must_use]
    pub fn with_observer(reader: R, config: CacheConfig, observer: Box<dyn CacheObserver>) -> Self {
        log::debug!("setting up item cache, max_key_len={}", config.max_key_len);
        Self {
            inner: Mutex::new(Inner::new()),
            reader,
            observer,
            config,
        }
    }

    fn check_key_len(&self, key: &Key) -> Result<(), R::Error> {
        if key.len() > self.config.max_key_len || key.is_empty() {
            return Err(Error::Invalid);
        }
        Ok(())
    }

    /// Reads `[start, end]` from the segment reader and commits the result.
    /// Called with the cache lock *not* held.
    fn fetch_range(&self, start: &Key, end: &Key) -> Result<(), R::Error> {
        log::trace!("fetching range [{:?}, {:?}] from segment reader", start.as_bytes(), end.as_bytes());
        let found = self.reader.read_range(start, end).map_err(Error::Reader)?;

        let mut list = BatchList::new();
        for (key, value) in found {
            self.add_batch(&mut list, key, value);
        }
        self.insert_batch(list, start.clone(), end.clone())
    }

    /// Appends a value read from segments to a staging list, to be committed
    /// by [`Cache::insert_batch`].
    pub fn add_batch(&self, list: &mut BatchList, key: Key, value: Value) {
        list.items.push((key, value));
    }

    /// Atomically inserts the coverage range `[start, end]` and every staged
    /// item whose key doesn't already hold a live entry (a live entry is
    /// presumed newer than anything a segment read could have found, so
    /// colliding staged items are silently dropped).
    pub fn insert_batch(&self, list: BatchList, start: Key, end: Key) -> Result<(), R::Error> {
        if start > end {
            return Err(Error::Invalid);
        }

        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.ranges.insert(start, end);
        self.observer.range_insert();

        for (key, value) in list.items {
            let item = Item::live(value, false);
            let _ = guard.items.insert_or_replace(key, item);
        }

        Ok(())
    }

    /// Looks up `key`, copying at most `max_len` bytes of its value into
    /// `out`. Returns the number of bytes copied.
    pub fn lookup(&self, key: &Key, out: &mut Vec<u8>, max_len: usize) -> Result<usize, R::Error> {
        self.check_key_len(key)?;
        loop {
            let (covered_end, uncovered_next) = {
                let guard = self.inner.lock().expect("cache mutex poisoned");
                if let Some(item) = guard.items.get(key) {
                    if !item.deletion {
                        self.observer.item_hit();
                        let n = item.value.copy_into(out, max_len);
                        log::trace!("lookup key_len={} ret=Ok({n})", key.len());
                        return Ok(n);
                    }
                }
                self.observer.item_miss();

                match guard.ranges.covers(key) {
                    Some(end) => {
                        self.observer.range_hit();
                        (Some(end), None)
                    }
                    None => {
                        let next = guard.ranges.next_range_start_after(key).unwrap_or_else(Key::max_sentinel);
                        (None, Some(next))
                    }
                }
            };

            match (covered_end, uncovered_next) {
                (Some(_), None) => {
                    log::trace!("lookup key_len={} ret=Err(NotFound)", key.len());
                    return Err(Error::NotFound);
                }
                (None, Some(upper)) => {
                    self.observer.range_miss();
                    self.fetch_range(key, &upper)?;
                }
                _ => unreachable!("covers() and next_range_start_after() are mutually exclusive"),
            }
        }
    }

    /// Like [`Cache::lookup`], but fails with `Error::Corrupt` if the copied
    /// length doesn't match `expected_len`.
    pub fn lookup_exact(&self, key: &Key, out: &mut Vec<u8>, expected_len: usize) -> Result<(), R::Error> {
        let n = self.lookup(key, out, expected_len)?;
        if n != expected_len {
            return Err(Error::Corrupt);
        }
        Ok(())
    }

    /// Finds the least live item with key in `[key, last]`.
    pub fn next(&self, key: &Key, last: &Key, out: &mut Vec<u8>, max_len: usize) -> Result<Key, R::Error> {
        if key > last {
            return Err(Error::NotFound);
        }

        enum Step {
            Found(Key, usize),
            FetchThenRetry { window_start: Key, window_end: Key },
            NotFound,
        }

        let mut cursor = key.clone();
        loop {
            let step = {
                let guard = self.inner.lock().expect("cache mutex poisoned");
                match guard.ranges.covers(&cursor) {
                    Some(range_end) => {
                        self.observer.range_hit();
                        let search_end = if range_end < *last { range_end.clone() } else { last.clone() };
                        match guard.items.next_live(&cursor, &search_end) {
                            Some((found_key, item)) => {
                                self.observer.item_hit();
                                let n = item.value.copy_into(out, max_len);
                                Step::Found(found_key, n)
                            }
                            None if range_end >= *last => Step::NotFound,
                            None => {
                                self.observer.range_miss();
                                Step::FetchThenRetry { window_start: range_end.clone(), window_end: last.clone() }
                            }
                        }
                    }
                    None => {
                        self.observer.range_miss();
                        let window_end = guard.ranges.next_range_start_after(&cursor).unwrap_or_else(|| last.clone());
                        Step::FetchThenRetry { window_start: cursor.clone(), window_end }
                    }
                }
            };

            match step {
                Step::Found(found_key, n) => {
                    log::trace!("next ret=Ok({found_key:?}), bytes={n}");
                    return Ok(found_key);
                }
                Step::NotFound => {
                    log::trace!("next ret=Err(NotFound)");
                    return Err(Error::NotFound);
                }
                Step::FetchThenRetry { window_start, window_end } => {
                    self.fetch_range(&window_start, &window_end)?;
                    cursor = window_start;
                }
            }
        }
    }

    /// As [`Cache::next`], but fails with `Error::Corrupt` unless the found
    /// key's length equals `expected_key_len`.
    pub fn next_same_len(&self, key: &Key, last: &Key, out: &mut Vec<u8>, max_len: usize, expected_key_len: usize) -> Result<Key, R::Error> {
        let found = self.next(key, last, out, max_len)?;
        if found.len() != expected_key_len {
            return Err(Error::Corrupt);
        }
        Ok(found)
    }

    /// As [`Cache::next`], but fails with `Error::Corrupt` unless the found
    /// key's length equals `expected_key_len` and the copied value is at
    /// least `min_val_len` bytes.
    pub fn next_same_min(
        &self,
        key: &Key,
        last: &Key,
        out: &mut Vec<u8>,
        max_len: usize,
        expected_key_len: usize,
        min_val_len: usize,
    ) -> Result<Key, R::Error> {
        let start_len = out.len();
        let found = self.next(key, last, out, max_len)?;
        if found.len() != expected_key_len || out.len() - start_len < min_val_len {
            return Err(Error::Corrupt);
        }
        Ok(found)
    }

    /// Creates a new live item at `key`. Does not consult segments first —
    /// callers are presumed to already hold whatever external lock prevents
    /// masking an on-disk item of the same key (see `DESIGN.md`).
    pub fn create(&self, key: Key, value: Value) -> Result<(), R::Error> {
        self.check_key_len(&key)?;
        let val_len = value.len();
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let item = Item::live(value, false);
        match guard.items.insert_or_replace(key.clone(), item) {
            Ok(None) => {}
            Ok(Some(old)) => guard.discard_dirty_contribution(&key, &old),
            Err(()) => return Err(Error::Exists),
        }
        guard.mark_dirty_and_count(&key, val_len);
        self.observer.item_create();
        log::trace!("create key_len={} ret=Ok", key.len());
        Ok(())
    }

    /// Ensures the item at `key` exists and is dirty, reading it from
    /// segments if necessary.
    pub fn dirty(&self, key: &Key) -> Result<(), R::Error> {
        loop {
            let outcome = {
                let mut guard = self.inner.lock().expect("cache mutex poisoned");
                if let Some(item) = guard.items.get(key) {
                    if item.deletion {
                        return Err(Error::NotFound);
                    }
                    let val_len = item.value.len();
                    guard.mark_dirty_and_count(key, val_len);
                    return Ok(());
                }
                guard.ranges.covers(key)
            };

            match outcome {
                Some(_) => return Err(Error::NotFound),
                None => {
                    let upper = {
                        let guard = self.inner.lock().expect("cache mutex poisoned");
                        guard.ranges.next_range_start_after(key).unwrap_or_else(Key::max_sentinel)
                    };
                    self.fetch_range(key, &upper)?;
                }
            }
        }
    }

    /// Replaces the item's value at `key` and marks it dirty, reading it
    /// from segments first if it isn't already cached. A `null` value is
    /// valid and means "value absent".
    pub fn update(&self, key: Key, value: Value) -> Result<(), R::Error> {
        self.dirty(&key)?;
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let Some(item) = guard.items.get(&key) else {
            return Err(Error::NotFound);
        };
        let old_val_len = item.value.len();
        guard.clear_dirty_and_count(&key, old_val_len);

        // Replace the value in place: the key is unchanged so this cannot
        // violate tree ordering. Erase + reinsert keeps item_index's API
        // surface (insert_or_replace/erase) free of a separate "replace
        // value only" primitive.
        guard.items.erase(&key);
        let new_val_len = value.len();
        guard
            .items
            .insert_or_replace(key.clone(), Item::live(value, false))
            .expect("key was just erased");
        guard.mark_dirty_and_count(&key, new_val_len);
        log::trace!("update key_len={} ret=Ok", key.len());
        Ok(())
    }

    /// Converts the item at `key` into a (dirty) tombstone. Requires the
    /// item to already exist, reading it from segments first if needed.
    pub fn delete(&self, key: &Key) -> Result<(), R::Error> {
        self.dirty(key)?;
        self.delete_dirty(key)
    }

    /// As [`Cache::delete`], but requires the caller to already have pinned
    /// `key` dirty via [`Cache::dirty`] or [`Cache::create`]; fails with
    /// `Error::Invalid` rather than reading from segments if that
    /// precondition doesn't hold.
    pub fn delete_dirty(&self, key: &Key) -> Result<(), R::Error> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let Some(item) = guard.items.get(key) else {
            return Err(Error::Invalid);
        };
        if item.deletion || !item.dirty {
            return Err(Error::Invalid);
        }
        let old_val_len = item.value.len();
        guard.clear_dirty_and_count(key, old_val_len);
        guard.items.erase(key);
        guard
            .items
            .insert_or_replace(key.clone(), Item::tombstone(false))
            .expect("key was just erased");
        guard.mark_dirty_and_count(key, 0);
        self.observer.item_delete();
        log::trace!("delete_dirty key_len={} ret=Ok", key.len());
        Ok(())
    }

    /// Pins every key dirty first (aborting the whole batch on the first
    /// failure, before any deletion happens), then deletes each — so the
    /// batch can never partially fail once deletions begin.
    pub fn delete_many(&self, keys: &[Key]) -> Result<(), R::Error> {
        for key in keys {
            self.dirty(key)?;
        }
        for key in keys {
            self.delete_dirty(key)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn has_dirty(&self) -> bool {
        self.inner.lock().expect("cache mutex poisoned").items.has_dirty()
    }

    /// Whether `add_nr` additional dirty items totalling
    /// `add_key_bytes`/`add_val_bytes` still fit alongside the current dirty
    /// set in one segment, per `writer`.
    #[must_use]
    pub fn dirty_fits_single<W: SegmentWriter>(&self, writer: &W, add_nr: usize, add_key_bytes: usize, add_val_bytes: usize) -> bool {
        let guard = self.inner.lock().expect("cache mutex poisoned");
        writer.fits_single(
            guard.nr_dirty_items + add_nr,
            guard.dirty_key_bytes + add_key_bytes,
            guard.dirty_val_bytes + add_val_bytes,
        )
    }

    /// Writes the longest key-ordered prefix of dirty items that fits in one
    /// segment, clears their dirty flags, and erases any flushed tombstones.
    ///
    /// Two passes over the same prefix: the first counts items and key bytes
    /// until they stop fitting, the second writes them (the segment header
    /// needs the final count and key-byte total before the first item is
    /// written).
    pub fn dirty_seg<W: SegmentWriter>(&self, writer: &mut W) -> std::result::Result<usize, W::Error> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");

        let mut count = 0usize;
        let mut key_bytes = 0usize;
        let mut val_bytes = 0usize;
        let mut cursor = guard.items.first_dirty();
        let mut last_fitting: Option<Key> = None;

        while let Some(key) = cursor {
            let Some(item) = guard.items.get(&key) else {
                break;
            };
            let next_key_bytes = key_bytes + key.len();
            let next_val_bytes = val_bytes + item.value.len();
            if !writer.fits_single(count + 1, next_key_bytes, next_val_bytes) {
                break;
            }
            count += 1;
            key_bytes = next_key_bytes;
            val_bytes = next_val_bytes;
            last_fitting = Some(key.clone());
            cursor = guard.items.next_dirty(&key);
        }

        let Some(last_key) = last_fitting else {
            return Ok(0);
        };

        let mut cursor = guard.items.first_dirty();
        let mut written = 0usize;
        let mut to_erase = Vec::new();

        while let Some(key) = cursor {
            let Some(item) = guard.items.get(&key).cloned() else {
                break;
            };
            let flags = ItemFlags { deletion: item.deletion };
            let mut scratch = Vec::new();
            let copied_len = item.value.len();
            item.value.copy_into(&mut scratch, copied_len);

            if written == 0 {
                writer.first_item(&key, &scratch, flags, count, key_bytes)?;
            } else {
                writer.append_item(&key, &scratch, flags)?;
            }
            written += 1;

            guard.clear_dirty_and_count(&key, item.value.len());
            if item.deletion {
                to_erase.push(key.clone());
            }

            if key == last_key {
                break;
            }
            cursor = guard.items.next_dirty(&key);
        }

        for key in to_erase {
            guard.items.erase(&key);
        }

        log::debug!("dirty_seg wrote {written} items ({key_bytes} key bytes, {val_bytes} value bytes)");
        Ok(written)
    }

    /// Drops every cached item and range. No external readers may be
    /// concurrently using the cache when this is called.
    pub fn destroy(&self) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.items.clear();
        guard.ranges.clear();
        guard.nr_dirty_items = 0;
        guard.dirty_key_bytes = 0;
        guard.dirty_val_bytes = 0;
        log::debug!("item cache destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;
    use test_log::test;

    #[derive(Debug)]
    struct FakeReader {
        items: StdMutex<BTreeMap<Key, Value>>,
    }

    impl FakeReader {
        fn new(entries: Vec<(&'static [u8], &'static [u8])>) -> Self {
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                map.insert(Key::from(k), Value::single(v));
            }
            Self { items: StdMutex::new(map) }
        }
    }

    impl SegmentReader for FakeReader {
        type Error = std::convert::Infallible;

        fn read_range(&self, start: &Key, end: &Key) -> std::result::Result<Vec<(Key, Value)>, Self::Error> {
            let items = self.items.lock().unwrap();
            Ok(items
                .iter()
                .filter(|(k, _)| k >= start && k <= end)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }
    }

    struct FakeWriter {
        written: Vec<(Key, Vec<u8>, ItemFlags)>,
        capacity: usize,
    }

    impl FakeWriter {
        fn new(capacity: usize) -> Self {
            Self { written: Vec::new(), capacity }
        }
    }

    impl SegmentWriter for FakeWriter {
        type Error = std::convert::Infallible;

        fn fits_single(&self, nr: usize, key_bytes: usize, val_bytes: usize) -> bool {
            nr <= self.capacity && key_bytes + val_bytes <= self.capacity * 64
        }

        fn first_item(&mut self, key: &Key, value: &[u8], flags: ItemFlags, _nr: usize, _key_bytes: usize) -> std::result::Result<(), Self::Error> {
            self.written.push((key.clone(), value.to_vec(), flags));
            Ok(())
        }

        fn append_item(&mut self, key: &Key, value: &[u8], flags: ItemFlags) -> std::result::Result<(), Self::Error> {
            self.written.push((key.clone(), value.to_vec(), flags));
            Ok(())
        }
    }

    fn k(b: &'static [u8]) -> Key {
        Key::from(b)
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn lookup_misses_then_fetches_from_segments() {
        let reader = FakeReader::new(vec![(b"b", b"2")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());

        let mut out = Vec::new();
        let n = cache.lookup(&k(b"b"), &mut out, 16).unwrap();
        assert_eq!(n, 1);
        assert_eq!(out, b"2");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn lookup_not_found_after_range_covered() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        let mut out = Vec::new();
        assert!(matches!(cache.lookup(&k(b"z"), &mut out, 16), Err(Error::NotFound)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn lookup_second_call_hits_cache_without_refetch() {
        let reader = FakeReader::new(vec![(b"a", b"1")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        let mut out = Vec::new();
        cache.lookup(&k(b"a"), &mut out, 16).unwrap();

        cache.reader.items.lock().unwrap().clear();
        out.clear();
        let n = cache.lookup(&k(b"a"), &mut out, 16).unwrap();
        assert_eq!(out, b"1");
        assert_eq!(n, 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn create_then_lookup_returns_new_item() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.create(k(b"x"), Value::single(b"hello".as_slice())).unwrap();

        let mut out = Vec::new();
        let n = cache.lookup(&k(b"x"), &mut out, 16).unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, b"hello");
        assert!(cache.has_dirty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn create_duplicate_key_fails_with_exists() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.create(k(b"x"), Value::single(b"1".as_slice())).unwrap();
        assert!(matches!(cache.create(k(b"x"), Value::single(b"2".as_slice())), Err(Error::Exists)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn update_replaces_value_and_marks_dirty() {
        let reader = FakeReader::new(vec![(b"a", b"old")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.update(k(b"a"), Value::single(b"new".as_slice())).unwrap();

        let mut out = Vec::new();
        cache.lookup(&k(b"a"), &mut out, 16).unwrap();
        assert_eq!(out, b"new");
        assert!(cache.has_dirty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn delete_converts_item_to_tombstone() {
        let reader = FakeReader::new(vec![(b"a", b"1")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.delete(&k(b"a")).unwrap();

        let mut out = Vec::new();
        assert!(matches!(cache.lookup(&k(b"a"), &mut out, 16), Err(Error::NotFound)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn delete_dirty_without_prior_dirty_pin_fails() {
        let reader = FakeReader::new(vec![(b"a", b"1")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        assert!(matches!(cache.delete_dirty(&k(b"a")), Err(Error::Invalid)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn delete_many_is_all_or_nothing_on_missing_key() {
        let reader = FakeReader::new(vec![(b"a", b"1")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        let result = cache.delete_many(&[k(b"a"), k(b"missing")]);
        assert!(result.is_err());

        let mut out = Vec::new();
        let n = cache.lookup(&k(b"a"), &mut out, 16).unwrap();
        assert_eq!(n, 1, "key a must still be live since the batch aborted before any deletion");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn next_finds_least_live_key_in_window() {
        let reader = FakeReader::new(vec![(b"b", b"1"), (b"d", b"2")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        let mut out = Vec::new();
        let found = cache.next(&k(b"a"), &k(b"z"), &mut out, 16).unwrap();
        assert_eq!(found.as_bytes(), b"b");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn next_returns_not_found_when_window_exhausted() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        let mut out = Vec::new();
        assert!(matches!(cache.next(&k(b"a"), &k(b"z"), &mut out, 16), Err(Error::NotFound)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn dirty_seg_writes_and_clears_dirty_items() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.create(k(b"a"), Value::single(b"1".as_slice())).unwrap();
        cache.create(k(b"b"), Value::single(b"2".as_slice())).unwrap();

        let mut writer = FakeWriter::new(10);
        let written = cache.dirty_seg(&mut writer).unwrap();
        assert_eq!(written, 2);
        assert!(!cache.has_dirty());
        assert_eq!(writer.written.len(), 2);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn dirty_seg_stops_at_capacity_and_leaves_remainder_dirty() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.create(k(b"a"), Value::single(b"1".as_slice())).unwrap();
        cache.create(k(b"b"), Value::single(b"2".as_slice())).unwrap();
        cache.create(k(b"c"), Value::single(b"3".as_slice())).unwrap();

        let mut writer = FakeWriter::new(2);
        let written = cache.dirty_seg(&mut writer).unwrap();
        assert_eq!(written, 2);
        assert!(cache.has_dirty(), "the third item should remain dirty");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn dirty_seg_erases_flushed_tombstones() {
        let reader = FakeReader::new(vec![(b"a", b"1")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        cache.delete(&k(b"a")).unwrap();

        let mut writer = FakeWriter::new(10);
        let written = cache.dirty_seg(&mut writer).unwrap();
        assert_eq!(written, 1);

        let mut out = Vec::new();
        assert!(matches!(cache.lookup(&k(b"a"), &mut out, 16), Err(Error::NotFound)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn destroy_clears_everything() {
        let reader = FakeReader::new(vec![(b"a", b"1")]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new());
        let mut out = Vec::new();
        cache.lookup(&k(b"a"), &mut out, 16).unwrap();
        cache.destroy();

        cache.reader.items.lock().unwrap().insert(k(b"a"), Value::single(b"changed".as_slice()));
        out.clear();
        cache.lookup(&k(b"a"), &mut out, 16).unwrap();
        assert_eq!(out, b"changed", "destroy must drop cached state so a later lookup refetches");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn rejects_keys_over_configured_max_len() {
        let reader = FakeReader::new(vec![]);
        let cache: Cache<FakeReader> = Cache::new(reader, CacheConfig::new().max_key_len(2));
        assert!(matches!(cache.create(k(b"xyz"), Value::null()), Err(Error::Invalid)));
    }
}
