// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An ordered set of disjoint, auto-merging key intervals recording which
//! parts of the keyspace are fully represented in the item cache.
//!
//! Unlike the item index (`item_index`), no node here needs a per-node
//! summary — membership and neighbour lookup are the only operations, which
//! is exactly the shape `std::collections::BTreeMap` is built for. Reaching
//! for a hand-rolled tree here would just be unaugmented ceremony; the host
//! tree itself keeps this kind of non-augmented ordered index
//! (`tombstones_by_end`, `skip_list` scans) on stdlib collections and saves
//! its own hand-rolled AVL tree for the one structure that actually needs
//! subtree summaries.

use crate::key::{compare_point_to_range, compare_ranges, Key};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Keyed by range start, mapping to range end (inclusive).
#[derive(Default)]
pub struct RangeIndex {
    ranges: BTreeMap<Key, Key>,
}

impl RangeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns `Some(end)` if `key` falls inside a cached range, else `None`.
    #[must_use]
    pub fn covers(&self, key: &Key) -> Option<Key> {
        let (start, end) = self.ranges.range(..=key.clone()).next_back()?;
        (compare_point_to_range(key, start, end) == Ordering::Equal).then(|| end.clone())
    }

    /// Start of the least range strictly greater than `key`, or `None` if
    /// every range lies at or before `key`.
    #[must_use]
    pub fn next_range_start_after(&self, key: &Key) -> Option<Key> {
        self.ranges
            .range((std::ops::Bound::Excluded(key.clone()), std::ops::Bound::Unbounded))
            .next()
            .map(|(start, _)| start.clone())
            .filter(|start| start > key)
    }

    /// Inserts `[start, end]`, merging with any overlapping or abutting
    /// existing ranges. `start` and `end` are both inclusive; `start <= end`
    /// is a precondition enforced by the caller (`Cache::insert_batch`
    /// validates it before calling in).
    pub fn insert(&mut self, mut start: Key, mut end: Key) {
        // Every existing range that overlaps or touches [start, end] has a
        // start <= end (the reverse, end >= start, is checked below). Because
        // ranges are kept disjoint by this same merge on every prior insert,
        // one pass over that prefix is enough — absorbing these candidates
        // can never create a new adjacency to a range outside the prefix.
        let to_remove: Vec<Key> = self
            .ranges
            .range(..=end.clone())
            .filter(|(s, e)| compare_ranges(s, e, &start, &end) == Ordering::Equal)
            .map(|(s, _)| s.clone())
            .collect();

        for s in &to_remove {
            if let Some(e) = self.ranges.remove(s) {
                if *s < start {
                    start = s.clone();
                }
                if e > end {
                    end = e;
                }
            }
        }

        self.ranges.insert(start, end);
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    #[cfg(test)]
    fn is_disjoint(&self) -> bool {
        let mut prev_end: Option<&Key> = None;
        for (start, end) in &self.ranges {
            if let Some(pe) = prev_end {
                if start <= pe {
                    return false;
                }
            }
            prev_end = Some(end);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn k(b: &[u8]) -> Key {
        Key::from(b)
    }

    #[test]
    fn covers_inside_range() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"b"), k(b"d"));
        assert_eq!(idx.covers(&k(b"c")), Some(k(b"d")));
    }

    #[test]
    fn covers_outside_range() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"b"), k(b"d"));
        assert!(idx.covers(&k(b"e")).is_none());
    }

    #[test]
    fn next_range_start_after_finds_following_range() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"d"), k(b"f"));
        assert_eq!(idx.next_range_start_after(&k(b"a")), Some(k(b"d")));
        assert!(idx.next_range_start_after(&k(b"e")).is_none());
    }

    #[test]
    fn insert_merges_overlapping_ranges() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"a"), k(b"c"));
        idx.insert(k(b"b"), k(b"e"));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.covers(&k(b"d")), Some(k(b"e")));
        assert!(idx.is_disjoint());
    }

    #[test]
    fn insert_merges_abutting_ranges() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"a"), k(b"c"));
        idx.insert(k(b"c"), k(b"e"));
        assert_eq!(idx.len(), 1);
        assert!(idx.is_disjoint());
    }

    #[test]
    fn insert_keeps_disjoint_ranges_separate() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"a"), k(b"b"));
        idx.insert(k(b"x"), k(b"y"));
        assert_eq!(idx.len(), 2);
        assert!(idx.is_disjoint());
    }

    #[test]
    fn insert_absorbing_interval_containing_many() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"b"), k(b"c"));
        idx.insert(k(b"e"), k(b"f"));
        idx.insert(k(b"a"), k(b"z"));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.covers(&k(b"b")), Some(k(b"z")));
    }

    #[test]
    fn insert_contained_interval_is_noop() {
        let mut idx = RangeIndex::new();
        idx.insert(k(b"a"), k(b"z"));
        idx.insert(k(b"b"), k(b"c"));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.covers(&k(b"b")), Some(k(b"z")));
    }
}
