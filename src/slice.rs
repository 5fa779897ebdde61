// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteview::ByteView;
use std::sync::Arc;

/// An immutable byte slice that can be cloned without additional heap allocation.
///
/// Cloning a [`Slice`] bumps a refcount rather than copying bytes, which matters
/// here because keys and values move between the batch staging list and the
/// item tree, and are cloned again on every tree rotation.
#[derive(Debug, Clone, Eq, Ord)]
pub struct Slice(ByteView);

impl Slice {
    /// Constructs a [`Slice`] from a byte slice, copying its contents once.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// Returns the empty slice.
    #[must_use]
    pub fn empty() -> Self {
        Self(ByteView::new(&[]))
    }

    /// Concatenates two byte slices into one contiguous [`Slice`] without an
    /// intermediate `Vec`. Used to flatten scatter/gather values.
    pub(crate) fn fused(left: &[u8], right: &[u8]) -> Self {
        Self(ByteView::fused(left, right))
    }
}

impl AsRef<[u8]> for Slice {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Slice {
    fn from(value: &[u8]) -> Self {
        Self(ByteView::new(value))
    }
}

impl From<Vec<u8>> for Slice {
    fn from(value: Vec<u8>) -> Self {
        Self(ByteView::from(value))
    }
}

impl From<Arc<[u8]>> for Slice {
    fn from(value: Arc<[u8]>) -> Self {
        Self::from(&*value)
    }
}

impl<const N: usize> From<[u8; N]> for Slice {
    fn from(value: [u8; N]) -> Self {
        Self::from(value.as_slice())
    }
}

impl<const N: usize> From<&[u8; N]> for Slice {
    fn from(value: &[u8; N]) -> Self {
        Self::from(value.as_slice())
    }
}

impl std::ops::Deref for Slice {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl std::borrow::Borrow<[u8]> for Slice {
    fn borrow(&self) -> &[u8] {
        self
    }
}

impl std::hash::Hash for Slice {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state);
    }
}

impl<T> PartialEq<T> for Slice
where
    T: AsRef<[u8]>,
{
    fn eq(&self, other: &T) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl<T> PartialOrd<T> for Slice
where
    T: AsRef<[u8]>,
{
    fn partial_cmp(&self, other: &T) -> Option<std::cmp::Ordering> {
        self.as_ref().partial_cmp(other.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::Slice;
    use test_log::test;

    #[test]
    fn slice_empty() {
        assert_eq!(Slice::empty(), []);
    }

    #[test]
    fn slice_fuse_two() {
        let bytes = Slice::fused(b"abc", b"def");
        assert_eq!(&*bytes, b"abcdef");
    }

    #[test]
    fn slice_roundtrips_from_vec() {
        let v = vec![1_u8, 2, 3, 4];
        let slice = Slice::from(v.clone());
        assert_eq!(slice, v);
    }

    #[test]
    fn slice_ordering_matches_bytes() {
        let a = Slice::from(b"abc".as_slice());
        let b = Slice::from(b"abd".as_slice());
        assert!(a < b);
    }
}
