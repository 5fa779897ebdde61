// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::key::MAX_KEY_LEN;

/// Item cache configuration builder.
///
/// Much smaller than a full storage-engine config because this crate has no
/// on-disk path, compression, or level geometry to configure — only the one
/// tunable the design calls out explicitly.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Upper bound on a single key's length. Keys longer than this are
    /// rejected with [`crate::Error::Invalid`].
    pub max_key_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_key_len: MAX_KEY_LEN,
        }
    }
}

impl CacheConfig {
    /// Creates a config with the default key length ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the maximum accepted key length.
    #[must_use]
    pub fn max_key_len(mut self, max_key_len: usize) -> Self {
        self.max_key_len = max_key_len;
        self
    }
}
