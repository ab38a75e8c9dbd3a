use std::sync::Arc;

use crate::cache::Cache;
use crate::error::Result;
use crate::Error;

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Smallest supported block size. A block must be able to hold one maximum
/// length record plus its length byte.
pub const MIN_BLOCK_SIZE: usize = 256;

/// Which in-memory structure maps a query to a candidate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Binary search over the per-block first records, narrowed by
    /// first-byte buckets.
    BinarySearch,
    /// 256-ary byte trie over block-prefix paths.
    Trie,
}

/// Configuration for a WormDB database.
#[derive(Clone)]
pub struct Options {
    /// Block size in bytes (power of two, at least 256; default 4096).
    pub block_size: usize,

    /// Byte offset of the database region inside the backing file; must be a
    /// multiple of the block size (default 0).
    pub offset: u64,

    /// Locator used to resolve queries (default binary search).
    pub locator: Locator,

    /// Optional result cache consulted by `find`.
    pub cache: Option<Arc<dyn Cache>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            offset: 0,
            locator: Locator::BinarySearch,
            cache: None,
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("block_size", &self.block_size)
            .field("offset", &self.offset)
            .field("locator", &self.locator)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Set the byte offset of the database region.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Choose the locator structure.
    pub fn locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    /// Attach a result cache.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check the block size and offset constraints.
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE || !self.block_size.is_power_of_two() {
            return Err(Error::Config(format!(
                "block size {} must be a power of two >= {}",
                self.block_size, MIN_BLOCK_SIZE
            )));
        }
        if self.offset % self.block_size as u64 != 0 {
            return Err(Error::Config(format!(
                "offset {} must be a multiple of block size {}",
                self.offset, self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(opts.offset, 0);
        assert_eq!(opts.locator, Locator::BinarySearch);
        assert!(opts.cache.is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new()
            .block_size(65536)
            .offset(65536 * 4)
            .locator(Locator::Trie);
        assert_eq!(opts.block_size, 65536);
        assert_eq!(opts.offset, 65536 * 4);
        assert_eq!(opts.locator, Locator::Trie);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_block_size() {
        assert!(Options::new().block_size(100).validate().is_err());
        assert!(Options::new().block_size(3000).validate().is_err());
        assert!(Options::new().block_size(0).validate().is_err());
        for size in [256, 512, 4096, 65536] {
            assert!(Options::new().block_size(size).validate().is_ok());
        }
    }

    #[test]
    fn test_rejects_unaligned_offset() {
        assert!(Options::new().block_size(512).offset(100).validate().is_err());
        assert!(Options::new().block_size(512).offset(1024).validate().is_ok());
    }
}
