//! Query-to-block locators.
//!
//! Both locators answer the same question: given a query, which block would
//! hold its match? The answer is a candidate block index plus whether the
//! block's first record already settles the lookup. The byte trie resolves
//! prefix paths without touching the index array; the binary search walks the
//! per-block first records directly.

mod binary;
mod tree;

pub use binary::{locate as binary_locate, Buckets};
pub use tree::SearchTree;

/// Outcome of a locator probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// Candidate block index.
    pub pos: usize,
    /// True when the indexed first record of `pos` is itself the answer.
    pub exact: bool,
}
