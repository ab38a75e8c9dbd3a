use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::Result;

/// Pluggable result cache consulted by `Reader::find`.
///
/// The cache memoizes whole query results, including misses; it does not
/// alter correctness and the core works without one.
pub trait Cache: Send + Sync {
    /// Either return the cached value for `key` or run `compute`, store its
    /// result, and return it. The second element is true when the value was
    /// already present.
    fn get_or_compute(
        &self,
        key: &[u8],
        compute: &mut dyn FnMut() -> Result<Option<Vec<u8>>>,
    ) -> Result<(Option<Vec<u8>>, bool)>;

    /// Called once a freshly computed value has been stored; implementations
    /// can use it to trim older entries.
    fn stored(&self, _key: &[u8]) {}
}

/// Bounded map cache: keeps the most recent `max` query results, evicting in
/// insertion order.
pub struct CacheMap {
    max: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    entries: HashMap<Vec<u8>, Option<Vec<u8>>>,
    order: VecDeque<Vec<u8>>,
}

impl CacheMap {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for CacheMap {
    fn get_or_compute(
        &self,
        key: &[u8],
        compute: &mut dyn FnMut() -> Result<Option<Vec<u8>>>,
    ) -> Result<(Option<Vec<u8>>, bool)> {
        let mut inner = self.inner.lock()?;
        if let Some(value) = inner.entries.get(key) {
            return Ok((value.clone(), true));
        }

        let value = compute()?;
        inner.entries.insert(key.to_vec(), value.clone());
        inner.order.push_back(key.to_vec());
        if inner.order.len() > self.max {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        Ok((value, false))
    }
}
