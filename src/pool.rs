use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Pool of block-sized read buffers.
///
/// Each in-flight read borrows one buffer; dropping the guard returns it, so
/// buffers come back on every exit path including errors. Buffers keep their
/// full block length at all times.
pub(crate) struct BufferPool {
    size: usize,
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> PoolBuffer<'_> {
        let buffer = self
            .buffers
            .lock()
            .map(|mut bufs| bufs.pop())
            .unwrap_or(None)
            .unwrap_or_else(|| vec![0u8; self.size]);
        PoolBuffer {
            pool: self,
            buffer: Some(buffer),
        }
    }
}

pub(crate) struct PoolBuffer<'a> {
    pool: &'a BufferPool,
    buffer: Option<Vec<u8>>,
}

impl Deref for PoolBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_ref().unwrap()
    }
}

impl DerefMut for PoolBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut().unwrap()
    }
}

impl Drop for PoolBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Ok(mut bufs) = self.pool.buffers.lock() {
                bufs.push(buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_block_sized() {
        let pool = BufferPool::new(512);
        let buf = pool.get();
        assert_eq!(buf.len(), 512);
    }

    #[test]
    fn test_buffers_are_reused_after_drop() {
        let pool = BufferPool::new(256);
        {
            let mut buf = pool.get();
            buf[0] = 42;
        }
        assert_eq!(pool.buffers.lock().unwrap().len(), 1);
        let buf = pool.get();
        assert_eq!(buf.len(), 256);
        assert_eq!(pool.buffers.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_concurrent_gets_use_distinct_buffers() {
        let pool = BufferPool::new(256);
        let a = pool.get();
        let b = pool.get();
        assert_eq!(a.len(), 256);
        assert_eq!(b.len(), 256);
        drop(a);
        drop(b);
        assert_eq!(pool.buffers.lock().unwrap().len(), 2);
    }
}
