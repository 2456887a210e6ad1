// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A free-list of reusable connection buffers, the same "claim a slot,
// return it later" shape as the slab-backed block pool this crate used
// for fixed-size shared-memory blocks — generalized here to growable
// `Vec<u8>` buffers since a connection's framing needs vary request to
// request instead of being one fixed block size.

/// Reusable buffer free-list. Buffers above `buf_init_size` capacity are
/// kept as-is on release rather than shrunk back down — a connection that
/// briefly needed a big buffer doesn't pay for reallocating one on its
/// next request.
pub struct BufferPool {
    free: Vec<Vec<u8>>,
    init_size: usize,
    poolsize: usize,
}

impl BufferPool {
    pub fn new(init_size: usize, poolsize: usize) -> Self {
        Self { free: Vec::with_capacity(poolsize), init_size, poolsize }
    }

    /// Take a buffer from the pool, or allocate a fresh one at the
    /// configured initial size.
    pub fn acquire(&mut self) -> Vec<u8> {
        self.free.pop().unwrap_or_else(|| Vec::with_capacity(self.init_size))
    }

    /// Return a buffer to the pool for reuse. Dropped instead of pooled
    /// once the free list reaches `poolsize`.
    pub fn release(&mut self, mut buf: Vec<u8>) {
        buf.clear();
        if self.free.len() < self.poolsize {
            self.free.push(buf);
        }
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_without_release_allocates_fresh() {
        let mut pool = BufferPool::new(64, 4);
        let buf = pool.acquire();
        assert!(buf.capacity() >= 64);
        assert!(buf.is_empty());
    }

    #[test]
    fn released_buffer_is_reused() {
        let mut pool = BufferPool::new(64, 4);
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"hello");
        pool.release(buf);
        assert_eq!(pool.len(), 1);
        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn pool_caps_retained_buffers_at_poolsize() {
        let mut pool = BufferPool::new(64, 1);
        pool.release(Vec::new());
        pool.release(Vec::new());
        assert_eq!(pool.len(), 1);
    }
}
