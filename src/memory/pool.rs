/*!
 * User Page Pool
 * Bounded supply of physical frames for page directories, segments and stacks
 */

use super::types::{MemoryError, MemoryResult, PoolStats};
use crate::core::limits::PAGE_SIZE;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
struct PoolInner {
    total: usize,
    used: AtomicUsize,
}

/// Bounded frame allocator
///
/// Cloning shares the same pool. Frames give their slot back when dropped, so
/// destroying an address space is what returns its memory.
#[derive(Debug, Clone)]
pub struct PagePool {
    inner: Arc<PoolInner>,
}

impl PagePool {
    /// Create a pool holding `total` frames
    pub fn new(total: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                total,
                used: AtomicUsize::new(0),
            }),
        }
    }

    /// Take one zeroed frame from the pool
    pub fn get_page(&self) -> MemoryResult<Frame> {
        // Reserve first, revert if that overshot the pool
        let used = self.inner.used.fetch_add(1, Ordering::SeqCst);
        if used >= self.inner.total {
            self.inner.used.fetch_sub(1, Ordering::SeqCst);
            warn!(total = self.inner.total, "User page pool exhausted");
            return Err(MemoryError::OutOfPages {
                total: self.inner.total,
            });
        }

        Ok(Frame {
            data: Box::new([0u8; PAGE_SIZE]),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Frames currently handed out
    pub fn in_use(&self) -> usize {
        self.inner.used.load(Ordering::SeqCst)
    }

    /// Frames still available
    pub fn available(&self) -> usize {
        self.inner.total.saturating_sub(self.in_use())
    }

    pub fn stats(&self) -> PoolStats {
        let used = self.in_use();
        PoolStats {
            total_pages: self.inner.total,
            used_pages: used,
            available_pages: self.inner.total.saturating_sub(used),
        }
    }
}

/// One physical page owned by whoever holds it
pub struct Frame {
    data: Box<[u8; PAGE_SIZE]>,
    pool: Arc<PoolInner>,
}

impl Frame {
    pub fn bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").finish_non_exhaustive()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.pool.used.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_return_on_drop() {
        let pool = PagePool::new(2);
        let a = pool.get_page().unwrap();
        let b = pool.get_page().unwrap();
        assert_eq!(pool.in_use(), 2);
        assert_eq!(
            pool.get_page().unwrap_err(),
            MemoryError::OutOfPages { total: 2 }
        );

        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.stats().used_pages, 0);
    }

    #[test]
    fn test_frames_are_zeroed() {
        let pool = PagePool::new(1);
        let mut frame = pool.get_page().unwrap();
        frame.bytes_mut()[10] = 0xAA;
        drop(frame);

        let frame = pool.get_page().unwrap();
        assert!(frame.bytes().iter().all(|&b| b == 0));
    }
}
