//! Arena scope - backing store for transient native buffers
//!
//! Outbound C strings and out-parameter slots are carved from here and are
//! never freed individually: a native call may keep a pointer it was given
//! after it returns, so per-call freeing is unsound. Memory grows with the
//! number of strings marshalled and is reclaimed only when the scope drops
//! (for the process-wide runtime, at exit).
//!
//! Allocation is a bump pointer under a short `parking_lot` critical
//! section. Blocks never move, so addresses stay valid for the scope's life.

mod block;
mod bump;


use block::BlockPool;
use bump::BumpCursor;
use core::ptr::NonNull;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

struct ArenaInner {
    cursor: BumpCursor,
    pool: BlockPool,
}

// SAFETY: the raw pointers only name blocks owned by `pool`; all access is
// serialized by the enclosing mutex.
unsafe impl Send for ArenaInner {}

/// Process-scoped, append-only allocation region
pub struct ArenaScope {
    inner: Mutex<ArenaInner>,
    allocations: AtomicUsize,
    bytes_requested: AtomicUsize,
}

impl ArenaScope {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ArenaInner {
                cursor: BumpCursor::new(),
                pool: BlockPool::new(),
            }),
            allocations: AtomicUsize::new(0),
            bytes_requested: AtomicUsize::new(0),
        }
    }

    /// Allocate `size` bytes aligned to `align`
    ///
    /// Returns None only if the system allocator fails or `align` is not a
    /// power of two.
    pub fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if !align.is_power_of_two() {
            return None;
        }

        let mut inner = self.inner.lock();

        let ptr = match inner.cursor.try_alloc(size, align) {
            Some(ptr) => ptr,
            None => Self::alloc_slow(&mut inner, size, align)?,
        };

        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_requested.fetch_add(size, Ordering::Relaxed);
        Some(ptr)
    }

    #[cold]
    fn alloc_slow(inner: &mut ArenaInner, size: usize, align: usize) -> Option<NonNull<u8>> {
        let block = inner.pool.grow(size.checked_add(align)?)?;
        let (start, end) = block.bounds();
        let block_size = block.size();

        inner.cursor.reset(start, end);

        debug!(
            event = "arena_grow",
            block_bytes = block_size,
            blocks = inner.pool.len(),
            reserved_bytes = inner.pool.reserved(),
            "arena acquired a new block"
        );

        inner.cursor.try_alloc(size, align)
    }

    pub fn stats(&self) -> ArenaStats {
        let inner = self.inner.lock();
        ArenaStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            bytes_requested: self.bytes_requested.load(Ordering::Relaxed),
            bytes_reserved: inner.pool.reserved(),
            blocks: inner.pool.len(),
            current_block_remaining: inner.cursor.remaining(),
        }
    }
}

impl Default for ArenaScope {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ArenaScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArenaScope").field("stats", &self.stats()).finish()
    }
}

/// Arena statistics for monitoring growth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub allocations: usize,
    pub bytes_requested: usize,
    pub bytes_reserved: usize,
    pub blocks: usize,
    pub current_block_remaining: usize,
}
