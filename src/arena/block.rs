//! Block management - large regions carved up by the bump cursor
//!
//! Blocks start at 4KB and double up to 1MB. A request larger than the
//! next block size gets a block of its own size.

use std::alloc::{alloc, dealloc, Layout};

pub(crate) const INITIAL_BLOCK_SIZE: usize = 4 * 1024;
pub(crate) const MAX_BLOCK_SIZE: usize = 1024 * 1024;
const BLOCK_ALIGN: usize = 16;

/// One heap region; never moves, freed only when the pool drops
pub(crate) struct Block {
    start: *mut u8,
    layout: Layout,
}

impl Block {
    fn new(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, BLOCK_ALIGN).ok()?;

        // SAFETY: layout has non-zero size (callers never ask for 0)
        let start = unsafe { alloc(layout) };
        if start.is_null() {
            return None;
        }

        Some(Self { start, layout })
    }

    #[inline]
    pub fn bounds(&self) -> (*mut u8, *mut u8) {
        // SAFETY: one-past-the-end of the same allocation
        unsafe { (self.start, self.start.add(self.layout.size())) }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: allocated in `Block::new` with this exact layout
        unsafe { dealloc(self.start, self.layout) }
    }
}

/// Append-only list of blocks with adaptive sizing
pub(crate) struct BlockPool {
    blocks: Vec<Block>,
    next_size: usize,
}

impl BlockPool {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            next_size: INITIAL_BLOCK_SIZE,
        }
    }

    /// Allocate a block of at least `min_size` bytes
    pub fn grow(&mut self, min_size: usize) -> Option<&Block> {
        let size = self.next_size.max(min_size.max(1));
        let block = Block::new(size)?;

        self.next_size = (self.next_size * 2).min(MAX_BLOCK_SIZE);
        self.blocks.push(block);
        self.blocks.last()
    }

    pub fn reserved(&self) -> usize {
        self.blocks.iter().map(Block::size).sum()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}
