//! Bump cursor over the current block
//!
//! Tracks an offset into the block rather than a raw end pointer, so an
//! empty cursor is simply one with no base.

use core::ptr::NonNull;

pub(crate) struct BumpCursor {
    base: Option<NonNull<u8>>,
    offset: usize,
    limit: usize,
}

impl BumpCursor {
    #[inline]
    pub const fn new() -> Self {
        Self {
            base: None,
            offset: 0,
            limit: 0,
        }
    }

    /// Carve `size` bytes at `align` from the current block, if they fit
    #[inline(always)]
    pub fn try_alloc(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        debug_assert!(align.is_power_of_two(), "alignment must be power of 2");

        let base = self.base?;
        let addr = base.as_ptr() as usize;

        // Pad relative to the absolute address; the block itself is only 16-aligned
        let start = align_up(addr.checked_add(self.offset)?, align) - addr;
        let end = start.checked_add(size)?;
        if end > self.limit {
            return None;
        }

        self.offset = end;
        // SAFETY: `start <= limit`, inside the block `base` points at
        Some(unsafe { NonNull::new_unchecked(base.as_ptr().add(start)) })
    }

    /// Point the cursor at a fresh block spanning `start..end`
    #[inline]
    pub fn reset(&mut self, start: *mut u8, end: *mut u8) {
        debug_assert!(start <= end, "invalid block bounds");
        self.base = NonNull::new(start);
        self.offset = 0;
        self.limit = (end as usize).saturating_sub(start as usize);
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.offset
    }
}

#[inline(always)]
pub(crate) const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}
