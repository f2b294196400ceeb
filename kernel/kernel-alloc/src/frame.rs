//! Bitmap-based physical frame allocator.
//!
//! One bit per frame above the reserved boot region; `1` means allocated.
//! The bitmap is self-contained (no heap needed beneath it, there is no
//! allocator beneath it) and sized for the largest physical memory this
//! kernel manages.

use kernel_addresses::{FrameIndex, PhysicalAddress, align_up};
use kernel_layout::boot::BootInfo;
use kernel_layout::memory::FRAME_SIZE;
use kernel_sync::SpinLock;
use kernel_vmem::FrameAlloc;
use thiserror::Error;

/// Largest physical memory the fixed bitmap covers.
pub const MAX_MANAGED_BYTES: u32 = 512 * 1024 * 1024;

const MAX_FRAMES: usize = (MAX_MANAGED_BYTES / FRAME_SIZE) as usize;
const BITMAP_WORDS: usize = MAX_FRAMES / 64;

/// Failures of the frame layer.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum FrameAllocError {
    /// No run of `count` contiguous free frames exists.
    #[error("no run of {0} contiguous free frames")]
    Exhausted(usize),

    /// The address does not denote a managed, frame-aligned location.
    #[error("address {0} is not a managed frame base")]
    OutOfRange(PhysicalAddress),

    /// Some frame in the range was already free; nothing was cleared.
    #[error("free of a range that is not fully allocated (double free?)")]
    NotAllocated,

    /// Zero-length requests are a caller bug.
    #[error("frame count must be non-zero")]
    ZeroCount,
}

/// Physical frame allocator over a fixed bitmap.
///
/// # Invariants
/// - A bit is set iff some live allocation currently owns that frame:
///   [`used_frames`](Self::used_frames) equals the number of set bits at
///   all times.
/// - No merging or defragmentation happens; fragmentation persists until
///   frees happen to re-open contiguous runs.
pub struct FrameAllocator {
    bitmap: [u64; BITMAP_WORDS],
    /// Base address of frame index 0 (first frame above the reserved low
    /// region).
    base: PhysicalAddress,
    /// Frames actually managed; the tail of the bitmap stays unused when
    /// the machine has less memory than `MAX_MANAGED_BYTES`.
    frames: usize,
    used: usize,
}

impl FrameAllocator {
    /// Build the allocator from the boot handoff. All bounds derive from
    /// `boot`; frames below `boot.reserved_low` are never tracked.
    #[must_use]
    pub fn new(boot: &BootInfo) -> Self {
        let base = PhysicalAddress::new(align_up(boot.reserved_low, FRAME_SIZE));
        let frames = boot.managed_frames().min(MAX_FRAMES);
        log::info!("frame allocator: {frames} frames starting at {base}");
        Self {
            bitmap: [0; BITMAP_WORDS],
            base,
            frames,
            used: 0,
        }
    }

    /// Allocate `count` contiguous frames.
    ///
    /// First-fit: the lowest-addressed run of `count` clear bits wins.
    ///
    /// # Errors
    /// `Exhausted` when no such run exists. Reported, never a panic.
    pub fn allocate(&mut self, count: usize) -> Result<PhysicalAddress, FrameAllocError> {
        if count == 0 {
            return Err(FrameAllocError::ZeroCount);
        }
        if count > self.frames {
            return Err(FrameAllocError::Exhausted(count));
        }

        let mut run = 0usize;
        for i in 0..self.frames {
            if self.is_set(i) {
                run = 0;
                continue;
            }
            run += 1;
            if run == count {
                let start = i + 1 - count;
                for j in start..=i {
                    self.set(j);
                }
                self.used += count;
                return Ok(FrameIndex::new(start as u32).base_address(self.base));
            }
        }
        log::debug!("frame allocation of {count} frames exhausted ({} used)", self.used);
        Err(FrameAllocError::Exhausted(count))
    }

    /// Free `count` frames starting at `addr`.
    ///
    /// # Errors
    /// The whole range must currently be allocated; if any frame in it is
    /// already free the operation is rejected as a double-free/corruption
    /// error and nothing is cleared.
    pub fn free(&mut self, addr: PhysicalAddress, count: usize) -> Result<(), FrameAllocError> {
        if count == 0 {
            return Err(FrameAllocError::ZeroCount);
        }
        let index = FrameIndex::from_address(addr, self.base)
            .ok_or(FrameAllocError::OutOfRange(addr))?
            .as_usize();
        if index + count > self.frames {
            return Err(FrameAllocError::OutOfRange(addr));
        }

        // Validate first, mutate after: a partial free must not happen.
        for i in index..index + count {
            if !self.is_set(i) {
                return Err(FrameAllocError::NotAllocated);
            }
        }
        for i in index..index + count {
            self.clear(i);
        }
        self.used -= count;
        Ok(())
    }

    /// Number of frames currently allocated (equals the set-bit count).
    #[inline]
    #[must_use]
    pub const fn used_frames(&self) -> usize {
        self.used
    }

    /// Number of frames the allocator manages in total.
    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.frames
    }

    /// Base address of the first managed frame.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[inline]
    fn is_set(&self, i: usize) -> bool {
        self.bitmap[i / 64] & (1 << (i % 64)) != 0
    }

    #[inline]
    fn set(&mut self, i: usize) {
        self.bitmap[i / 64] |= 1 << (i % 64);
    }

    #[inline]
    fn clear(&mut self, i: usize) {
        self.bitmap[i / 64] &= !(1 << (i % 64));
    }
}

impl FrameAlloc for FrameAllocator {
    fn alloc_frame(&mut self) -> Option<PhysicalAddress> {
        self.allocate(1).ok()
    }
}

/// The frame allocator behind its single global lock.
///
/// All bitmap mutation happens under this one lock; it is the innermost
/// lock of the allocation stack and is the second acquisition on the
/// heap's fallback path (heap lock, then frame lock).
pub struct LockedFrameAllocator(SpinLock<FrameAllocator>);

impl LockedFrameAllocator {
    #[must_use]
    pub fn new(boot: &BootInfo) -> Self {
        Self(SpinLock::new(FrameAllocator::new(boot)))
    }

    /// See [`FrameAllocator::allocate`].
    pub fn allocate(&self, count: usize) -> Result<PhysicalAddress, FrameAllocError> {
        self.0.lock().allocate(count)
    }

    /// See [`FrameAllocator::free`].
    pub fn free(&self, addr: PhysicalAddress, count: usize) -> Result<(), FrameAllocError> {
        self.0.lock().free(addr, count)
    }

    #[must_use]
    pub fn used_frames(&self) -> usize {
        self.0.lock().used_frames()
    }

    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.0.lock().total_frames()
    }

    #[must_use]
    pub fn base(&self) -> PhysicalAddress {
        self.0.lock().base()
    }
}

impl FrameAlloc for LockedFrameAllocator {
    fn alloc_frame(&mut self) -> Option<PhysicalAddress> {
        self.allocate(1).ok()
    }
}

impl FrameAlloc for &LockedFrameAllocator {
    fn alloc_frame(&mut self) -> Option<PhysicalAddress> {
        self.allocate(1).ok()
    }
}
