//! The kmalloc/kcalloc/kfree bookkeeping layer over the slab allocator.
//!
//! Byte requests are rounded to whole slabs plus one bookkeeping slab;
//! every slab-backed success is recorded as `{address, size-in-slabs}` so
//! `kfree` can reclaim without a size argument. Requests too large for the
//! slab allocator's free-byte counter bypass it entirely and are served as
//! whole frames, coarser but always available as a fallback.

use crate::frame::{FrameAllocError, LockedFrameAllocator};
use crate::hhdm::zero_region;
use crate::slab::{SlabAllocator, SlabError};
use kernel_addresses::{PhysicalAddress, VirtualAddress};
use kernel_layout::memory::{FRAME_SIZE, SLAB_SIZE};
use kernel_sync::SpinLock;
use kernel_vmem::PhysMapper;
use thiserror::Error;

/// Slabs reserved per allocation for its bookkeeping record.
const RECORD_SLABS: usize = 1;

/// Capacity of the live-allocation record table.
const MAX_RECORDS: usize = 512;

/// Capacity of the frame-fallback record table.
const MAX_FRAME_RECORDS: usize = 64;

/// Failures of the heap layer.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Zero-byte requests are a caller bug.
    #[error("allocation size must be non-zero")]
    ZeroSize,

    /// `count * size` overflowed.
    #[error("allocation size overflows")]
    Overflow,

    /// The record table is full; the allocation was rolled back.
    #[error("too many live allocations")]
    TooManyAllocations,

    /// The address is not a kernel-logical address.
    #[error("address {0} is not a kernel-logical address")]
    BadAddress(VirtualAddress),

    /// The allocated memory lies beyond the logical window.
    #[error("allocation at {0} has no kernel-logical alias")]
    NoLogicalAlias(PhysicalAddress),

    #[error(transparent)]
    Slab(#[from] SlabError),

    #[error(transparent)]
    Frame(#[from] FrameAllocError),
}

#[derive(Copy, Clone)]
struct AllocationRecord {
    addr: PhysicalAddress,
    slabs: usize,
}

#[derive(Copy, Clone)]
struct FrameRecord {
    addr: PhysicalAddress,
    frames: usize,
}

/// Heap state: the slab allocator plus the allocation records.
///
/// # Invariants
/// - Every address returned by a slab-backed `kmalloc` has exactly one
///   record until freed.
/// - `kfree` of an address with no record is treated as a frame-fallback
///   allocation and forwarded to the frame allocator, whose own guard
///   rejects stray addresses.
pub struct Heap {
    slab: SlabAllocator,
    records: [Option<AllocationRecord>; MAX_RECORDS],
    frame_records: [Option<FrameRecord>; MAX_FRAME_RECORDS],
}

impl Heap {
    #[must_use]
    pub const fn new(slab: SlabAllocator) -> Self {
        Self {
            slab,
            records: [None; MAX_RECORDS],
            frame_records: [None; MAX_FRAME_RECORDS],
        }
    }

    /// Allocate `size` bytes and return the kernel-logical address.
    ///
    /// # Errors
    /// Exhaustion of the chosen backing path propagates; it is never
    /// retried here.
    pub fn kmalloc<M: PhysMapper>(
        &mut self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        size: usize,
    ) -> Result<VirtualAddress, HeapError> {
        self.alloc_inner(mapper, frames, size).map(|(va, _)| va)
    }

    /// Allocate and return the logical address plus the backing length in
    /// bytes (the rounded length, not the requested one).
    fn alloc_inner<M: PhysMapper>(
        &mut self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        size: usize,
    ) -> Result<(VirtualAddress, usize), HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }

        // A request the slab allocator cannot possibly satisfy goes
        // straight to whole frames. The comparison uses the requested size
        // alone, by contract.
        if size > self.slab.free_mem_size() {
            return self.frame_fallback(frames, size);
        }

        let slabs = size.div_ceil(SLAB_SIZE as usize) + RECORD_SLABS;
        let addr = self.slab.alloc(mapper, slabs)?;

        let Some(slot) = self.records.iter_mut().find(|r| r.is_none()) else {
            // Roll back; the caller sees a clean failure.
            self.slab.free(mapper, addr, slabs)?;
            return Err(HeapError::TooManyAllocations);
        };
        *slot = Some(AllocationRecord { addr, slabs });

        let va = addr.to_logical().ok_or(HeapError::NoLogicalAlias(addr))?;
        Ok((va, (slabs - RECORD_SLABS) * SLAB_SIZE as usize))
    }

    /// Allocate and zero `count * size` bytes.
    ///
    /// The zero-fill covers exactly the rounded backing length, not just
    /// the requested bytes.
    pub fn kcalloc<M: PhysMapper>(
        &mut self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        count: usize,
        size: usize,
    ) -> Result<VirtualAddress, HeapError> {
        let total = count.checked_mul(size).ok_or(HeapError::Overflow)?;
        let (va, len) = self.alloc_inner(mapper, frames, total)?;
        let pa = va.from_logical().ok_or(HeapError::BadAddress(va))?;
        zero_region(mapper, pa, len);
        Ok(va)
    }

    /// Release an allocation.
    ///
    /// Slab-backed addresses are found in the record list and returned to
    /// the slab allocator; anything else is assumed to have come from the
    /// frame-fallback path and is forwarded to the frame allocator's free,
    /// whose corruption guard rejects addresses that were never allocated.
    pub fn kfree<M: PhysMapper>(
        &mut self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        va: VirtualAddress,
    ) -> Result<(), HeapError> {
        let pa = va.from_logical().ok_or(HeapError::BadAddress(va))?;

        let slab_rec = self
            .records
            .iter_mut()
            .find(|r| matches!(r, Some(rec) if rec.addr == pa))
            .and_then(Option::take);
        if let Some(rec) = slab_rec {
            self.slab.free(mapper, rec.addr, rec.slabs)?;
            return Ok(());
        }

        let frame_rec = self
            .frame_records
            .iter_mut()
            .find(|r| matches!(r, Some(rec) if rec.addr == pa))
            .and_then(Option::take);
        if let Some(rec) = frame_rec {
            frames.free(rec.addr, rec.frames)?;
            return Ok(());
        }

        // No record anywhere: assume a raw frame allocation.
        frames.free(pa, 1)?;
        Ok(())
    }

    /// Total free bytes in the slab region.
    #[inline]
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.slab.free_mem_size()
    }

    /// Number of live slab-backed allocations.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    fn frame_fallback(
        &mut self,
        frames: &LockedFrameAllocator,
        size: usize,
    ) -> Result<(VirtualAddress, usize), HeapError> {
        let count = size.div_ceil(FRAME_SIZE as usize);
        let addr = frames.allocate(count)?;

        let Some(slot) = self.frame_records.iter_mut().find(|r| r.is_none()) else {
            frames.free(addr, count)?;
            return Err(HeapError::TooManyAllocations);
        };
        *slot = Some(FrameRecord {
            addr,
            frames: count,
        });
        log::debug!("kmalloc of {size} bytes served as {count} whole frames at {addr}");

        let va = addr.to_logical().ok_or(HeapError::NoLogicalAlias(addr))?;
        Ok((va, count * FRAME_SIZE as usize))
    }
}

/// The heap behind its dedicated lock.
///
/// Distinct from the frame allocator's lock: a heap operation that falls
/// through to frame allocation acquires the frame lock *while holding*
/// this one. That order (heap, then frame) is fixed globally; taking
/// them the other way around deadlocks.
pub struct LockedHeap(SpinLock<Heap>);

impl LockedHeap {
    #[must_use]
    pub const fn new(heap: Heap) -> Self {
        Self(SpinLock::new(heap))
    }

    /// See [`Heap::kmalloc`].
    pub fn kmalloc<M: PhysMapper>(
        &self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        size: usize,
    ) -> Result<VirtualAddress, HeapError> {
        self.0.lock().kmalloc(mapper, frames, size)
    }

    /// See [`Heap::kcalloc`].
    pub fn kcalloc<M: PhysMapper>(
        &self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        count: usize,
        size: usize,
    ) -> Result<VirtualAddress, HeapError> {
        self.0.lock().kcalloc(mapper, frames, count, size)
    }

    /// See [`Heap::kfree`].
    pub fn kfree<M: PhysMapper>(
        &self,
        mapper: &M,
        frames: &LockedFrameAllocator,
        va: VirtualAddress,
    ) -> Result<(), HeapError> {
        self.0.lock().kfree(mapper, frames, va)
    }

    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.0.lock().free_bytes()
    }

    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.0.lock().live_allocations()
    }
}
