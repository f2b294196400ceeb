//! Physical-memory access strategies.
//!
//! Rust code can only dereference virtual addresses. Whenever an allocator
//! needs to touch the memory it manages (writing slab bookkeeping nodes,
//! zero-filling a `kcalloc` region), the physical address goes through a
//! [`PhysMapper`] first. Two strategies live here:
//!
//! - [`LogicalMapper`] for the running kernel, where physical memory is
//!   visible at the fixed kernel-logical offset.
//! - [`SliceMapper`] for hosted tests and early bring-up, where a plain
//!   buffer stands in for a physical range.

use core::ptr::NonNull;
use kernel_addresses::PhysicalAddress;
use kernel_layout::memory::KERNEL_LOGICAL_BASE;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for a kernel whose logical window is live.
///
/// Every physical address the allocators manage is mapped at
/// `KERNEL_LOGICAL_BASE + pa`, so translation is one addition.
///
/// # Safety
/// The logical mapping must be present and cover the referenced physical
/// range; that is established by the paging layer at boot.
pub struct LogicalMapper;

impl PhysMapper for LogicalMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = (KERNEL_LOGICAL_BASE + pa.as_u32()) as usize as *mut T;
        // SAFETY: caller guarantees pa is valid and logically mapped.
        unsafe { &mut *va }
    }
}

/// [`PhysMapper`] over a host buffer standing in for physical memory.
///
/// Addresses in `[phys_base, phys_base + len)` translate to offsets into
/// the buffer. Used by hosted tests and by bring-up code that works on a
/// pre-mapped window.
pub struct SliceMapper {
    buf: NonNull<u8>,
    phys_base: u32,
    len: usize,
}

impl SliceMapper {
    /// Treat `len` bytes at `buf` as the physical range starting at
    /// `phys_base`.
    ///
    /// # Safety
    /// `buf` must be valid for reads and writes of `len` bytes for the
    /// lifetime of the mapper, and must not be accessed by other code
    /// while allocators own parts of the simulated range.
    #[must_use]
    pub const unsafe fn new(buf: NonNull<u8>, phys_base: u32, len: usize) -> Self {
        Self {
            buf,
            phys_base,
            len,
        }
    }
}

impl PhysMapper for SliceMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let off = (pa.as_u32() - self.phys_base) as usize;
        debug_assert!(off + size_of::<T>() <= self.len);
        // SAFETY: construction guarantees the buffer covers the range.
        unsafe { &mut *self.buf.as_ptr().add(off).cast::<T>() }
    }
}

// Safety: the mapper only carries the translation; exclusivity of the
// underlying memory is the constructor's contract.
unsafe impl Send for SliceMapper {}
unsafe impl Sync for SliceMapper {}

/// View `count` elements of `T` stored at the start of a managed region.
///
/// # Safety
/// The region must be exclusively owned by the caller and hold at least
/// `count * size_of::<T>()` initialized-or-about-to-be-initialized bytes.
pub(crate) unsafe fn nodes_in_region<'a, M: PhysMapper, T>(
    mapper: &M,
    region: PhysicalAddress,
    count: usize,
) -> &'a mut [T] {
    // SAFETY: forwarded to the caller.
    unsafe {
        let first: *mut T = mapper.phys_to_mut::<T>(region);
        core::slice::from_raw_parts_mut(first, count)
    }
}

/// Zero `len` bytes of physical memory through `mapper`.
pub(crate) fn zero_region<M: PhysMapper>(mapper: &M, pa: PhysicalAddress, len: usize) {
    // SAFETY: callers only zero regions they have just allocated.
    unsafe {
        let ptr: *mut u8 = mapper.phys_to_mut::<u8>(pa);
        core::ptr::write_bytes(ptr, 0, len);
    }
}
