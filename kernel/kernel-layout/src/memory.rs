//! # Memory Layout
//!
//! The modelled machine uses classic 32-bit two-level paging: a page
//! directory of 1024 entries, each covering a 4 MiB region through a page
//! table of 1024 entries, each mapping one 4 KiB frame.

/// Size of a physical page frame in bytes, the allocation granularity of the
/// frame allocator.
pub const FRAME_SIZE: u32 = 4096;

/// Size of a slab in bytes, the allocation granularity of the slab allocator.
pub const SLAB_SIZE: u32 = 64;

/// Number of slabs that fit one frame.
pub const SLABS_PER_FRAME: u32 = FRAME_SIZE / SLAB_SIZE;

/// Number of entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Bytes of virtual address space covered by one page table (4 MiB).
pub const TABLE_SPAN: u32 = FRAME_SIZE * ENTRIES_PER_TABLE as u32;

/// Base of the kernel-logical region.
///
/// A logical address is `KERNEL_LOGICAL_BASE + physical`; the kernel's own
/// mappings all live at or above this offset. Mapping anything below it
/// through the kernel mapping paths is a hard error.
pub const KERNEL_LOGICAL_BASE: u32 = 0xC000_0000;

/// Directory slot reserved for the self-map.
///
/// The last directory entry points back at the directory's own frame, so
/// page-table entries become editable through ordinary logical addressing
/// once paging is live.
pub const SELF_MAP_SLOT: usize = ENTRIES_PER_TABLE - 1;

/// Default size of the boot-reserved low region.
///
/// Frames below this are never tracked by the frame bitmap. The exact value
/// is a [`BootInfo`](crate::boot::BootInfo) parameter; this is only the
/// default.
pub const DEFAULT_RESERVED_LOW: u32 = 2 * 1024 * 1024;

/// Bytes of one thread arena slot: a thread's stack plus its slot tag.
///
/// Must be a power of two so that masking a stack pointer down to the slot
/// boundary recovers the owning slot in one operation.
pub const THREAD_SLAB_SIZE: u32 = 16 * 1024;

/// Maximum number of threads a single process may hold.
pub const MAX_THREADS_PER_PROCESS: usize = 16;

/// Capacity of each per-process byte stream (stdin/stdout/stderr).
pub const STREAM_CAPACITY: usize = 512;

const _: () = {
    assert!(FRAME_SIZE.is_power_of_two());
    assert!(SLAB_SIZE.is_power_of_two());
    assert!(THREAD_SLAB_SIZE.is_power_of_two());
    assert!(THREAD_SLAB_SIZE % FRAME_SIZE == 0);
    assert!(DEFAULT_RESERVED_LOW % FRAME_SIZE == 0);
    assert!(KERNEL_LOGICAL_BASE % TABLE_SPAN == 0);
};
