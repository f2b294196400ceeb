//! The thread stack arena.
//!
//! Each thread owns one fixed-size slot of
//! [`THREAD_SLAB_SIZE`] bytes holding its stack. Because slots are
//! size-aligned, the running thread is recovered from the stack pointer
//! with one mask and one table lookup:
//!
//! ```text
//! slot base  = sp & !(THREAD_SLAB_SIZE - 1)
//! slot index = (slot base - arena base) / THREAD_SLAB_SIZE
//! ```
//!
//! The arena only tracks ownership; the backing memory is allocated by
//! the embedder (whole frames mapped into the kernel window) and handed
//! over at construction.

use crate::error::TaskError;
use crate::thread::ThreadId;
use kernel_addresses::VirtualAddress;
use kernel_layout::memory::THREAD_SLAB_SIZE;

/// Upper bound on arena slots, sized for the fixed owner table.
pub const MAX_ARENA_SLOTS: usize = 64;

/// Ownership map of the thread stack slots.
#[derive(Debug)]
pub struct ThreadArena {
    base: VirtualAddress,
    slots: usize,
    owners: [Option<ThreadId>; MAX_ARENA_SLOTS],
}

impl ThreadArena {
    /// Manage `slots` stack slots starting at `base`.
    ///
    /// # Errors
    /// `base` must be aligned to the slot size or the stack-pointer mask
    /// would cross slot boundaries.
    pub fn new(base: VirtualAddress, slots: usize) -> Result<Self, TaskError> {
        if base.as_u32() % THREAD_SLAB_SIZE != 0 || slots > MAX_ARENA_SLOTS {
            return Err(TaskError::ArenaMisaligned);
        }
        Ok(Self {
            base,
            slots,
            owners: [None; MAX_ARENA_SLOTS],
        })
    }

    /// Claim the first free slot for `tid`.
    ///
    /// # Errors
    /// `ArenaExhausted` when every slot is owned.
    pub fn allocate_slot(&mut self, tid: ThreadId) -> Result<usize, TaskError> {
        let slot = self.owners[..self.slots]
            .iter()
            .position(Option::is_none)
            .ok_or(TaskError::ArenaExhausted)?;
        self.owners[slot] = Some(tid);
        Ok(slot)
    }

    /// Release `slot` after its thread terminated.
    pub fn release_slot(&mut self, slot: usize) {
        if slot < self.slots {
            self.owners[slot] = None;
        }
    }

    /// The thread whose stack contains `sp`, if any.
    ///
    /// This is the O(1) current-thread lookup: mask the stack pointer to
    /// its slot boundary and read the owner table.
    #[must_use]
    pub fn current(&self, sp: VirtualAddress) -> Option<ThreadId> {
        let slot_base = sp.as_u32() & !(THREAD_SLAB_SIZE - 1);
        let offset = slot_base.checked_sub(self.base.as_u32())?;
        let slot = (offset / THREAD_SLAB_SIZE) as usize;
        if slot >= self.slots {
            return None;
        }
        self.owners[slot]
    }

    /// Initial stack pointer for `slot` (stacks grow downwards).
    #[must_use]
    pub const fn stack_top(&self, slot: usize) -> VirtualAddress {
        VirtualAddress::new(self.base.as_u32() + (slot as u32 + 1) * THREAD_SLAB_SIZE)
    }

    /// Slots currently owned by a thread.
    #[must_use]
    pub fn used_slots(&self) -> usize {
        self.owners[..self.slots].iter().flatten().count()
    }
}
