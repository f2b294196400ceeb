//! # Kernel Core Wiring
//!
//! Bottom-up initialization of every subsystem and the handle that owns
//! them afterwards. The order is fixed by the dependency chain:
//!
//! 1. frame allocator over the boot-reported physical memory,
//! 2. slab allocator and heap on frames carved out of it,
//! 3. the boot address space (identity map, kernel image, self-map),
//!    with the slab region and thread arena mapped into the kernel
//!    window,
//! 4. the interrupt handler table,
//! 5. the thread arena, process table and scheduler, with the init
//!    process (pid 0) created last.
//!
//! Every subsystem is an explicitly owned field of [`Kernel`]; nothing
//! lives in a static. The embedder owns the [`PhysMapper`] and lends it
//! to the kernel, which is what lets the whole stack run hosted under a
//! buffer-backed mapper.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

use alloc::vec::Vec;
use kernel_addresses::{PhysicalAddress, VirtualAddress, align_up};
use kernel_alloc::{
    FrameAllocError, Heap, HeapError, LockedFrameAllocator, LockedHeap, SlabAllocator, SlabError,
};
use kernel_interrupts::{DispatchOutcome, Handler, InterruptError, LockedHandlerTable, TrapFrame};
use kernel_layout::boot::BootInfo;
use kernel_layout::memory::{FRAME_SIZE, THREAD_SLAB_SIZE};
use kernel_task::{
    ProcessId, ProcessSnapshot, ProcessTable, Scheduler, TaskError, ThreadArena, ThreadId,
};
use kernel_vmem::{AddressSpace, PagingError, PhysMapper};
use thiserror::Error;

/// Frames carved out for the slab region backing the kernel heap.
const SLAB_REGION_FRAMES: usize = 64;

/// Thread stack slots the arena holds.
const ARENA_SLOTS: usize = 16;

const FRAMES_PER_SLOT: usize = (THREAD_SLAB_SIZE / FRAME_SIZE) as usize;

/// Vector the timer interrupt arrives on after PIC remapping.
pub const TIMER_VECTOR: u32 = 0x20;

/// Anything that can go wrong during bring-up or at a kernel entry point.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error(transparent)]
    Frame(#[from] FrameAllocError),

    #[error(transparent)]
    Slab(#[from] SlabError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Paging(#[from] PagingError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Interrupt(#[from] InterruptError),
}

/// Owner of every kernel subsystem.
pub struct Kernel<'m, M: PhysMapper> {
    mapper: &'m M,
    frames: LockedFrameAllocator,
    heap: LockedHeap,
    /// Directory frame of the boot address space.
    root: PhysicalAddress,
    interrupts: LockedHandlerTable,
    arena: ThreadArena,
    table: ProcessTable,
    sched: Scheduler,
}

impl<'m, M: PhysMapper> Kernel<'m, M> {
    /// Bring the kernel up from the boot handoff.
    ///
    /// `init_entry` is the entry point of the init process's main thread;
    /// init receives pid 0.
    ///
    /// # Errors
    /// A frame allocation failure during bring-up is unrecoverable; it
    /// propagates here so the boot path can halt with a message instead
    /// of limping on.
    pub fn init(
        mapper: &'m M,
        boot: BootInfo,
        init_entry: VirtualAddress,
    ) -> Result<Self, KernelError> {
        let frames = LockedFrameAllocator::new(&boot);
        log::info!("init: frame allocator up, {} frames", frames.total_frames());

        let slab_region = frames.allocate(SLAB_REGION_FRAMES)?;
        let slab = SlabAllocator::init(
            mapper,
            slab_region,
            SLAB_REGION_FRAMES * FRAME_SIZE as usize,
        )?;
        let heap = LockedHeap::new(Heap::new(slab));
        log::info!("init: heap up, {} bytes free", heap.free_bytes());

        // Arena backing: whole frames, with one spare slot's worth so the
        // base can be rounded up to the slot size. The stack-pointer mask
        // only works when slots are size-aligned.
        let arena_region = frames.allocate((ARENA_SLOTS + 1) * FRAMES_PER_SLOT)?;
        let arena_base = PhysicalAddress::new(align_up(arena_region.as_u32(), THREAD_SLAB_SIZE));

        let mut alloc = &frames;
        let mut space = AddressSpace::create(mapper, &mut alloc, &boot)?;
        for i in 0..SLAB_REGION_FRAMES {
            space.map_kernel_logical(&mut alloc, slab_region + (i as u32) * FRAME_SIZE)?;
        }
        for i in 0..ARENA_SLOTS * FRAMES_PER_SLOT {
            space.map_kernel_logical(&mut alloc, arena_base + (i as u32) * FRAME_SIZE)?;
        }
        let arena_va = arena_base
            .to_logical()
            .ok_or(PagingError::NoLogicalAlias(arena_base))?;
        let root = space.root();
        log::info!("init: boot address space rooted at {root}");

        let interrupts = LockedHandlerTable::new();
        let mut arena = ThreadArena::new(arena_va, ARENA_SLOTS)?;
        let mut table = ProcessTable::new();
        let mut sched = Scheduler::new();
        let init_pid = table.create_process(&mut arena, &mut sched, "init", init_entry, 0)?;
        debug_assert_eq!(init_pid, ProcessId::INIT);
        log::info!("init: process table up, init is {init_pid}");

        Ok(Self {
            mapper,
            frames,
            heap,
            root,
            interrupts,
            arena,
            table,
            sched,
        })
    }

    /// Create a process with its main thread at `entry`.
    ///
    /// # Errors
    /// See [`ProcessTable::create_process`].
    pub fn spawn_process(
        &mut self,
        name: &str,
        entry: VirtualAddress,
        arg: u32,
    ) -> Result<ProcessId, KernelError> {
        Ok(self
            .table
            .create_process(&mut self.arena, &mut self.sched, name, entry, arg)?)
    }

    /// Create an additional thread in `pid`.
    ///
    /// # Errors
    /// See [`ProcessTable::create_thread`].
    pub fn spawn_thread(
        &mut self,
        pid: ProcessId,
        priority: u8,
        name: &str,
        entry: VirtualAddress,
        arg: u32,
    ) -> Result<ThreadId, KernelError> {
        Ok(self.table.create_thread(
            &mut self.arena,
            &mut self.sched,
            pid,
            priority,
            name,
            entry,
            arg,
        )?)
    }

    /// Terminate the calling thread.
    ///
    /// # Errors
    /// See [`ProcessTable::exit`].
    pub fn exit(&mut self, tid: ThreadId, code: i32) -> Result<(), KernelError> {
        Ok(self.table.exit(&mut self.arena, &mut self.sched, tid, code)?)
    }

    /// Force-terminate a process; returns the live threads remaining.
    ///
    /// # Errors
    /// See [`ProcessTable::kill`].
    pub fn kill(
        &mut self,
        pid: ProcessId,
        caller: Option<ThreadId>,
    ) -> Result<usize, KernelError> {
        Ok(self.table.kill(&mut self.arena, &mut self.sched, pid, caller)?)
    }

    /// Block `caller` until `pid` is notified or exits.
    ///
    /// # Errors
    /// See [`ProcessTable::wait`].
    pub fn wait(&mut self, pid: ProcessId, caller: ThreadId) -> Result<(), KernelError> {
        Ok(self.table.wait(&mut self.sched, pid, caller)?)
    }

    /// Wake one waiter of `pid` (or all) with `code`.
    ///
    /// # Errors
    /// See [`ProcessTable::notify`].
    pub fn notify(&mut self, pid: ProcessId, all: bool, code: i32) -> Result<usize, KernelError> {
        Ok(self.table.notify(&mut self.sched, pid, all, code)?)
    }

    /// Pick the next thread to run; the embedder switches to it.
    ///
    /// # Errors
    /// Scheduler bookkeeping corruption propagates as a task error.
    pub fn schedule(&mut self) -> Result<Option<ThreadId>, KernelError> {
        Ok(self.sched.pick_next(&mut self.table)?)
    }

    /// Deliver a trap.
    ///
    /// The timer vector drives the scheduler's tick accounting directly;
    /// everything else goes through the registered handler table. An
    /// `Unhandled` outcome on an exception vector means the embedder must
    /// halt (fail-stop, no partial degradation).
    pub fn on_interrupt(&mut self, frame: &mut TrapFrame) -> DispatchOutcome {
        if frame.vector == TIMER_VECTOR {
            self.sched.tick(&mut self.table);
            return DispatchOutcome::Handled;
        }
        self.interrupts.dispatch(frame)
    }

    /// Register a handler for an interrupt vector.
    ///
    /// # Errors
    /// See [`LockedHandlerTable::register`].
    pub fn register_handler(&self, vector: u8, handler: Handler) -> Result<(), KernelError> {
        Ok(self.interrupts.register(vector, handler)?)
    }

    /// Allocate `size` bytes from the kernel heap.
    ///
    /// # Errors
    /// See [`LockedHeap::kmalloc`].
    pub fn kmalloc(&self, size: usize) -> Result<VirtualAddress, HeapError> {
        self.heap.kmalloc(self.mapper, &self.frames, size)
    }

    /// Allocate and zero `count * size` bytes.
    ///
    /// # Errors
    /// See [`LockedHeap::kcalloc`].
    pub fn kcalloc(&self, count: usize, size: usize) -> Result<VirtualAddress, HeapError> {
        self.heap.kcalloc(self.mapper, &self.frames, count, size)
    }

    /// Release a heap allocation.
    ///
    /// # Errors
    /// See [`LockedHeap::kfree`].
    pub fn kfree(&self, va: VirtualAddress) -> Result<(), HeapError> {
        self.heap.kfree(self.mapper, &self.frames, va)
    }

    /// Read-only diagnostics traversal of the process table.
    #[must_use]
    pub fn processes(&self) -> Vec<ProcessSnapshot> {
        self.table.snapshot()
    }

    /// The thread whose stack contains `sp`.
    #[must_use]
    pub fn current_thread(&self, sp: VirtualAddress) -> Option<ThreadId> {
        self.arena.current(sp)
    }

    /// Borrow one process, read-only.
    #[must_use]
    pub fn process(&self, pid: ProcessId) -> Option<&kernel_task::Process> {
        self.table.process(pid)
    }

    /// View of the boot address space.
    #[must_use]
    pub fn address_space(&self) -> AddressSpace<'_, M> {
        AddressSpace::from_root(self.mapper, self.root)
    }

    #[must_use]
    pub fn frames(&self) -> &LockedFrameAllocator {
        &self.frames
    }

    #[must_use]
    pub fn heap(&self) -> &LockedHeap {
        &self.heap
    }

    /// Split borrow for code that drives the tasking layer directly,
    /// such as semaphore call sites.
    pub fn tasking_mut(&mut self) -> (&mut ProcessTable, &mut Scheduler, &mut ThreadArena) {
        (&mut self.table, &mut self.sched, &mut self.arena)
    }
}
