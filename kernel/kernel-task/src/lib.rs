//! # Processes, Threads and Scheduling
//!
//! A process is a static container of up to
//! [`MAX_THREADS_PER_PROCESS`](kernel_layout::memory::MAX_THREADS_PER_PROCESS)
//! threads; a thread is the schedulable unit. Thread stacks live in a
//! [`ThreadArena`] of fixed-size slots, and the running thread is found by
//! masking the stack pointer to its slot boundary (one mask, one table
//! lookup, no pointer chasing).
//!
//! All state is explicitly owned: the [`ProcessTable`], [`Scheduler`] and
//! [`ThreadArena`] are created by the embedder and passed by reference
//! into every operation that needs them. There are no hidden statics and
//! no ambient "current process" pointer.
//!
//! Blocking is split in half. The decision side (wait queues, state
//! transitions, ready-queue bookkeeping) lives here and runs under locks;
//! the actual context switch is an architecture seam the embedder drives
//! after the decision returns. That split is what makes every operation
//! in this crate testable on a hosted build.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod arena;
pub mod error;
pub mod process;
pub mod sched;
pub mod semaphore;
pub mod stream;
pub mod thread;

pub use arena::ThreadArena;
pub use error::TaskError;
pub use process::{Process, ProcessId, ProcessSnapshot, ProcessTable, ThreadSnapshot};
pub use sched::Scheduler;
pub use semaphore::{DownOutcome, Semaphore};
pub use stream::{Stream, StreamError};
pub use thread::{Thread, ThreadId, ThreadState};
