//! # Kernel synchronization primitives
//!
//! The locking story is single-core: mutual exclusion against other code on
//! the same core comes from disabling interrupts ([`IrqGuard`]), and the
//! spinlock exists so that allocator and scheduler state transitions stay
//! atomic even when a critical section is entered from interrupt context.
//! No lock in this crate suspends; blocking synchronization (semaphores)
//! lives in `kernel-task` on top of the scheduler.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::IrqGuard;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
