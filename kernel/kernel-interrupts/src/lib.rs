//! # Interrupt Dispatch
//!
//! The boundary between the hardware interrupt plumbing (IDT stubs, PIC
//! remapping) and the kernel proper. The stubs push a [`TrapFrame`] and
//! call into [`HandlerTable::dispatch`]; everything above that point is
//! ordinary kernel code.
//!
//! Unhandled *exception* vectors are a fail-stop condition: `dispatch`
//! reports [`DispatchOutcome::Unhandled`] and the embedder halts. The
//! table itself never panics; policy belongs to the caller.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

mod table;
mod trap_frame;

pub use table::{DispatchOutcome, Handler, HandlerTable, InterruptError, LockedHandlerTable, VECTORS};
pub use trap_frame::TrapFrame;
