//! The vector handler table.

use crate::TrapFrame;
use kernel_sync::SpinLock;
use thiserror::Error;

/// Number of interrupt vectors the architecture defines.
pub const VECTORS: usize = 256;

/// Vectors below this are CPU exceptions; the rest are external
/// interrupts and software traps.
const EXCEPTION_LIMIT: u32 = 32;

/// A registered interrupt handler.
///
/// Runs with interrupts disabled and must complete in bounded time; the
/// frame may be mutated to alter the interrupted context on return.
pub type Handler = fn(&mut TrapFrame);

/// Failures of handler registration.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum InterruptError {
    /// The vector already has a handler; re-registration is a wiring bug.
    #[error("vector {0} already has a handler")]
    AlreadyRegistered(u8),
}

/// What `dispatch` did with a trap.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A registered handler ran to completion.
    Handled,

    /// No handler is registered. For exception vectors the embedder must
    /// halt; delivery without a handler means the kernel's own state is
    /// suspect.
    Unhandled,
}

impl DispatchOutcome {
    /// Whether this outcome requires the embedder to halt.
    #[must_use]
    pub const fn is_fatal(self, vector: u32) -> bool {
        matches!(self, Self::Unhandled) && vector < EXCEPTION_LIMIT
    }
}

/// One handler slot per vector.
pub struct HandlerTable {
    slots: [Option<Handler>; VECTORS],
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None; VECTORS],
        }
    }

    /// Register `handler` for `vector`.
    ///
    /// # Errors
    /// Each vector takes exactly one handler; registering twice is
    /// rejected rather than silently replacing the first.
    pub fn register(&mut self, vector: u8, handler: Handler) -> Result<(), InterruptError> {
        let slot = &mut self.slots[vector as usize];
        if slot.is_some() {
            return Err(InterruptError::AlreadyRegistered(vector));
        }
        *slot = Some(handler);
        log::debug!("registered handler for vector {vector}");
        Ok(())
    }

    /// Deliver a trap to its registered handler, if any.
    pub fn dispatch(&self, frame: &mut TrapFrame) -> DispatchOutcome {
        match self.slots.get(frame.vector_index()).copied().flatten() {
            Some(handler) => {
                handler(frame);
                DispatchOutcome::Handled
            }
            None => {
                if frame.vector < EXCEPTION_LIMIT {
                    log::error!(
                        "unhandled exception vector {} at eip {:#010X} (error code {:#X})",
                        frame.vector,
                        frame.eip,
                        frame.error_code
                    );
                }
                DispatchOutcome::Unhandled
            }
        }
    }

    /// Number of vectors with a handler installed.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// The handler table behind its lock.
///
/// Registration happens during bring-up; dispatch happens in interrupt
/// context. Both go through the same lock, so bring-up must finish
/// registering before interrupts are enabled.
pub struct LockedHandlerTable(SpinLock<HandlerTable>);

impl Default for LockedHandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockedHandlerTable {
    #[must_use]
    pub const fn new() -> Self {
        Self(SpinLock::new(HandlerTable::new()))
    }

    /// See [`HandlerTable::register`].
    pub fn register(&self, vector: u8, handler: Handler) -> Result<(), InterruptError> {
        self.0.lock().register(vector, handler)
    }

    /// See [`HandlerTable::dispatch`].
    pub fn dispatch(&self, frame: &mut TrapFrame) -> DispatchOutcome {
        self.0.lock().dispatch(frame)
    }

    #[must_use]
    pub fn registered(&self) -> usize {
        self.0.lock().registered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TICKS: AtomicU32 = AtomicU32::new(0);

    fn count_tick(_frame: &mut TrapFrame) {
        TICKS.fetch_add(1, Ordering::Relaxed);
    }

    fn advance_eip(frame: &mut TrapFrame) {
        frame.eip += 2;
    }

    #[test]
    fn registered_handler_receives_the_frame() {
        let table = LockedHandlerTable::new();
        table.register(0x20, count_tick).unwrap();

        let before = TICKS.load(Ordering::Relaxed);
        let mut frame = TrapFrame {
            vector: 0x20,
            ..TrapFrame::default()
        };
        assert_eq!(table.dispatch(&mut frame), DispatchOutcome::Handled);
        assert_eq!(TICKS.load(Ordering::Relaxed), before + 1);
    }

    #[test]
    fn handlers_may_rewrite_the_interrupted_context() {
        let mut table = HandlerTable::new();
        table.register(3, advance_eip).unwrap();

        let mut frame = TrapFrame {
            vector: 3,
            eip: 0x1000,
            ..TrapFrame::default()
        };
        assert_eq!(table.dispatch(&mut frame), DispatchOutcome::Handled);
        assert_eq!(frame.eip, 0x1002);
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut table = HandlerTable::new();
        table.register(0x21, count_tick).unwrap();
        assert_eq!(
            table.register(0x21, advance_eip),
            Err(InterruptError::AlreadyRegistered(0x21))
        );
        assert_eq!(table.registered(), 1);
    }

    #[test]
    fn unhandled_exception_vector_is_fatal() {
        let table = HandlerTable::new();
        let mut frame = TrapFrame {
            vector: 14,
            ..TrapFrame::default()
        };
        let outcome = table.dispatch(&mut frame);
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert!(outcome.is_fatal(frame.vector));
    }

    #[test]
    fn unhandled_external_vector_is_not_fatal() {
        let table = HandlerTable::new();
        let mut frame = TrapFrame {
            vector: 0x80,
            ..TrapFrame::default()
        };
        let outcome = table.dispatch(&mut frame);
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert!(!outcome.is_fatal(frame.vector));
    }
}
