//! Thread control blocks and the thread state machine.

use crate::error::TaskError;
use crate::process::ProcessId;
use alloc::string::String;
use core::fmt;
use kernel_addresses::VirtualAddress;

/// Stable identifier of a thread, assigned monotonically for the kernel's
/// lifetime and never reused.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid {}", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread lifecycle states.
///
/// `Terminated` is terminal; a terminated thread's slot and arena stack
/// are reclaimed and its tid is never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// Runnable, sitting in the ready queue.
    Ready,
    /// Currently executing on the core.
    Running,
    /// Suspended on a semaphore or a process waiter list.
    Blocked,
    /// Marked for termination; still owns its stack until swept.
    Dying,
    /// Fully torn down.
    Terminated,
}

impl ThreadState {
    /// Whether `self -> to` is a legal transition.
    ///
    /// `Ready`/`Blocked` threads may be forced straight to `Dying` by a
    /// kill; everything else follows the run/block/preempt cycle.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Ready, Self::Running)
                | (Self::Ready | Self::Running | Self::Blocked, Self::Dying)
                | (Self::Running, Self::Ready | Self::Blocked)
                | (Self::Blocked, Self::Ready)
                | (Self::Dying, Self::Terminated)
        )
    }
}

/// Control block of one thread.
///
/// Lives in its owning process's slot table; the stack lives in the
/// thread arena, keyed by `slot`.
#[derive(Debug)]
pub struct Thread {
    pub tid: ThreadId,
    pub pid: ProcessId,
    pub priority: u8,
    /// Timer ticks this thread has been scheduled for.
    pub ticks: u64,
    pub name: String,
    state: ThreadState,
    /// Arena slot holding this thread's stack.
    pub slot: usize,
    /// Initial stack pointer, at the high end of the arena slot.
    pub stack_top: VirtualAddress,
    /// Entry point the context-switch stub starts the thread at.
    pub entry: VirtualAddress,
    /// Argument handed to the entry point.
    pub arg: u32,
}

impl Thread {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tid: ThreadId,
        pid: ProcessId,
        priority: u8,
        name: String,
        slot: usize,
        stack_top: VirtualAddress,
        entry: VirtualAddress,
        arg: u32,
    ) -> Self {
        Self {
            tid,
            pid,
            priority,
            ticks: 0,
            name,
            state: ThreadState::Ready,
            slot,
            stack_top,
            entry,
            arg,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> ThreadState {
        self.state
    }

    /// Move to `to`, enforcing the legal transition set.
    ///
    /// # Errors
    /// `IllegalTransition` when the state machine does not allow the move;
    /// the state is left unchanged.
    pub fn set_state(&mut self, to: ThreadState) -> Result<(), TaskError> {
        if !self.state.can_transition_to(to) {
            return Err(TaskError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        log::trace!("{:?}: {:?} -> {:?}", self.tid, self.state, to);
        self.state = to;
        Ok(())
    }

    /// Whether this thread still counts against its process's live count.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !matches!(self.state, ThreadState::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Thread {
        Thread::new(
            ThreadId::new(7),
            ProcessId::new(1),
            1,
            String::from("worker"),
            0,
            VirtualAddress::new(0xC100_4000),
            VirtualAddress::new(0xC000_1000),
            0,
        )
    }

    #[test]
    fn threads_start_ready() {
        assert_eq!(fixture().state(), ThreadState::Ready);
    }

    #[test]
    fn run_block_resume_cycle_is_legal() {
        let mut t = fixture();
        t.set_state(ThreadState::Running).unwrap();
        t.set_state(ThreadState::Blocked).unwrap();
        t.set_state(ThreadState::Ready).unwrap();
        t.set_state(ThreadState::Running).unwrap();
        t.set_state(ThreadState::Dying).unwrap();
        t.set_state(ThreadState::Terminated).unwrap();
    }

    #[test]
    fn ready_thread_cannot_block_without_running() {
        let mut t = fixture();
        assert_eq!(
            t.set_state(ThreadState::Blocked),
            Err(TaskError::IllegalTransition {
                from: ThreadState::Ready,
                to: ThreadState::Blocked,
            })
        );
        assert_eq!(t.state(), ThreadState::Ready);
    }

    #[test]
    fn terminated_is_terminal() {
        let mut t = fixture();
        t.set_state(ThreadState::Dying).unwrap();
        t.set_state(ThreadState::Terminated).unwrap();
        assert!(t.set_state(ThreadState::Ready).is_err());
        assert!(!t.is_live());
    }
}
