//! Counting semaphores.
//!
//! The only suspension point in the synchronization layer. `down` under
//! contention enqueues the caller and blocks it; `up` wakes exactly one
//! waiter in FIFO order, preserving hand-off semantics. The semaphore's
//! own state sits behind its embedded spinlock, and that lock is always
//! released before the scheduler is touched, so no lock is ever held
//! across a (pending) context switch.
//!
//! `down` returns [`DownOutcome::MustBlock`] instead of suspending
//! in-place; the kernel entry point loops, switching context between
//! attempts, until it gets [`DownOutcome::Acquired`]. In kernel context
//! the whole call runs inside an interrupt-disabled section owned by the
//! caller.

use crate::error::TaskError;
use crate::process::ProcessTable;
use crate::sched::Scheduler;
use crate::thread::ThreadId;
use alloc::collections::VecDeque;
use kernel_sync::SpinLock;

/// Result of one `down` attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DownOutcome {
    /// A unit was claimed; the caller proceeds.
    Acquired,
    /// No unit was available; the caller is now blocked and must retry
    /// after being woken.
    MustBlock,
}

struct SemState {
    count: i32,
    waiters: VecDeque<ThreadId>,
}

/// Counting semaphore with a FIFO wait queue.
pub struct Semaphore {
    state: SpinLock<SemState>,
}

impl Semaphore {
    #[must_use]
    pub const fn new(count: i32) -> Self {
        Self {
            state: SpinLock::new(SemState {
                count,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Attempt to claim a unit, blocking the caller on contention.
    ///
    /// # Errors
    /// Transition errors from blocking a thread that is not running.
    pub fn down(
        &self,
        table: &mut ProcessTable,
        sched: &mut Scheduler,
        caller: ThreadId,
    ) -> Result<DownOutcome, TaskError> {
        {
            let mut state = self.state.lock();
            if state.count > 0 {
                state.count -= 1;
                return Ok(DownOutcome::Acquired);
            }
            state.waiters.push_back(caller);
        }
        // Lock released; now suspend the caller.
        sched.block(table, caller)?;
        Ok(DownOutcome::MustBlock)
    }

    /// Claim a unit without blocking.
    ///
    /// Returns `false` immediately when the count is non-positive.
    #[must_use]
    pub fn try_down(&self) -> bool {
        let mut state = self.state.lock();
        if state.count > 0 {
            state.count -= 1;
            true
        } else {
            false
        }
    }

    /// Release a unit and wake at most one waiter.
    ///
    /// Never wakes more than one live thread, however large the count
    /// grows; each `up` pairs with exactly one blocked `down`. Waiters
    /// whose threads were terminated while queued are discarded, so a
    /// wake is never spent on a dead tid.
    ///
    /// # Errors
    /// Transition errors from unblocking a thread that is not blocked.
    pub fn up(&self, table: &mut ProcessTable, sched: &mut Scheduler) -> Result<(), TaskError> {
        let woken = {
            let mut state = self.state.lock();
            state.count += 1;
            loop {
                match state.waiters.pop_front() {
                    Some(tid) if table.thread_state(tid).is_none() => {}
                    other => break other,
                }
            }
        };
        if let Some(tid) = woken {
            sched.unblock(table, tid)?;
        }
        Ok(())
    }

    /// Current unit count (may be stale the moment it is read).
    #[must_use]
    pub fn count(&self) -> i32 {
        self.state.lock().count
    }

    /// Number of threads blocked on this semaphore.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}
