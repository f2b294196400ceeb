//! The ready queue and scheduling decisions.
//!
//! This is the decision half of the scheduler: which thread runs next,
//! who is blocked, tick accounting. It mutates thread states through the
//! [`ProcessTable`] and never touches a stack or register; the context
//! switch itself is the embedder's architecture seam, driven after
//! [`Scheduler::pick_next`] returns.

use crate::error::TaskError;
use crate::process::ProcessTable;
use crate::thread::{ThreadId, ThreadState};
use alloc::collections::VecDeque;

/// FIFO round-robin scheduler over thread ids.
#[derive(Default)]
pub struct Scheduler {
    ready: VecDeque<ThreadId>,
    current: Option<ThreadId>,
}

impl Scheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            current: None,
        }
    }

    /// The thread currently holding the core, if any.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> Option<ThreadId> {
        self.current
    }

    /// Number of runnable threads waiting for the core.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Put a freshly created thread at the back of the ready queue.
    pub(crate) fn enqueue(&mut self, tid: ThreadId) {
        self.ready.push_back(tid);
    }

    /// Decide the next thread to run.
    ///
    /// The preempted thread, if still running, goes `Ready` and to the
    /// back of the queue. Stale ids whose threads have terminated since
    /// they were enqueued are skipped. Returns `None` when nothing is
    /// runnable; the embedder then idles until the next interrupt.
    ///
    /// # Errors
    /// A state transition rejected by the thread state machine indicates
    /// scheduler bookkeeping corruption and is propagated.
    pub fn pick_next(&mut self, table: &mut ProcessTable) -> Result<Option<ThreadId>, TaskError> {
        if let Some(prev) = self.current.take() {
            if let Some(thread) = table.thread_mut(prev) {
                if thread.state() == ThreadState::Running {
                    thread.set_state(ThreadState::Ready)?;
                    self.ready.push_back(prev);
                }
            }
        }

        while let Some(tid) = self.ready.pop_front() {
            let Some(thread) = table.thread_mut(tid) else {
                continue;
            };
            if thread.state() != ThreadState::Ready {
                continue;
            }
            thread.set_state(ThreadState::Running)?;
            self.current = Some(tid);
            return Ok(Some(tid));
        }
        Ok(None)
    }

    /// Suspend `tid`; it leaves the ready queue until unblocked.
    ///
    /// # Errors
    /// Only a running thread can block itself; anything else is a caller
    /// bug surfaced as `IllegalTransition`.
    pub fn block(&mut self, table: &mut ProcessTable, tid: ThreadId) -> Result<(), TaskError> {
        let thread = table.thread_mut(tid).ok_or(TaskError::NoSuchThread(tid))?;
        thread.set_state(ThreadState::Blocked)?;
        self.ready.retain(|t| *t != tid);
        if self.current == Some(tid) {
            self.current = None;
        }
        Ok(())
    }

    /// Make a blocked thread runnable again, at the back of the queue.
    ///
    /// # Errors
    /// `NoSuchThread` for dead ids, `IllegalTransition` when the thread
    /// is not blocked.
    pub fn unblock(&mut self, table: &mut ProcessTable, tid: ThreadId) -> Result<(), TaskError> {
        let thread = table.thread_mut(tid).ok_or(TaskError::NoSuchThread(tid))?;
        thread.set_state(ThreadState::Ready)?;
        self.ready.push_back(tid);
        Ok(())
    }

    /// Forget `tid` entirely; used when a thread is terminated.
    pub(crate) fn remove(&mut self, tid: ThreadId) {
        self.ready.retain(|t| *t != tid);
        if self.current == Some(tid) {
            self.current = None;
        }
    }

    /// Timer-tick accounting hook: charge one tick to the running thread.
    pub fn tick(&mut self, table: &mut ProcessTable) {
        if let Some(tid) = self.current {
            if let Some(thread) = table.thread_mut(tid) {
                thread.ticks += 1;
            }
        }
    }
}
