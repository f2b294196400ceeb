//! Processes and the process table.
//!
//! A process is a fixed-size container of thread slots plus its three
//! I/O streams and a FIFO waiter list for the wait/notify primitive. The
//! [`ProcessTable`] owns every live process; there is no global list and
//! no hidden "active process" pointer, the embedder threads the table
//! into each call.

use crate::arena::ThreadArena;
use crate::error::TaskError;
use crate::sched::Scheduler;
use crate::stream::Stream;
use crate::thread::{Thread, ThreadId, ThreadState};
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use kernel_addresses::VirtualAddress;
use kernel_layout::memory::MAX_THREADS_PER_PROCESS;

/// Stable identifier of a process. Pid `0` is the init process; pids are
/// assigned monotonically and never reused.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    /// The init process.
    pub const INIT: Self = Self(0);

    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One process: its threads, streams and waiters.
pub struct Process {
    pub pid: ProcessId,
    pub name: String,
    threads: [Option<Thread>; MAX_THREADS_PER_PROCESS],
    live_threads: usize,
    pub stdin: Stream,
    pub stdout: Stream,
    pub stderr: Stream,
    /// Threads blocked in `wait` on this process, FIFO.
    waiters: VecDeque<ThreadId>,
    /// Return code the most recent notify stamped on its waiters.
    wait_code: i32,
}

impl Process {
    fn new(pid: ProcessId, name: String) -> Self {
        Self {
            pid,
            name,
            threads: [const { None }; MAX_THREADS_PER_PROCESS],
            live_threads: 0,
            stdin: Stream::new(),
            stdout: Stream::new(),
            stderr: Stream::new(),
            waiters: VecDeque::new(),
            wait_code: 0,
        }
    }

    /// Threads still counting against this process's lifetime.
    #[inline]
    #[must_use]
    pub const fn live_threads(&self) -> usize {
        self.live_threads
    }

    /// The code the last notify delivered to this process's waiters.
    #[inline]
    #[must_use]
    pub const fn wait_code(&self) -> i32 {
        self.wait_code
    }

    /// Borrow a thread by its slot index.
    #[must_use]
    pub fn thread(&self, slot: usize) -> Option<&Thread> {
        self.threads.get(slot).and_then(Option::as_ref)
    }

    fn first_free_slot(&self) -> Option<usize> {
        self.threads.iter().position(Option::is_none)
    }
}

/// Read-only view of one thread for diagnostics.
#[derive(Clone, Debug)]
pub struct ThreadSnapshot {
    pub tid: ThreadId,
    pub name: String,
    pub state: ThreadState,
    pub priority: u8,
    pub ticks: u64,
}

/// Read-only view of one process for diagnostics (`ps`-style tools).
///
/// A snapshot is a copy; holding one cannot mutate or pin the table.
#[derive(Clone, Debug)]
pub struct ProcessSnapshot {
    pub pid: ProcessId,
    pub name: String,
    pub live_threads: usize,
    pub threads: Vec<ThreadSnapshot>,
}

/// Owner of every live process.
#[derive(Default)]
pub struct ProcessTable {
    processes: Vec<Process>,
    next_pid: u32,
    next_tid: u32,
}

impl ProcessTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            processes: Vec::new(),
            next_pid: 0,
            next_tid: 0,
        }
    }

    /// Create a process with its slot-0 "main" thread bound to `entry`.
    ///
    /// The pid is consumed only on success: a main-thread failure (arena
    /// exhausted) rolls the whole creation back.
    ///
    /// # Errors
    /// `ArenaExhausted` when no stack slot is free for the main thread.
    pub fn create_process(
        &mut self,
        arena: &mut ThreadArena,
        sched: &mut Scheduler,
        name: &str,
        entry: VirtualAddress,
        arg: u32,
    ) -> Result<ProcessId, TaskError> {
        let tid = ThreadId::new(self.next_tid);
        let slot = arena.allocate_slot(tid)?;

        let pid = ProcessId::new(self.next_pid);
        let mut process = Process::new(pid, String::from(name));
        process.threads[0] = Some(Thread::new(
            tid,
            pid,
            0,
            String::from("main"),
            slot,
            arena.stack_top(slot),
            entry,
            arg,
        ));
        process.live_threads = 1;

        self.next_pid += 1;
        self.next_tid += 1;
        self.processes.push(process);
        sched.enqueue(tid);
        log::info!("created process {pid} ({name}) with main thread {tid}");
        Ok(pid)
    }

    /// Create an additional thread in `pid`, taking the first free slot.
    ///
    /// # Errors
    /// `NoFreeSlot` when all thread slots are taken, `ArenaExhausted`
    /// when no stack slot is free.
    pub fn create_thread(
        &mut self,
        arena: &mut ThreadArena,
        sched: &mut Scheduler,
        pid: ProcessId,
        priority: u8,
        name: &str,
        entry: VirtualAddress,
        arg: u32,
    ) -> Result<ThreadId, TaskError> {
        let tid = ThreadId::new(self.next_tid);
        let process = self.process_mut(pid).ok_or(TaskError::NoSuchProcess(pid))?;
        let thread_slot = process.first_free_slot().ok_or(TaskError::NoFreeSlot(pid))?;

        let stack_slot = arena.allocate_slot(tid)?;
        let process = self.process_mut(pid).ok_or(TaskError::NoSuchProcess(pid))?;
        process.threads[thread_slot] = Some(Thread::new(
            tid,
            pid,
            priority,
            String::from(name),
            stack_slot,
            arena.stack_top(stack_slot),
            entry,
            arg,
        ));
        process.live_threads += 1;

        self.next_tid += 1;
        sched.enqueue(tid);
        log::debug!("created thread {tid} ({name}) in process {pid}");
        Ok(tid)
    }

    /// Terminate the calling thread.
    ///
    /// When this was the process's last live thread the process is
    /// cleaned up: removed from the table, pending waiters notified with
    /// code `0`.
    ///
    /// The caller's stack slot is released here while the caller is
    /// still executing on it. The embedder must switch away (via
    /// [`Scheduler::pick_next`]) before creating any thread; a spawn in
    /// that window could hand the still-live stack to the new thread.
    ///
    /// # Errors
    /// `NoSuchThread` for a dead tid.
    pub fn exit(
        &mut self,
        arena: &mut ThreadArena,
        sched: &mut Scheduler,
        tid: ThreadId,
        code: i32,
    ) -> Result<(), TaskError> {
        let thread = self.thread_mut(tid).ok_or(TaskError::NoSuchThread(tid))?;
        let pid = thread.pid;
        thread.set_state(ThreadState::Dying)?;
        log::info!("thread {tid} of process {pid} exited with code {code}");
        self.reap(arena, sched, pid, tid)?;

        if self.process(pid).is_some_and(|p| p.live_threads == 0) {
            self.cleanup(sched, pid)?;
        }
        Ok(())
    }

    /// Force-terminate a process.
    ///
    /// Every thread not currently running and not already dying is
    /// terminated; the return value is the number of threads still alive
    /// afterwards (the caller itself, when killing its own process).
    /// Killing one's own process as its last live thread exits
    /// immediately instead of being swept, so the stack in use is never
    /// reclaimed midway.
    ///
    /// # Errors
    /// `NoSuchProcess` for a dead pid.
    pub fn kill(
        &mut self,
        arena: &mut ThreadArena,
        sched: &mut Scheduler,
        pid: ProcessId,
        caller: Option<ThreadId>,
    ) -> Result<usize, TaskError> {
        let process = self.process(pid).ok_or(TaskError::NoSuchProcess(pid))?;

        // Self-kill of the last living thread: a plain exit.
        let caller_in_target = caller
            .is_some_and(|tid| process.threads.iter().flatten().any(|t| t.tid == tid));
        if caller_in_target && process.live_threads == 1 {
            let tid = caller.ok_or(TaskError::NoSuchProcess(pid))?;
            self.exit(arena, sched, tid, 0)?;
            return Ok(0);
        }

        let victims: Vec<ThreadId> = process
            .threads
            .iter()
            .flatten()
            .filter(|t| {
                t.is_live()
                    && t.state() != ThreadState::Dying
                    && t.state() != ThreadState::Running
            })
            .map(|t| t.tid)
            .collect();

        for tid in victims {
            let thread = self.thread_mut(tid).ok_or(TaskError::NoSuchThread(tid))?;
            thread.set_state(ThreadState::Dying)?;
            self.reap(arena, sched, pid, tid)?;
        }

        let remaining = self
            .process(pid)
            .ok_or(TaskError::NoSuchProcess(pid))?
            .live_threads;
        log::info!("killed process {pid}, {remaining} thread(s) remaining");
        if remaining == 0 {
            self.cleanup(sched, pid)?;
        }
        Ok(remaining)
    }

    /// Block `caller` until `pid` is notified or fully exits.
    ///
    /// The caller joins the FIFO waiter list; the delivered code is read
    /// from [`Process::wait_code`] once the embedder reschedules it.
    ///
    /// # Errors
    /// `NoSuchProcess` for a dead pid; transition errors from the block.
    pub fn wait(
        &mut self,
        sched: &mut Scheduler,
        pid: ProcessId,
        caller: ThreadId,
    ) -> Result<(), TaskError> {
        let process = self.process_mut(pid).ok_or(TaskError::NoSuchProcess(pid))?;
        process.waiters.push_back(caller);
        sched.block(self, caller)
    }

    /// Wake one waiter (or all, FIFO order) with `code`.
    ///
    /// Returns the number of threads woken. A waiter whose thread was
    /// terminated while it sat in the queue is already gone; it is
    /// skipped, never an error, and the remaining waiters still wake.
    ///
    /// # Errors
    /// `NoSuchProcess` for a dead pid; transition errors from unblocking.
    pub fn notify(
        &mut self,
        sched: &mut Scheduler,
        pid: ProcessId,
        all: bool,
        code: i32,
    ) -> Result<usize, TaskError> {
        let process = self.process_mut(pid).ok_or(TaskError::NoSuchProcess(pid))?;
        let mut drained = Vec::new();
        if all {
            drained.extend(process.waiters.drain(..));
        } else if let Some(tid) = process.waiters.pop_front() {
            drained.push(tid);
        }
        if !drained.is_empty() {
            process.wait_code = code;
        }

        let mut woken = 0;
        for tid in drained {
            if self.thread_state(tid).is_none() {
                continue;
            }
            sched.unblock(self, tid)?;
            woken += 1;
        }
        Ok(woken)
    }

    /// Read-only diagnostics traversal of every live process.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProcessSnapshot> {
        self.processes
            .iter()
            .map(|p| ProcessSnapshot {
                pid: p.pid,
                name: p.name.clone(),
                live_threads: p.live_threads,
                threads: p
                    .threads
                    .iter()
                    .flatten()
                    .map(|t| ThreadSnapshot {
                        tid: t.tid,
                        name: t.name.clone(),
                        state: t.state(),
                        priority: t.priority,
                        ticks: t.ticks,
                    })
                    .collect(),
            })
            .collect()
    }

    #[must_use]
    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    /// Mutable process access, for the stream I/O boundary: drivers and
    /// shell glue reach `stdin`/`stdout`/`stderr` through here.
    pub fn process_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.pid == pid)
    }

    /// Number of live processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// State of a thread anywhere in the table, for diagnostics.
    #[must_use]
    pub fn thread_state(&self, tid: ThreadId) -> Option<ThreadState> {
        self.processes
            .iter()
            .flat_map(|p| p.threads.iter().flatten())
            .find(|t| t.tid == tid)
            .map(Thread::state)
    }

    pub(crate) fn thread_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.processes
            .iter_mut()
            .flat_map(|p| p.threads.iter_mut().flatten())
            .find(|t| t.tid == tid)
    }

    /// Finish tearing down a dying thread: mark it terminated, release
    /// its stack slot, drop it from the scheduler, every waiter queue,
    /// and the slot table.
    fn reap(
        &mut self,
        arena: &mut ThreadArena,
        sched: &mut Scheduler,
        pid: ProcessId,
        tid: ThreadId,
    ) -> Result<(), TaskError> {
        let thread = self.thread_mut(tid).ok_or(TaskError::NoSuchThread(tid))?;
        thread.set_state(ThreadState::Terminated)?;
        let stack_slot = thread.slot;
        arena.release_slot(stack_slot);
        sched.remove(tid);

        // The dead thread may sit in wait queues on other processes.
        for process in &mut self.processes {
            process.waiters.retain(|w| *w != tid);
        }

        let process = self.process_mut(pid).ok_or(TaskError::NoSuchProcess(pid))?;
        for slot in &mut process.threads {
            if slot.as_ref().is_some_and(|t| t.tid == tid) {
                *slot = None;
            }
        }
        process.live_threads -= 1;
        Ok(())
    }

    /// Remove a process whose live count reached zero, notifying its
    /// remaining waiters with code `0`.
    fn cleanup(&mut self, sched: &mut Scheduler, pid: ProcessId) -> Result<(), TaskError> {
        self.notify(sched, pid, true, 0)?;
        self.processes.retain(|p| p.pid != pid);
        log::info!("process {pid} removed");
        Ok(())
    }
}
