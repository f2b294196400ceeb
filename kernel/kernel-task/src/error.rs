//! Failures of the process and thread layer.

use crate::process::ProcessId;
use crate::thread::{ThreadId, ThreadState};
use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Every slot of the process's fixed thread table is taken.
    #[error("process {0} has no free thread slot")]
    NoFreeSlot(ProcessId),

    /// The pid does not name a live process.
    #[error("no such process: {0}")]
    NoSuchProcess(ProcessId),

    /// The tid does not name a live thread.
    #[error("no such thread: {0}")]
    NoSuchThread(ThreadId),

    /// Every stack slot of the thread arena is in use.
    #[error("thread arena exhausted")]
    ArenaExhausted,

    /// The arena base or size is not aligned to the slot size.
    #[error("thread arena region is not slot-aligned")]
    ArenaMisaligned,

    /// The requested state change is not in the legal transition set.
    #[error("illegal thread state transition {from:?} -> {to:?}")]
    IllegalTransition { from: ThreadState, to: ThreadState },
}
