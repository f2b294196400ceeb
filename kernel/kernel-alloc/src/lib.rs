//! # Kernel Memory Allocation
//!
//! The three allocation layers of the kernel, bottom up:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Heap (kmalloc / kcalloc / kfree)       │
//! │    • byte requests rounded to slabs                 │
//! │    • one bookkeeping record per live allocation     │
//! │    • whole-frame fallback for oversized requests    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Slab Allocator                         │
//! │    • 64-byte slabs carved from frames               │
//! │    • bookkeeping nodes stored inside the region     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Frame Allocator                           │
//! │    • 4 KiB frame bitmap above the reserved region   │
//! │    • first-fit contiguous runs                      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lock discipline
//!
//! Each layer owns exactly one lock. The heap's fallback path reaches into
//! the frame allocator while holding the heap lock; that nested acquisition
//! is the one permitted cross-layer order (**heap, then frame**) and must
//! be preserved everywhere. No allocator lock is ever held across a
//! suspension point; every critical section here completes in bounded
//! time, so the layers are callable from interrupt context.
//!
//! ## Error posture
//!
//! Exhaustion is reported to the caller and never retried internally.
//! Free operations validate that the whole addressed range is in the
//! expected state and reject the operation outright otherwise, so a
//! bookkeeping bug surfaces immediately instead of compounding.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame;
pub mod heap;
pub mod hhdm;
pub mod slab;

pub use frame::{FrameAllocError, FrameAllocator, LockedFrameAllocator};
pub use heap::{Heap, HeapError, LockedHeap};
pub use hhdm::{LogicalMapper, SliceMapper};
pub use slab::{SlabAllocator, SlabError};
