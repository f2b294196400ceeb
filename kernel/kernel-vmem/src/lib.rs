//! # Virtual Memory Support
//!
//! Two-level paging helpers for the kernel: typed page-directory and
//! page-table structures, an [`AddressSpace`] that builds and mutates
//! mappings, and the small allocator/mapper seams the rest of the workspace
//! plugs into.
//!
//! ## Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒22     | 21‒12 | 11‒0   |
//! | directory | table | offset |
//! ```
//!
//! The directory field indexes the page directory (1024 entries); a present
//! directory entry points at a page table frame; the table field indexes
//! that table; a present table entry maps one 4 KiB frame; the offset
//! selects the byte.
//!
//! ## Self-map
//!
//! The last directory slot points back at the directory's own frame. With
//! that entry in place the directory doubles as a page table covering the
//! top 4 MiB of the address space, so every page-table frame, including the
//! directory itself, is reachable through ordinary addressing once paging
//! is enabled. That window is reserved: mapping requests into it are
//! rejected.
//!
//! ## Seams
//!
//! - [`FrameAlloc`] supplies frames for on-demand page tables.
//! - [`PhysMapper`] converts a table frame's physical address into a usable
//!   reference. The kernel implements it with the logical window; hosted
//!   tests implement it over a plain buffer.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address_space;
mod page_entry;
mod page_table;

pub use address_space::AddressSpace;
pub use page_entry::PageEntry;
pub use page_table::{PageDirectory, PageTable};

use kernel_addresses::{PhysicalAddress, VirtualAddress};
use thiserror::Error;

/// Source of 4 KiB frames for on-demand page-table creation.
pub trait FrameAlloc {
    /// Hand out one frame, or `None` when physical memory is exhausted.
    fn alloc_frame(&mut self) -> Option<PhysicalAddress>;
}

/// Converts physical addresses into usable references.
///
/// Rust code can only dereference virtual addresses; manipulating a page
/// table stored in a physical frame therefore needs a translation step.
/// The mapping strategy differs between early boot (identity), the running
/// kernel (logical window), and hosted tests (plain buffer), so it is a
/// trait.
pub trait PhysMapper {
    /// Translate `pa` to a mutable reference.
    ///
    /// # Safety
    /// The caller must ensure `pa` refers to valid, writable memory of at
    /// least `size_of::<T>()` bytes that is mapped under this strategy, and
    /// that no other reference to it is live.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Failures of the paging layer.
///
/// `Exhausted` is ordinary resource exhaustion; the invariant-violation
/// variants are hard errors at the call boundary and never mapped silently.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum PagingError {
    /// No frame was available for a page table or the directory itself.
    #[error("out of physical frames while building page tables")]
    Exhausted,

    /// The null page must never be mapped.
    #[error("refusing to map the null page at {0}")]
    NullPage(VirtualAddress),

    /// Kernel mapping paths only accept kernel-half addresses.
    #[error("virtual address {0} is below the kernel-logical base")]
    BelowKernelBase(VirtualAddress),

    /// A leaf mapping to physical frame zero is always a bug.
    #[error("refusing to map physical frame zero")]
    ZeroFrame,

    /// The top 4 MiB belong to the self-map.
    #[error("virtual address {0} falls in the self-map window")]
    SelfMapReserved(VirtualAddress),

    /// The physical address lies beyond what the logical window covers.
    #[error("physical address {0} has no kernel-logical alias")]
    NoLogicalAlias(PhysicalAddress),

    /// Unmap or query of an address no mapping exists for.
    #[error("no mapping at {0}")]
    NotMapped(VirtualAddress),
}
