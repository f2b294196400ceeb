use crate::{PhysicalAddress, align_down};
use core::fmt;
use core::ops::{Add, AddAssign};
use kernel_layout::memory::{FRAME_SIZE, KERNEL_LOGICAL_BASE};

/// Virtual memory address.
///
/// ### Two-level walk
///
/// A 32-bit virtual address divides into three fields:
///
/// ```text
/// | 31‒22     | 21‒12   | 11‒0   |
/// | directory |  table  | offset |
/// ```
///
/// Bits 22–31 index the page directory, bits 12–21 index the page table the
/// directory entry points at, and bits 0–11 select the byte inside the
/// 4 KiB frame. [`directory_index`](Self::directory_index) and
/// [`table_index`](Self::table_index) expose the two index fields.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Page-directory index (bits 22–31).
    #[inline]
    #[must_use]
    pub const fn directory_index(self) -> usize {
        (self.0 >> 22) as usize
    }

    /// Page-table index (bits 12–21).
    #[inline]
    #[must_use]
    pub const fn table_index(self) -> usize {
        ((self.0 >> 12) & 0x3FF) as usize
    }

    /// Byte offset within the page (bits 0–11).
    #[inline]
    #[must_use]
    pub const fn offset_in_page(self) -> u32 {
        self.0 % FRAME_SIZE
    }

    /// Base address of the page containing this address.
    #[inline]
    #[must_use]
    pub const fn page_base(self) -> Self {
        Self(align_down(self.0, FRAME_SIZE))
    }

    /// Whether the address lies in the null page.
    #[inline]
    #[must_use]
    pub const fn is_null_page(self) -> bool {
        self.0 < FRAME_SIZE
    }

    /// Whether the address lies in the kernel half (at or above the
    /// kernel-logical base).
    #[inline]
    #[must_use]
    pub const fn is_kernel(self) -> bool {
        self.0 >= KERNEL_LOGICAL_BASE
    }

    /// Physical address a kernel-logical address aliases.
    ///
    /// Returns `None` for addresses below the logical base; those are not
    /// logical addresses at all.
    #[inline]
    #[must_use]
    pub const fn from_logical(self) -> Option<PhysicalAddress> {
        if self.0 < KERNEL_LOGICAL_BASE {
            return None;
        }
        Some(PhysicalAddress::new(self.0 - KERNEL_LOGICAL_BASE))
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.as_u32())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.as_u32())
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl Add<u32> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}
