use crate::{VirtualAddress, align_down};
use core::fmt;
use core::ops::{Add, AddAssign};
use kernel_layout::memory::{FRAME_SIZE, KERNEL_LOGICAL_BASE};

/// Physical memory address.
///
/// A thin wrapper around `u32` that denotes **physical** addresses. Like
/// [`VirtualAddress`], the type carries intent and prevents accidental
/// PA↔VA mix-ups.
///
/// ### Semantics
/// - [`PhysicalAddress::frame_base`] / [`PhysicalAddress::offset_in_frame`]
///   derive the frame base and in-frame offset.
/// - [`PhysicalAddress::to_logical`] produces the kernel-logical alias
///   (`KERNEL_LOGICAL_BASE + pa`), failing if the sum would wrap.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
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

    /// Base address of the frame containing this address.
    #[inline]
    #[must_use]
    pub const fn frame_base(self) -> Self {
        Self(align_down(self.0, FRAME_SIZE))
    }

    /// Offset of this address within its frame.
    #[inline]
    #[must_use]
    pub const fn offset_in_frame(self) -> u32 {
        self.0 % FRAME_SIZE
    }

    /// Whether this address sits on a frame boundary.
    #[inline]
    #[must_use]
    pub const fn is_frame_aligned(self) -> bool {
        self.offset_in_frame() == 0
    }

    /// The 20-bit frame number stored in a page-table entry.
    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> u32 {
        self.0 >> FRAME_SIZE.trailing_zeros()
    }

    /// Kernel-logical alias of this physical address.
    ///
    /// Returns `None` when `KERNEL_LOGICAL_BASE + pa` does not fit the
    /// address space, i.e. for physical memory the logical window cannot
    /// reach.
    #[inline]
    #[must_use]
    pub const fn to_logical(self) -> Option<VirtualAddress> {
        match KERNEL_LOGICAL_BASE.checked_add(self.0) {
            Some(va) => Some(VirtualAddress::new(va)),
            None => None,
        }
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:08X})", self.as_u32())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.as_u32())
    }
}

impl From<u32> for PhysicalAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl Add<u32> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}
