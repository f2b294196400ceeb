use crate::PhysicalAddress;
use core::fmt;
use kernel_layout::memory::FRAME_SIZE;

/// Position of a frame in the frame bitmap.
///
/// Frame indices are only meaningful relative to the bitmap's base address
/// (the first managed frame), so conversions require that base explicitly.
/// This keeps "index zero" from being conflated with "physical address
/// zero".
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameIndex(u32);

impl FrameIndex {
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

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Physical base address of this frame, relative to `base`.
    #[inline]
    #[must_use]
    pub const fn base_address(self, base: PhysicalAddress) -> PhysicalAddress {
        PhysicalAddress::new(base.as_u32() + self.0 * FRAME_SIZE)
    }

    /// Index of the frame containing `pa`, relative to `base`.
    ///
    /// Returns `None` when `pa` lies below the base or is not frame-aligned.
    #[inline]
    #[must_use]
    pub const fn from_address(pa: PhysicalAddress, base: PhysicalAddress) -> Option<Self> {
        if pa.as_u32() < base.as_u32() || !pa.is_frame_aligned() {
            return None;
        }
        Some(Self((pa.as_u32() - base.as_u32()) / FRAME_SIZE))
    }
}

impl fmt::Debug for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trip() {
        let base = PhysicalAddress::new(0x0020_0000);
        let idx = FrameIndex::new(3);
        let pa = idx.base_address(base);
        assert_eq!(pa, PhysicalAddress::new(0x0020_3000));
        assert_eq!(FrameIndex::from_address(pa, base), Some(idx));
    }

    #[test]
    fn rejects_below_base_and_unaligned() {
        let base = PhysicalAddress::new(0x0020_0000);
        assert!(FrameIndex::from_address(PhysicalAddress::new(0x0010_0000), base).is_none());
        assert!(FrameIndex::from_address(PhysicalAddress::new(0x0020_0042), base).is_none());
    }
}
