//! # Typed Memory Addresses
//!
//! Small newtypes that keep physical addresses, virtual addresses, and frame
//! indices from being mixed up. All address arithmetic in the workspace goes
//! through these types; raw `u32` casts appear only at the hardware and
//! mapper boundaries.
//!
//! - [`PhysicalAddress`]: host RAM, what the frame allocator hands out and
//!   what page-table entries store.
//! - [`VirtualAddress`]: what code dereferences; carries the directory/table
//!   index split used by the two-level paging walk.
//! - [`FrameIndex`]: position of a frame in the frame bitmap; converts to
//!   and from [`PhysicalAddress`] only relative to an explicit base.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod frame_index;
mod physical_address;
mod virtual_address;

pub use frame_index::FrameIndex;
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Align `value` downwards to `align` (must be a power of two).
#[inline]
#[must_use]
pub const fn align_down(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Align `value` upwards to `align` (must be a power of two).
#[inline]
#[must_use]
pub const fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(0x1234, 0x1000), 0x1000);
        assert_eq!(align_up(0x1234, 0x1000), 0x2000);
        assert_eq!(align_up(0x1000, 0x1000), 0x1000);
    }
}
