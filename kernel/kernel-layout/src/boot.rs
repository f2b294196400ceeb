//! # Kernel Boot Information

use crate::memory::{DEFAULT_RESERVED_LOW, FRAME_SIZE};

/// Information the core receives at start-of-day.
///
/// The boot stage reports how much physical memory is usable and where the
/// kernel image was placed; every bitmap and allocator bound is computed
/// from these values. Keep this `#[repr(C)]`: it crosses the boot ABI
/// boundary.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct BootInfo {
    /// Total usable physical memory in bytes.
    pub total_memory: u32,

    /// Physical address of the first byte of the kernel image.
    pub kernel_start: u32,

    /// Physical address one past the last byte of the kernel image.
    pub kernel_end: u32,

    /// Size of the reserved low region in bytes. Frames below this address
    /// are never handed out.
    pub reserved_low: u32,
}

impl BootInfo {
    /// Boot handoff with the default reserved low region.
    #[must_use]
    pub const fn new(total_memory: u32, kernel_start: u32, kernel_end: u32) -> Self {
        Self {
            total_memory,
            kernel_start,
            kernel_end,
            reserved_low: DEFAULT_RESERVED_LOW,
        }
    }

    /// Same handoff with an explicit reserved low region.
    #[must_use]
    pub const fn with_reserved_low(mut self, reserved_low: u32) -> Self {
        self.reserved_low = reserved_low;
        self
    }

    /// Number of frames the frame allocator manages (those above the
    /// reserved low region).
    #[must_use]
    pub const fn managed_frames(&self) -> usize {
        if self.total_memory <= self.reserved_low {
            return 0;
        }
        ((self.total_memory - self.reserved_low) / FRAME_SIZE) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_frames_excludes_reserved_region() {
        let boot = BootInfo::new(16 * 1024 * 1024, 0x0010_0000, 0x0018_0000);
        // 16 MiB total minus 2 MiB reserved, in 4 KiB frames.
        assert_eq!(boot.managed_frames(), (14 * 1024 * 1024) / 4096);
    }

    #[test]
    fn tiny_memory_yields_no_frames() {
        let boot = BootInfo::new(1024 * 1024, 0, 0);
        assert_eq!(boot.managed_frames(), 0);
    }
}
