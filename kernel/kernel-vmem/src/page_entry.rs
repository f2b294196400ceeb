use bitfield_struct::bitfield;
use kernel_addresses::PhysicalAddress;
use kernel_layout::memory::FRAME_SIZE;

/// A single 32-bit page-directory or page-table entry in raw bitfield form.
///
/// The same layout serves both levels: in a directory a present entry
/// points at a page-table frame, in a table a present entry maps one 4 KiB
/// frame. `dirty` is meaningful only for table (leaf) entries.
///
/// ### Bit layout
///
/// | Bits  | Name / Mnemonic | Meaning |
/// |-------|-----------------|----------|
/// | 0     | `P` (present)   | Valid entry if set |
/// | 1     | `RW`            | Writable if set |
/// | 2     | `US`            | User-mode accessible if set |
/// | 3     | `PWT`           | Write-through caching |
/// | 4     | `PCD`           | Disable caching |
/// | 5     | `A`             | Accessed |
/// | 6     | `D`             | Dirty (leaf only) |
/// | 7     | `PS`            | Large page flag |
/// | 8     | `G`             | Global (leaf only) |
/// | 9–11  | OS avail        | Reserved for OS use |
/// | 12–31 | frame           | Physical frame bits [31:12] |
///
/// The physical address field omits the low 12 bits, which are implicitly
/// zero due to frame alignment.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntry {
    /// Present (P, bit 0).
    ///
    /// Set iff the entry points at a valid table frame or maps a valid
    /// frame. Clear means any access through the entry faults.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow user-mode access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5).
    ///
    /// Set by the CPU on first access through this entry. Software may
    /// clear it to track usage.
    pub accessed: bool,

    /// Dirty (D, bit 6). **Leaf only.**
    ///
    /// Set by the CPU on first write through a table entry. Ignored in
    /// directory entries.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Always clear here; this kernel maps 4 KiB
    /// pages only.
    pub large_page: bool,

    /// Global (G, bit 8). Leaf only.
    pub global_translation: bool,

    /// OS-available (bits 9..=11). Hardware does not interpret these.
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame bits [31:12] (bits 12..=31).
    ///
    /// Stores the frame-aligned physical address without the low 12 bits.
    /// Reconstruct the full address as `bits << 12`.
    #[bits(20)]
    frame_bits_31_12: u32,
}

impl PageEntry {
    /// Store the frame base of `phys` in the 20-bit address field.
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_frame_bits_31_12(phys.as_u32() >> FRAME_SIZE.trailing_zeros());
    }

    /// Physical frame base this entry refers to.
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.frame_bits_31_12() << FRAME_SIZE.trailing_zeros())
    }

    /// Builder variant of [`set_physical_address`](Self::set_physical_address).
    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, phys: PhysicalAddress) -> Self {
        self.with_frame_bits_31_12(phys.as_u32() >> FRAME_SIZE.trailing_zeros())
    }

    /// Present + writable supervisor entry for `phys`, the shape used for
    /// kernel mappings and next-level table links alike.
    #[inline]
    #[must_use]
    pub const fn kernel_rw(phys: PhysicalAddress) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(false)
            .with_physical_address(phys)
    }

    /// An all-zero, not-present entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }
}
