//! # Address Space (two-level, directory-rooted)
//!
//! Strongly-typed helpers to build and manipulate a **single** virtual
//! address space rooted at a page directory.
//!
//! ## Highlights
//!
//! - [`AddressSpace::create`] builds the boot address space: directory
//!   frame, identity map of the reserved low region, kernel image mapped at
//!   the logical offset, self-map installed in the last directory slot.
//! - [`AddressSpace::map_kernel_logical`] / [`AddressSpace::map_kernel_virtual`]
//!   install single mappings, creating the backing page table on demand.
//! - [`AddressSpace::query`] translates a VA to a PA.
//! - [`AddressSpace::enable`] performs the one-way paging transition.
//!
//! ## Design
//!
//! - Page-table frames are reached through the caller-provided
//!   [`PhysMapper`]; `unsafe` stays confined to that translation.
//! - The boundary invariants (no null page, nothing below the
//!   kernel-logical base, no frame zero, nothing in the self-map window)
//!   are enforced here, at the call boundary, as hard errors.

use crate::{FrameAlloc, PageDirectory, PageEntry, PageTable, PagingError, PhysMapper};
use kernel_addresses::{PhysicalAddress, VirtualAddress, align_up};
use kernel_layout::boot::BootInfo;
use kernel_layout::memory::{FRAME_SIZE, SELF_MAP_SLOT};

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    /// Frame holding the page directory.
    root: PhysicalAddress,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Build the boot address space.
    ///
    /// Allocates the directory frame, installs the self-map, identity-maps
    /// the reserved low region (minus the null page, which stays unmapped
    /// on purpose), and maps the kernel image's physical range at the
    /// logical offset.
    ///
    /// # Errors
    /// `PagingError::Exhausted` when the very first frame cannot be
    /// allocated; the caller treats that as fatal, since no fallback
    /// allocator exists beneath the frame allocator.
    pub fn create<A: FrameAlloc>(
        mapper: &'m M,
        alloc: &mut A,
        boot: &BootInfo,
    ) -> Result<Self, PagingError> {
        let root = alloc.alloc_frame().ok_or(PagingError::Exhausted)?;
        let mut space = Self { root, mapper };
        space.directory_mut().zero();

        // Self-map: the last slot points at the directory's own frame,
        // turning the directory into the page table for the top 4 MiB.
        space
            .directory_mut()
            .set(SELF_MAP_SLOT, PageEntry::kernel_rw(root));

        // Identity map for the low region used before relocation. Frame
        // zero is skipped so null dereferences keep faulting.
        let mut pa = FRAME_SIZE;
        while pa < boot.reserved_low {
            let addr = PhysicalAddress::new(pa);
            space.map_any(alloc, VirtualAddress::new(pa), addr)?;
            pa += FRAME_SIZE;
        }

        // Kernel image at the logical offset.
        let mut pa = PhysicalAddress::new(boot.kernel_start).frame_base().as_u32();
        let end = align_up(boot.kernel_end, FRAME_SIZE);
        while pa < end {
            space.map_kernel_logical(alloc, PhysicalAddress::new(pa))?;
            pa += FRAME_SIZE;
        }

        log::info!(
            "address space rooted at {root}: low identity map to {low:#x}, kernel image {start:#x}..{end:#x}",
            low = boot.reserved_low,
            start = boot.kernel_start,
        );
        Ok(space)
    }

    /// View an address space whose directory frame already exists.
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysicalAddress) -> Self {
        Self { root, mapper }
    }

    /// Physical frame of the page directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Map `KERNEL_LOGICAL_BASE + pa → pa` and return the logical address.
    ///
    /// # Errors
    /// `NoLogicalAlias` when `pa` lies beyond the logical window;
    /// allocation failures propagate from table creation.
    pub fn map_kernel_logical<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        pa: PhysicalAddress,
    ) -> Result<VirtualAddress, PagingError> {
        let va = pa.to_logical().ok_or(PagingError::NoLogicalAlias(pa))?;
        self.map_any(alloc, va, pa)?;
        Ok(va)
    }

    /// Map one kernel-half page at `va → pa`.
    ///
    /// # Errors
    /// Rejects the null page, addresses below the kernel-logical base,
    /// physical frame zero, and the self-map window outright; these are
    /// invariant violations, not recoverable conditions. Table-frame
    /// exhaustion propagates as `Exhausted`.
    pub fn map_kernel_virtual<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
    ) -> Result<(), PagingError> {
        if va.is_null_page() {
            return Err(PagingError::NullPage(va));
        }
        if !va.is_kernel() {
            return Err(PagingError::BelowKernelBase(va));
        }
        if pa.frame_number() == 0 {
            return Err(PagingError::ZeroFrame);
        }
        self.map_any(alloc, va, pa)
    }

    /// Install `va → pa` without the kernel-half boundary checks.
    ///
    /// Used by [`create`](Self::create) for the identity map; everything
    /// else goes through the checked entry points. The self-map window
    /// stays off limits even here.
    fn map_any<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
    ) -> Result<(), PagingError> {
        let di = va.directory_index();
        if di == SELF_MAP_SLOT {
            return Err(PagingError::SelfMapReserved(va));
        }

        let entry = self.directory_mut().get(di);
        let table_pa = if entry.present() {
            entry.physical_address()
        } else {
            // First mapping to touch this 4 MiB region: create the table.
            let frame = alloc.alloc_frame().ok_or(PagingError::Exhausted)?;
            self.table_mut(frame).zero();
            self.directory_mut().set(di, PageEntry::kernel_rw(frame));
            log::debug!("new page table {frame} for directory slot {di}");
            frame
        };

        self.table_mut(table_pa)
            .set(va.table_index(), PageEntry::kernel_rw(pa.frame_base()));
        Ok(())
    }

    /// Translate a `VirtualAddress` to a `PhysicalAddress` if mapped.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let entry = self.directory_ref().get(va.directory_index());
        if !entry.present() {
            return None;
        }
        let leaf = self.table_ref(entry.physical_address()).get(va.table_index());
        if !leaf.present() {
            return None;
        }
        Some(leaf.physical_address() + va.offset_in_page())
    }

    /// Clear the leaf entry for `va`.
    ///
    /// # Errors
    /// `NotMapped` when no present mapping exists there.
    pub fn unmap(&mut self, va: VirtualAddress) -> Result<(), PagingError> {
        let entry = self.directory_mut().get(va.directory_index());
        if !entry.present() {
            return Err(PagingError::NotMapped(va));
        }
        let table = self.table_mut(entry.physical_address());
        if !table.get(va.table_index()).present() {
            return Err(PagingError::NotMapped(va));
        }
        table.set(va.table_index(), PageEntry::zero());
        Ok(())
    }

    /// Number of live page tables (present directory entries, self-map
    /// excluded).
    #[must_use]
    pub fn table_count(&self) -> usize {
        let dir = self.directory_ref();
        (0..SELF_MAP_SLOT).filter(|&i| dir.get(i).present()).count()
    }

    /// Raw directory entry, for diagnostics and tests.
    #[must_use]
    pub fn directory_entry(&self, index: usize) -> PageEntry {
        self.directory_ref().get(index)
    }

    /// Load the directory into the page-base register and set the paging
    /// bits. One-way: paging is never disabled again during normal
    /// operation.
    ///
    /// # Safety
    /// Every address the CPU will touch afterwards (code, stack, and data)
    /// must already be mapped in this space. Must run privileged.
    pub unsafe fn enable(&self) {
        let root = u64::from(self.root.as_u32());
        let bits: u64 = (1 << 31) | (1 << 16); // PG | WP
        unsafe {
            core::arch::asm!(
                "mov cr3, {root}",
                "mov {tmp}, cr0",
                "or {tmp}, {bits}",
                "mov cr0, {tmp}",
                root = in(reg) root,
                bits = in(reg) bits,
                tmp = out(reg) _,
                options(nostack, preserves_flags)
            );
        }
    }

    fn directory_mut(&mut self) -> &mut PageDirectory {
        // SAFETY: root is the directory frame owned by this address space.
        unsafe { self.mapper.phys_to_mut(self.root) }
    }

    fn directory_ref(&self) -> &PageDirectory {
        // SAFETY: as above; shared read of the owned directory frame.
        unsafe { self.mapper.phys_to_mut(self.root) }
    }

    fn table_mut(&mut self, frame: PhysicalAddress) -> &mut PageTable {
        // SAFETY: frame was installed as a page table by this space.
        unsafe { self.mapper.phys_to_mut(frame) }
    }

    fn table_ref(&self, frame: PhysicalAddress) -> &PageTable {
        // SAFETY: as above.
        unsafe { self.mapper.phys_to_mut(frame) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_layout::memory::KERNEL_LOGICAL_BASE;
    use std::alloc::{Layout, alloc_zeroed};

    /// Simulated physical memory: a frame-aligned host buffer standing in
    /// for the range starting at `phys_base`.
    struct BufMapper {
        buf: *mut u8,
        phys_base: u32,
    }

    impl BufMapper {
        fn new(phys_base: u32, frames: usize) -> Self {
            let layout = Layout::from_size_align(frames * 4096, 4096).unwrap();
            let buf = unsafe { alloc_zeroed(layout) };
            assert!(!buf.is_null());
            Self { buf, phys_base }
        }
    }

    impl PhysMapper for BufMapper {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let off = (pa.as_u32() - self.phys_base) as usize;
            unsafe { &mut *self.buf.add(off).cast::<T>() }
        }
    }

    struct BumpAlloc {
        next: u32,
        end: u32,
        handed_out: usize,
    }

    impl BumpAlloc {
        fn new(base: u32, frames: usize) -> Self {
            Self {
                next: base,
                end: base + (frames as u32) * FRAME_SIZE,
                handed_out: 0,
            }
        }
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_frame(&mut self) -> Option<PhysicalAddress> {
            if self.next >= self.end {
                return None;
            }
            let pa = self.next;
            self.next += FRAME_SIZE;
            self.handed_out += 1;
            Some(PhysicalAddress::new(pa))
        }
    }

    const PHYS_BASE: u32 = 0x0020_0000;

    fn boot_space<'m>(mapper: &'m BufMapper, alloc: &mut BumpAlloc) -> AddressSpace<'m, BufMapper> {
        let boot = BootInfo::new(16 * 1024 * 1024, 0x0010_0000, 0x0010_4000);
        AddressSpace::create(mapper, alloc, &boot).expect("boot address space")
    }

    #[test]
    fn create_installs_self_map() {
        let mapper = BufMapper::new(PHYS_BASE, 32);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 32);
        let space = boot_space(&mapper, &mut alloc);

        let e = space.directory_entry(SELF_MAP_SLOT);
        assert!(e.present());
        assert!(e.writable());
        assert_eq!(e.physical_address(), space.root());
    }

    #[test]
    fn create_identity_maps_low_region_except_null_page() {
        let mapper = BufMapper::new(PHYS_BASE, 32);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 32);
        let space = boot_space(&mapper, &mut alloc);

        assert_eq!(
            space.query(VirtualAddress::new(0x1000)),
            Some(PhysicalAddress::new(0x1000))
        );
        assert_eq!(
            space.query(VirtualAddress::new(0x001F_F123)),
            Some(PhysicalAddress::new(0x001F_F123))
        );
        assert_eq!(space.query(VirtualAddress::zero()), None);
    }

    #[test]
    fn create_maps_kernel_image_at_logical_offset() {
        let mapper = BufMapper::new(PHYS_BASE, 32);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 32);
        let space = boot_space(&mapper, &mut alloc);

        assert_eq!(
            space.query(VirtualAddress::new(KERNEL_LOGICAL_BASE + 0x0010_0000)),
            Some(PhysicalAddress::new(0x0010_0000))
        );
    }

    #[test]
    fn first_mapping_in_fresh_region_creates_exactly_one_table() {
        let mapper = BufMapper::new(PHYS_BASE, 32);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 32);
        let mut space = boot_space(&mapper, &mut alloc);

        let before_tables = space.table_count();
        let before_frames = alloc.handed_out;

        // An untouched 4 MiB region well above the kernel image mappings.
        let va = VirtualAddress::new(0xD000_0000);
        space
            .map_kernel_virtual(&mut alloc, va, PhysicalAddress::new(0x0060_0000))
            .unwrap();
        assert_eq!(space.table_count(), before_tables + 1);
        assert_eq!(alloc.handed_out, before_frames + 1);

        // Second mapping in the same region: no further table frames.
        space
            .map_kernel_virtual(
                &mut alloc,
                va + FRAME_SIZE,
                PhysicalAddress::new(0x0060_1000),
            )
            .unwrap();
        assert_eq!(space.table_count(), before_tables + 1);
        assert_eq!(alloc.handed_out, before_frames + 1);
    }

    #[test]
    fn boundary_invariants_are_hard_errors() {
        let mapper = BufMapper::new(PHYS_BASE, 32);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 32);
        let mut space = boot_space(&mapper, &mut alloc);

        let pa = PhysicalAddress::new(0x0060_0000);

        let null = VirtualAddress::new(0x800);
        assert_eq!(
            space.map_kernel_virtual(&mut alloc, null, pa),
            Err(PagingError::NullPage(null))
        );

        let low = VirtualAddress::new(0x4000_0000);
        assert_eq!(
            space.map_kernel_virtual(&mut alloc, low, pa),
            Err(PagingError::BelowKernelBase(low))
        );

        assert_eq!(
            space.map_kernel_virtual(
                &mut alloc,
                VirtualAddress::new(0xD000_0000),
                PhysicalAddress::new(0x0123)
            ),
            Err(PagingError::ZeroFrame)
        );

        let self_map = VirtualAddress::new(0xFFC0_1000);
        assert_eq!(
            space.map_kernel_virtual(&mut alloc, self_map, pa),
            Err(PagingError::SelfMapReserved(self_map))
        );
    }

    #[test]
    fn unmap_clears_leaf_and_rejects_missing() {
        let mapper = BufMapper::new(PHYS_BASE, 32);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 32);
        let mut space = boot_space(&mapper, &mut alloc);

        let va = VirtualAddress::new(0xD000_0000);
        space
            .map_kernel_virtual(&mut alloc, va, PhysicalAddress::new(0x0060_0000))
            .unwrap();
        assert!(space.query(va).is_some());

        space.unmap(va).unwrap();
        assert_eq!(space.query(va), None);
        assert_eq!(space.unmap(va), Err(PagingError::NotMapped(va)));

        // A region no table was ever created for.
        let untouched = VirtualAddress::new(0xE000_0000);
        assert_eq!(space.unmap(untouched), Err(PagingError::NotMapped(untouched)));
    }

    #[test]
    fn table_exhaustion_reports_exhausted() {
        let mapper = BufMapper::new(PHYS_BASE, 8);
        let mut alloc = BumpAlloc::new(PHYS_BASE, 8);
        let mut space = boot_space(&mapper, &mut alloc);

        // Burn the remaining frames on fresh 4 MiB regions.
        let mut va = 0xD000_0000_u32;
        loop {
            match space.map_kernel_virtual(
                &mut alloc,
                VirtualAddress::new(va),
                PhysicalAddress::new(0x0060_0000),
            ) {
                Ok(()) => va += 4 * 1024 * 1024,
                Err(e) => {
                    assert_eq!(e, PagingError::Exhausted);
                    break;
                }
            }
        }
    }
}
