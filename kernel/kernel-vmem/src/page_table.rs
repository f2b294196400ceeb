use crate::PageEntry;
use kernel_layout::memory::ENTRIES_PER_TABLE;

/// One page table: 1024 entries, each mapping a 4 KiB frame.
///
/// Lives in a single frame and must be frame-aligned; the address field of
/// the directory entry pointing here has no room for low bits.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntry; ENTRIES_PER_TABLE],
}

/// One page directory: 1024 entries, each covering 4 MiB through a page
/// table.
///
/// Structurally identical to [`PageTable`], kept as a distinct type so a
/// directory frame and a table frame cannot be interchanged by accident.
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PageEntry; ENTRIES_PER_TABLE],
}

macro_rules! table_impl {
    ($ty:ty) => {
        impl $ty {
            #[inline]
            #[must_use]
            pub const fn get(&self, index: usize) -> PageEntry {
                self.entries[index]
            }

            #[inline]
            pub const fn set(&mut self, index: usize, entry: PageEntry) {
                self.entries[index] = entry;
            }

            /// Clear every entry to not-present.
            #[inline]
            pub fn zero(&mut self) {
                self.entries = [PageEntry::zero(); ENTRIES_PER_TABLE];
            }

            /// Number of present entries.
            #[must_use]
            pub fn present_count(&self) -> usize {
                self.entries.iter().filter(|e| e.present()).count()
            }
        }
    };
}

table_impl!(PageTable);
table_impl!(PageDirectory);

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(size_of::<PageDirectory>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_addresses::PhysicalAddress;

    #[test]
    fn set_get_and_present_count() {
        let mut table = PageTable {
            entries: [PageEntry::zero(); ENTRIES_PER_TABLE],
        };
        assert_eq!(table.present_count(), 0);

        table.set(3, PageEntry::kernel_rw(PhysicalAddress::new(0x8000)));
        assert_eq!(table.present_count(), 1);
        assert_eq!(
            table.get(3).physical_address(),
            PhysicalAddress::new(0x8000)
        );

        table.zero();
        assert_eq!(table.present_count(), 0);
    }
}
