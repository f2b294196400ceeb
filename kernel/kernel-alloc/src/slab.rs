//! Slab allocator: fixed 64-byte sub-frame allocation units.
//!
//! The managed region stores its own bookkeeping. The first slabs of the
//! region hold one [`SlabNode`] per slab; the remainder is allocatable:
//!
//! ```text
//! +---------------------+------------------------------------+
//! | node array          |        allocatable slabs           |
//! +---------------------+------------------------------------+
//! ^ region              ^ region + reserved_slabs * SLAB_SIZE
//! ```
//!
//! Nodes covering the reserved prefix are created non-free and never
//! released, so the allocator cannot hand out its own bookkeeping.

use crate::hhdm::nodes_in_region;
use kernel_addresses::PhysicalAddress;
use kernel_layout::memory::SLAB_SIZE;
use kernel_vmem::PhysMapper;
use thiserror::Error;

/// Failures of the slab layer.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum SlabError {
    /// The region cannot hold the node array plus at least one slab.
    #[error("region of {0} bytes is too small for bookkeeping plus one slab")]
    RegionTooSmall(usize),

    /// No sufficiently long run of contiguous free slabs exists.
    #[error("no run of {0} contiguous free slabs")]
    Exhausted(usize),

    /// The address does not denote a slab inside the managed region.
    #[error("address {0} is not a managed slab base")]
    OutOfRange(PhysicalAddress),

    /// Some slab in the range was already free; nothing was flipped.
    #[error("free of a slab run that is not fully allocated (double free?)")]
    NotAllocated,

    /// Zero-length requests are a caller bug.
    #[error("slab count must be non-zero")]
    ZeroCount,
}

/// Bookkeeping for one slab, stored inside the managed region.
///
/// The node array is ordered by slab address, so the successor link of the
/// original intrusive list is simply the next array element.
#[repr(C)]
pub(crate) struct SlabNode {
    /// Base address of the slab this node describes.
    pub(crate) addr: u32,
    /// Whether the slab is currently allocatable.
    pub(crate) free: bool,
}

/// Slab allocator over one contiguous region.
///
/// # Invariants
/// - The node array is exactly as long as the number of slabs in the
///   region; node `i` describes slab `i`.
/// - A `k`-slab request needs a run of `k` contiguous free nodes, and the
///   whole run is flipped to satisfy it.
/// - [`free_mem_size`](Self::free_mem_size) counts total free bytes,
///   independent of fragmentation; it is not the largest allocatable run.
#[derive(Debug)]
pub struct SlabAllocator {
    region: PhysicalAddress,
    total_slabs: usize,
    /// Slabs at the start of the region holding the node array.
    reserved_slabs: usize,
    free_bytes: usize,
}

impl SlabAllocator {
    /// Take ownership of `region_size` bytes at `region` and write the
    /// node array into its prefix.
    ///
    /// # Errors
    /// `RegionTooSmall` unless the region holds the node array and at
    /// least one allocatable slab.
    pub fn init<M: PhysMapper>(
        mapper: &M,
        region: PhysicalAddress,
        region_size: usize,
    ) -> Result<Self, SlabError> {
        let total_slabs = region_size / SLAB_SIZE as usize;
        let node_bytes = total_slabs * size_of::<SlabNode>();
        let reserved_slabs = node_bytes.div_ceil(SLAB_SIZE as usize);
        if total_slabs <= reserved_slabs {
            return Err(SlabError::RegionTooSmall(region_size));
        }

        // SAFETY: the caller hands the region over exclusively; the node
        // array fits the reserved prefix by construction.
        let nodes = unsafe { nodes_in_region::<M, SlabNode>(mapper, region, total_slabs) };
        for (i, node) in nodes.iter_mut().enumerate() {
            *node = SlabNode {
                addr: region.as_u32() + (i as u32) * SLAB_SIZE,
                free: i >= reserved_slabs,
            };
        }

        let free_bytes = (total_slabs - reserved_slabs) * SLAB_SIZE as usize;
        log::info!(
            "slab allocator: {total_slabs} slabs at {region}, {reserved_slabs} reserved for bookkeeping"
        );
        Ok(Self {
            region,
            total_slabs,
            reserved_slabs,
            free_bytes,
        })
    }

    /// Allocate `n_slabs` contiguous slabs.
    ///
    /// Walks the node array for the first run of `n_slabs` consecutive
    /// free nodes, flips the whole run, and returns the first slab's
    /// address.
    ///
    /// # Errors
    /// `Exhausted` when no sufficiently long run exists anywhere.
    pub fn alloc<M: PhysMapper>(
        &mut self,
        mapper: &M,
        n_slabs: usize,
    ) -> Result<PhysicalAddress, SlabError> {
        if n_slabs == 0 {
            return Err(SlabError::ZeroCount);
        }
        if n_slabs > self.total_slabs - self.reserved_slabs {
            return Err(SlabError::Exhausted(n_slabs));
        }

        let nodes = self.nodes_mut(mapper);
        let mut run = 0usize;
        for i in self.reserved_slabs..self.total_slabs {
            if !nodes[i].free {
                run = 0;
                continue;
            }
            run += 1;
            if run == n_slabs {
                let start = i + 1 - n_slabs;
                for node in &mut nodes[start..=i] {
                    node.free = false;
                }
                self.free_bytes -= n_slabs * SLAB_SIZE as usize;
                return Ok(PhysicalAddress::new(nodes[start].addr));
            }
        }
        Err(SlabError::Exhausted(n_slabs))
    }

    /// Free `n_slabs` slabs starting at `addr`.
    ///
    /// # Errors
    /// The node matching `addr` and the following `n_slabs - 1` nodes must
    /// all be non-free; a corrupted or partial free is rejected outright
    /// and nothing is flipped.
    pub fn free<M: PhysMapper>(
        &mut self,
        mapper: &M,
        addr: PhysicalAddress,
        n_slabs: usize,
    ) -> Result<(), SlabError> {
        if n_slabs == 0 {
            return Err(SlabError::ZeroCount);
        }
        let offset = addr
            .as_u32()
            .checked_sub(self.region.as_u32())
            .ok_or(SlabError::OutOfRange(addr))?;
        if offset % SLAB_SIZE != 0 {
            return Err(SlabError::OutOfRange(addr));
        }
        let index = (offset / SLAB_SIZE) as usize;
        if index < self.reserved_slabs || index + n_slabs > self.total_slabs {
            return Err(SlabError::OutOfRange(addr));
        }

        let nodes = self.nodes_mut(mapper);
        // Validate first, mutate after.
        if nodes[index..index + n_slabs].iter().any(|n| n.free) {
            return Err(SlabError::NotAllocated);
        }
        for node in &mut nodes[index..index + n_slabs] {
            node.free = true;
        }
        self.free_bytes += n_slabs * SLAB_SIZE as usize;
        Ok(())
    }

    /// Total free bytes, independent of fragmentation.
    #[inline]
    #[must_use]
    pub const fn free_mem_size(&self) -> usize {
        self.free_bytes
    }

    /// Base address of the managed region.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> PhysicalAddress {
        self.region
    }

    /// Whether `addr` lies inside the managed region.
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        let start = self.region.as_u32();
        let end = start + (self.total_slabs as u32) * SLAB_SIZE;
        (start..end).contains(&addr.as_u32())
    }

    fn nodes_mut<'a, M: PhysMapper>(&self, mapper: &M) -> &'a mut [SlabNode] {
        // SAFETY: init wrote exactly total_slabs nodes at the region start,
        // and the allocator has exclusive ownership of the region.
        unsafe { nodes_in_region::<M, SlabNode>(mapper, self.region, self.total_slabs) }
    }
}
