//! Pool allocator for fixed-size objects
//!
//! # Safety
//!
//! The region is cut into equal slots after aligning the first one:
//! - `object_size` is a multiple of `object_align`, so aligning the first
//!   slot aligns all of them
//! - Free slots form an intrusive list (see [`free_list`]); a slot is
//!   either on the list or handed out, never both
//! - Deallocation only accepts addresses on a slot boundary inside the slot
//!   area
//!
//! ## Invariants
//!
//! - `used_memory == (slot_count - free_slots) * object_size`
//! - Requests larger than a slot or stricter than its alignment are refused
//!   rather than truncated

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

use super::base::{Allocator, Usage};
use super::config::AllocatorConfig;
use super::region::Region;
use super::traits::Strategy;
use crate::error::{AllocError, AllocResult};
use crate::utils::{adjustment, is_power_of_two};

mod free_list;

use free_list::{FreeList, SlotArea};

/// Fixed-slot allocator over one region
///
/// # Examples
/// ```
/// use region_alloc::allocator::PoolAllocator;
///
/// let mut pool = PoolAllocator::with_slots::<u64>(4)?;
/// assert_eq!(pool.slot_count(), 4);
///
/// let slot = pool.allocate(7u64)?.expect("free slot");
/// assert_eq!(pool.free_slots(), 3);
///
/// unsafe { pool.deallocate(slot.as_ptr())? };
/// assert_eq!(pool.free_slots(), 4);
/// # Ok::<(), region_alloc::error::AllocError>(())
/// ```
pub type PoolAllocator<'r> = Allocator<'r, Pool>;

/// Fixed-slot strategy state
#[derive(Debug)]
pub struct Pool {
    slots: SlotArea,
    object_align: usize,
    free: FreeList,
    dealloc_pattern: Option<u8>,
}

impl Pool {
    fn new(
        region: &Region<'_>,
        object_size: usize,
        object_align: usize,
        slot_limit: Option<usize>,
        config: &AllocatorConfig,
    ) -> AllocResult<Self> {
        if object_size == 0 {
            return Err(AllocError::invalid_config(
                "object_size > 0",
                "pool object size must be larger than 0",
            ));
        }
        if !is_power_of_two(object_align) {
            return Err(AllocError::invalid_alignment(object_align));
        }
        if object_size % object_align != 0 {
            return Err(AllocError::invalid_config(
                "object_size % object_align == 0",
                &format!("pool object size {object_size} is not a multiple of its alignment {object_align}"),
            ));
        }

        let leading = adjustment(region.start_addr(), object_align);
        let width = FreeList::link_width(object_size);
        let wanted = (region.size().saturating_sub(leading) / object_size)
            .min(slot_limit.unwrap_or(usize::MAX));
        let count = wanted.min(FreeList::max_slots(width));
        if count == 0 {
            return Err(AllocError::invalid_config(
                "slot_count > 0",
                &format!("region of {} bytes holds no {object_size}-byte slot", region.size()),
            ));
        }

        #[cfg(feature = "logging")]
        if count < wanted {
            warn!(
                object_size,
                link_width = width,
                requested = wanted,
                slots = count,
                "pool slot count capped by free-list link width"
            );
        }

        let slots = SlotArea {
            first: region.start_addr() + leading,
            object_size,
            count,
        };
        // SAFETY: `count` slots fit after `leading` bytes of padding, and a
        // fresh region holds no values.
        let free = unsafe { FreeList::thread(region, &slots, width) };

        #[cfg(feature = "logging")]
        debug!(object_size, object_align, slots = count, leading, "pool threaded");

        Ok(Self {
            slots,
            object_align,
            free,
            dealloc_pattern: config.dealloc_pattern,
        })
    }
}

impl Strategy for Pool {
    const NAME: &'static str = "pool";

    fn allocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        if size > self.slots.object_size {
            return Err(AllocError::invalid_layout(
                "size <= object_size",
                &format!(
                    "{size} bytes requested from a pool of {}-byte slots",
                    self.slots.object_size
                ),
            ));
        }
        if align > self.object_align {
            return Err(AllocError::invalid_layout(
                "align <= object_align",
                &format!(
                    "alignment {align} requested from a pool aligned to {}",
                    self.object_align
                ),
            ));
        }

        // SAFETY: The list was threaded through `self.slots`.
        let Some(index) = (unsafe { self.free.pop(region, &self.slots) }) else {
            return Ok(None);
        };
        usage.record_allocation(self.slots.object_size);

        Ok(Some(region.block_at(self.slots.address(index))))
    }

    fn validate(&self, _region: &Region<'_>, ptr: NonNull<u8>) -> AllocResult<()> {
        let address = ptr.as_ptr() as usize;
        if self.slots.index_of(address).is_none() {
            return Err(AllocError::invalid_pointer(address));
        }
        if self.free.len() == self.slots.count {
            return Err(AllocError::invalid_state(
                "free_slots < slot_count",
                "no slot of this pool is in use",
            ));
        }
        Ok(())
    }

    unsafe fn deallocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        ptr: NonNull<u8>,
    ) -> AllocResult<()> {
        self.validate(region, ptr)?;
        let address = ptr.as_ptr() as usize;
        let Some(index) = self.slots.index_of(address) else {
            return Err(AllocError::invalid_pointer(address));
        };

        if let Some(pattern) = self.dealloc_pattern {
            // SAFETY: The slot is being released and holds no live value.
            unsafe { region.fill(address, self.slots.object_size, pattern) };
        }
        // SAFETY: Slot `index` was handed out by `allocate` (caller contract).
        unsafe { self.free.push(region, &self.slots, index) };
        usage.record_deallocation(self.slots.object_size);

        Ok(())
    }
}

impl Allocator<'static, Pool> {
    /// Creates a pool of `object_size`-byte slots over `size` bytes of owned
    /// memory
    pub fn new(size: usize, object_size: usize, object_align: usize) -> AllocResult<Self> {
        Self::with_config(
            Region::acquire(size)?,
            object_size,
            object_align,
            AllocatorConfig::default(),
        )
    }

    /// Creates a pool of `T`-sized slots over `size` bytes of owned memory
    pub fn for_type<T>(size: usize) -> AllocResult<Self> {
        Self::new(size, size_of::<T>(), align_of::<T>())
    }

    /// Creates a pool holding exactly `slots` values of `T`
    ///
    /// The region is sized `slots * size_of::<T>() + align_of::<T>()` so the
    /// leading alignment never costs a slot.
    pub fn with_slots<T>(slots: usize) -> AllocResult<Self> {
        let size = slots
            .checked_mul(size_of::<T>())
            .and_then(|bytes| bytes.checked_add(align_of::<T>()))
            .ok_or_else(|| AllocError::size_overflow("pool sizing"))?;
        let region = Region::acquire(size)?;
        let config = AllocatorConfig::default();
        let strategy = Pool::new(
            &region,
            size_of::<T>(),
            align_of::<T>(),
            Some(slots),
            &config,
        )?;
        Ok(Self::from_parts(region, config, strategy))
    }
}

impl<'r> Allocator<'r, Pool> {
    /// Creates a pool over a caller-provided buffer
    pub fn from_slice(
        buffer: &'r mut [u8],
        object_size: usize,
        object_align: usize,
    ) -> AllocResult<Self> {
        Self::with_config(
            Region::borrowed(buffer)?,
            object_size,
            object_align,
            AllocatorConfig::default(),
        )
    }

    /// Creates a pool of `T`-sized slots over a caller-provided buffer
    pub fn from_slice_for<T>(buffer: &'r mut [u8]) -> AllocResult<Self> {
        Self::from_slice(buffer, size_of::<T>(), align_of::<T>())
    }

    /// Creates a pool over `region` with an explicit configuration
    ///
    /// Slots narrower than 8 bytes hold shorter free-list links, which caps
    /// the slot count (255 one-byte slots, 65535 two-byte slots); a capped
    /// pool logs a warning.
    pub fn with_config(
        region: Region<'r>,
        object_size: usize,
        object_align: usize,
        config: AllocatorConfig,
    ) -> AllocResult<Self> {
        let strategy = Pool::new(&region, object_size, object_align, None, &config)?;
        Ok(Self::from_parts(region, config, strategy))
    }

    /// Number of slots carved from the region
    pub fn slot_count(&self) -> usize {
        self.parts_locked().2.strategy.slots.count
    }

    /// Slots currently on the free list
    pub fn free_slots(&self) -> usize {
        self.parts_locked().2.strategy.free.len()
    }

    /// Slot size in bytes
    pub fn object_size(&self) -> usize {
        self.parts_locked().2.strategy.slots.object_size
    }

    /// Slot alignment in bytes
    pub fn object_alignment(&self) -> usize {
        self.parts_locked().2.strategy.object_align
    }
}
