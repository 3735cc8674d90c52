//! Allocator base: region ownership, usage bookkeeping and typed operations
//!
//! # Safety
//!
//! [`Allocator`] hands out raw, properly aligned pointers into its region:
//! - Typed allocations are initialised in place with `ptr::write` before the
//!   pointer is returned
//! - Typed deallocations run `drop_in_place` only after the strategy has
//!   accepted the pointer, so a rejected free never drops a value
//! - Array lengths live in the element-sized header slots right before the
//!   first element and are written and read with unaligned accesses
//!
//! ## Thread Safety
//!
//! The usage state and the strategy sit behind one `parking_lot::Mutex`.
//! Plain operations take `&mut self` and reach the state through
//! `Mutex::get_mut` without locking; the `*_sync` variants take `&self` and
//! lock only around strategy calls. Values are built and dropped unlocked.

use core::fmt;
use core::ptr::{self, NonNull};

use parking_lot::{Mutex, MutexGuard};

#[cfg(feature = "logging")]
use tracing::{debug, error, trace, warn};

use super::config::{AllocatorConfig, LeakPolicy};
use super::region::Region;
use super::stats::{AllocatorStats, StatsCounters};
use super::traits::{MemoryUsage, Strategy};
use crate::error::{AllocError, AllocResult};
use crate::utils::is_power_of_two;

/// Bytes in use and live allocation count of one allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    used_memory: usize,
    num_allocations: usize,
}

impl Usage {
    /// Bytes currently in use, padding and headers included
    #[inline]
    pub fn used_memory(&self) -> usize {
        self.used_memory
    }

    /// Allocations currently live
    #[inline]
    pub fn num_allocations(&self) -> usize {
        self.num_allocations
    }

    /// Whether nothing is allocated
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used_memory == 0 && self.num_allocations == 0
    }

    #[inline]
    pub(crate) fn record_allocation(&mut self, bytes: usize) {
        self.used_memory += bytes;
        self.num_allocations += 1;
    }

    #[inline]
    pub(crate) fn record_deallocation(&mut self, bytes: usize) {
        // out-of-order stack frees can release more than is accounted
        self.used_memory = self.used_memory.saturating_sub(bytes);
        self.num_allocations = self.num_allocations.saturating_sub(1);
    }

    pub(crate) fn restore(&mut self, used_memory: usize, num_allocations: usize) {
        self.used_memory = used_memory;
        self.num_allocations = num_allocations;
    }
}

/// Element-sized slots reserved in front of an array to hold its length
///
/// `ceil(size_of::<usize>() / size_of::<T>())`; zero for zero-sized types,
/// which the array operations reject.
///
/// # Examples
/// ```
/// use region_alloc::allocator::array_header_slots;
///
/// assert_eq!(array_header_slots::<u8>(), core::mem::size_of::<usize>());
/// assert_eq!(array_header_slots::<[u64; 4]>(), 1);
/// ```
pub const fn array_header_slots<T>() -> usize {
    let element = size_of::<T>();
    if element == 0 {
        0
    } else {
        size_of::<usize>().div_ceil(element)
    }
}

/// Mutable allocator state guarded by the allocator lock
pub(crate) struct State<S> {
    pub(crate) strategy: S,
    pub(crate) usage: Usage,
    pub(crate) stats: StatsCounters,
}

impl<S: Strategy> State<S> {
    fn allocate_raw(
        &mut self,
        region: &Region<'_>,
        config: &AllocatorConfig,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        if size == 0 {
            return Err(AllocError::zero_size());
        }
        if !is_power_of_two(align) {
            return Err(AllocError::invalid_alignment(align));
        }

        match self.strategy.allocate(region, &mut self.usage, size, align)? {
            Some(ptr) => {
                if let Some(pattern) = config.alloc_pattern {
                    // SAFETY: The strategy just reserved `size` bytes at `ptr`.
                    unsafe { ptr::write_bytes(ptr.as_ptr(), pattern, size) };
                }
                self.stats.record_allocation(self.usage.used_memory());

                #[cfg(feature = "logging")]
                trace!(
                    strategy = S::NAME,
                    size,
                    align,
                    address = ptr.as_ptr() as usize,
                    "allocated"
                );

                Ok(Some(ptr))
            }
            None => {
                self.stats.record_failure();

                #[cfg(feature = "logging")]
                warn!(
                    strategy = S::NAME,
                    size,
                    align,
                    used = self.usage.used_memory(),
                    capacity = region.size(),
                    "region exhausted"
                );

                Ok(None)
            }
        }
    }

    /// # Safety
    /// See [`Allocator::deallocate_raw`].
    unsafe fn deallocate_raw(&mut self, region: &Region<'_>, ptr: *mut u8) -> AllocResult<()> {
        let Some(ptr) = NonNull::new(ptr) else {
            return Err(AllocError::null_pointer());
        };

        // SAFETY: Forwarding the caller's guarantee that `ptr` is a live block
        // of this allocator.
        unsafe { self.strategy.deallocate(region, &mut self.usage, ptr)? };
        self.stats.record_deallocation();

        #[cfg(feature = "logging")]
        trace!(strategy = S::NAME, address = ptr.as_ptr() as usize, "deallocated");

        Ok(())
    }

    /// Reserves an uninitialised block for one `T`
    fn reserve_value<T>(
        &mut self,
        region: &Region<'_>,
        config: &AllocatorConfig,
    ) -> AllocResult<Option<NonNull<T>>> {
        if size_of::<T>() == 0 {
            return Err(AllocError::zero_size());
        }
        let block = self.allocate_raw(region, config, size_of::<T>(), align_of::<T>())?;
        Ok(block.map(NonNull::cast))
    }

    /// Reserves room for `length` elements and writes the length header
    ///
    /// Returns the first element; the elements themselves are uninitialised.
    fn reserve_array<T>(
        &mut self,
        region: &Region<'_>,
        config: &AllocatorConfig,
        length: usize,
    ) -> AllocResult<Option<NonNull<T>>> {
        if length == 0 {
            return Err(AllocError::zero_length());
        }
        if size_of::<T>() == 0 {
            return Err(AllocError::zero_size());
        }

        let element = size_of::<T>();
        let header_slots = array_header_slots::<T>();
        let total = length
            .checked_add(header_slots)
            .and_then(|slots| slots.checked_mul(element))
            .ok_or_else(|| AllocError::size_overflow("array allocation"))?;

        let Some(block) = self.allocate_raw(region, config, total, align_of::<T>())? else {
            return Ok(None);
        };

        // SAFETY: `first` is `header_slots` elements into a fresh block, so it
        // stays aligned for `T`, and the header slots span at least
        // `size_of::<usize>()` bytes, so the length fits right before it.
        unsafe {
            let first = block.add(header_slots * element).cast::<T>();
            first
                .cast::<u8>()
                .sub(size_of::<usize>())
                .cast::<usize>()
                .write_unaligned(length);
            Ok(Some(first))
        }
    }

    /// Checks that the value at `ptr` may be released without releasing it
    fn accept_value<T>(&self, region: &Region<'_>, ptr: *mut T) -> AllocResult<NonNull<T>> {
        let Some(ptr) = NonNull::new(ptr) else {
            return Err(AllocError::null_pointer());
        };
        self.strategy.validate(region, ptr.cast())?;
        Ok(ptr)
    }

    /// Locates and checks the block behind the array starting at `ptr`
    ///
    /// # Safety
    /// `ptr` must be null or the first element of an array returned by
    /// `reserve_array` on this state.
    unsafe fn accept_array<T>(&self, region: &Region<'_>, ptr: *mut T) -> AllocResult<ArrayBlock<T>> {
        let Some(first) = NonNull::new(ptr) else {
            return Err(AllocError::null_pointer());
        };
        if size_of::<T>() == 0 {
            return Err(AllocError::zero_size());
        }

        let header_bytes = array_header_slots::<T>() * size_of::<T>();
        // SAFETY: The header slots precede `first` inside the same block.
        let block = unsafe { first.cast::<u8>().sub(header_bytes) };
        self.strategy.validate(region, block)?;

        // SAFETY: Reading the header written by `reserve_array`.
        let length = unsafe {
            first
                .cast::<u8>()
                .sub(size_of::<usize>())
                .cast::<usize>()
                .read_unaligned()
        };
        Ok(ArrayBlock { block, first, length })
    }
}

/// An array accepted for release
struct ArrayBlock<T> {
    block: NonNull<u8>,
    first: NonNull<T>,
    length: usize,
}

impl<T> ArrayBlock<T> {
    /// # Safety
    /// Every element must be live and unused afterwards.
    unsafe fn drop_elements(&self) {
        // SAFETY: Caller contract; `length` is what `reserve_array` recorded.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.first.as_ptr(), self.length));
        }
    }
}

/// Moves `value` into a reserved block
///
/// # Safety
/// `slot` must be a fresh block of `size_of::<T>()` bytes aligned for `T`.
unsafe fn emplace<T>(slot: NonNull<T>, value: T) -> NonNull<T> {
    // SAFETY: Caller contract.
    unsafe { slot.as_ptr().write(value) };
    slot
}

/// Writes `T::default()` into each of `length` reserved elements
///
/// # Safety
/// `first` must start `length` uninitialised elements returned by
/// `reserve_array`.
unsafe fn fill_default<T: Default>(first: NonNull<T>, length: usize) -> NonNull<T> {
    for index in 0..length {
        // SAFETY: `index < length` stays inside the reserved elements.
        unsafe { first.add(index).write(T::default()) };
    }
    first
}

/// Allocator over one region, parameterised by its raw [`Strategy`]
///
/// Use the aliases [`LinearAllocator`](super::LinearAllocator),
/// [`StackAllocator`](super::StackAllocator) and
/// [`PoolAllocator`](super::PoolAllocator).
///
/// Resource exhaustion is reported as `Ok(None)`; precondition violations
/// and unsupported operations as `Err(AllocError)`.
pub struct Allocator<'r, S: Strategy> {
    region: Region<'r>,
    config: AllocatorConfig,
    state: Mutex<State<S>>,
    closed: bool,
}

impl<'r, S: Strategy> Allocator<'r, S> {
    pub(crate) fn from_parts(region: Region<'r>, config: AllocatorConfig, strategy: S) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            strategy = S::NAME,
            size = region.size(),
            owned = region.is_owned(),
            start = region.start_addr(),
            "allocator created"
        );

        let stats = StatsCounters::new(config.track_stats);
        Self {
            region,
            config,
            state: Mutex::new(State {
                strategy,
                usage: Usage::default(),
                stats,
            }),
            closed: false,
        }
    }

    /// Exclusive access to the state without locking
    pub(crate) fn parts_mut(&mut self) -> (&Region<'r>, &AllocatorConfig, &mut State<S>) {
        (&self.region, &self.config, self.state.get_mut())
    }

    /// Locked access to the state
    pub(crate) fn parts_locked(&self) -> (&Region<'r>, &AllocatorConfig, MutexGuard<'_, State<S>>) {
        (&self.region, &self.config, self.state.lock())
    }

    // ------------------------------------------------------------------------
    // Raw primitive
    // ------------------------------------------------------------------------

    /// Reserves `size` bytes aligned to `align`
    ///
    /// Returns `Ok(None)` when the region cannot satisfy the request.
    pub fn allocate_raw(&mut self, size: usize, align: usize) -> AllocResult<Option<NonNull<u8>>> {
        let (region, config, state) = self.parts_mut();
        state.allocate_raw(region, config, size, align)
    }

    /// Returns a block obtained from [`allocate_raw`](Self::allocate_raw)
    ///
    /// # Safety
    /// `ptr` must be null or a live block returned by this allocator's raw
    /// allocation that holds no value needing a destructor.
    pub unsafe fn deallocate_raw(&mut self, ptr: *mut u8) -> AllocResult<()> {
        let (region, _, state) = self.parts_mut();
        // SAFETY: Caller contract.
        unsafe { state.deallocate_raw(region, ptr) }
    }

    // ------------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------------

    /// Moves `value` into the region
    ///
    /// Returns `Ok(None)` (dropping `value`) when the region is exhausted.
    pub fn allocate<T>(&mut self, value: T) -> AllocResult<Option<NonNull<T>>> {
        let (region, config, state) = self.parts_mut();
        let slot = state.reserve_value::<T>(region, config)?;
        // SAFETY: `reserve_value` returned a fresh block for one `T`.
        Ok(slot.map(|slot| unsafe { emplace(slot, value) }))
    }

    /// Places `T::default()` in the region
    ///
    /// Nothing is constructed when the region is exhausted.
    pub fn allocate_default<T: Default>(&mut self) -> AllocResult<Option<NonNull<T>>> {
        let (region, config, state) = self.parts_mut();
        let slot = state.reserve_value::<T>(region, config)?;
        // SAFETY: `reserve_value` returned a fresh block for one `T`.
        Ok(slot.map(|slot| unsafe { emplace(slot, T::default()) }))
    }

    /// Drops the value at `ptr` and returns its memory
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer returned by
    /// [`allocate`](Self::allocate) / [`allocate_default`](Self::allocate_default)
    /// on this allocator; it is dangling afterwards.
    pub unsafe fn deallocate<T>(&mut self, ptr: *mut T) -> AllocResult<()> {
        let (region, _, state) = self.parts_mut();
        let ptr = state.accept_value(region, ptr)?;
        // SAFETY: `ptr` holds a live `T` (caller contract) and the strategy
        // accepted the block, so it is dropped exactly once here.
        unsafe {
            ptr::drop_in_place(ptr.as_ptr());
            state.deallocate_raw(region, ptr.as_ptr().cast())
        }
    }

    /// Places `length` default values contiguously, preceded by a length header
    ///
    /// Returns a pointer to the first element, or `Ok(None)` when the region
    /// is exhausted.
    pub fn allocate_array<T: Default>(&mut self, length: usize) -> AllocResult<Option<NonNull<T>>> {
        let (region, config, state) = self.parts_mut();
        let first = state.reserve_array::<T>(region, config, length)?;
        // SAFETY: `reserve_array` returned `length` uninitialised elements.
        Ok(first.map(|first| unsafe { fill_default(first, length) }))
    }

    /// Drops every element of an array and returns its memory
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer returned by
    /// [`allocate_array`](Self::allocate_array) on this allocator.
    pub unsafe fn deallocate_array<T>(&mut self, ptr: *mut T) -> AllocResult<()> {
        let (region, _, state) = self.parts_mut();
        // SAFETY: Caller contract.
        let array = unsafe { state.accept_array(region, ptr)? };
        // SAFETY: The strategy accepted the block; its elements are live.
        unsafe {
            array.drop_elements();
            state.deallocate_raw(region, array.block.as_ptr())
        }
    }

    // ------------------------------------------------------------------------
    // Thread-safe variants
    //
    // Values are constructed and dropped outside the lock, so constructors
    // and destructors may call back into the allocator.
    // ------------------------------------------------------------------------

    /// Runs `f` with the state locked
    fn locked<R>(&self, f: impl FnOnce(&Region<'r>, &AllocatorConfig, &mut State<S>) -> R) -> R {
        let mut state = self.state.lock();
        f(&self.region, &self.config, &mut state)
    }

    /// [`allocate_raw`](Self::allocate_raw) under the allocator lock
    pub fn allocate_raw_sync(&self, size: usize, align: usize) -> AllocResult<Option<NonNull<u8>>> {
        self.locked(|region, config, state| state.allocate_raw(region, config, size, align))
    }

    /// [`deallocate_raw`](Self::deallocate_raw) under the allocator lock
    ///
    /// # Safety
    /// Same contract as [`deallocate_raw`](Self::deallocate_raw); no other
    /// thread may still use the block.
    pub unsafe fn deallocate_raw_sync(&self, ptr: *mut u8) -> AllocResult<()> {
        // SAFETY: Caller contract.
        self.locked(|region, _, state| unsafe { state.deallocate_raw(region, ptr) })
    }

    /// Thread-safe [`allocate`](Self::allocate)
    ///
    /// A rejected `value` is dropped after the lock is released.
    pub fn allocate_sync<T: Send>(&self, value: T) -> AllocResult<Option<NonNull<T>>> {
        let slot = self.locked(|region, config, state| state.reserve_value::<T>(region, config))?;
        // SAFETY: `reserve_value` returned a fresh block for one `T`.
        Ok(slot.map(|slot| unsafe { emplace(slot, value) }))
    }

    /// Thread-safe [`allocate_default`](Self::allocate_default)
    pub fn allocate_default_sync<T: Default + Send>(&self) -> AllocResult<Option<NonNull<T>>> {
        let slot = self.locked(|region, config, state| state.reserve_value::<T>(region, config))?;
        // SAFETY: `reserve_value` returned a fresh block for one `T`.
        Ok(slot.map(|slot| unsafe { emplace(slot, T::default()) }))
    }

    /// Thread-safe [`deallocate`](Self::deallocate)
    ///
    /// The value is dropped between two locked sections, so its destructor
    /// may release other values through this allocator.
    ///
    /// # Safety
    /// Same contract as [`deallocate`](Self::deallocate); no other thread may
    /// still use the value.
    pub unsafe fn deallocate_sync<T: Send>(&self, ptr: *mut T) -> AllocResult<()> {
        let ptr = self.locked(|region, _, state| state.accept_value(region, ptr))?;
        // SAFETY: `ptr` holds a live `T` (caller contract) and the strategy
        // accepted the block, which stays reserved until released below.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) };
        // SAFETY: Same block, its value already dropped.
        self.locked(|region, _, state| unsafe { state.deallocate_raw(region, ptr.as_ptr().cast()) })
    }

    /// Thread-safe [`allocate_array`](Self::allocate_array)
    pub fn allocate_array_sync<T: Default + Send>(
        &self,
        length: usize,
    ) -> AllocResult<Option<NonNull<T>>> {
        let first =
            self.locked(|region, config, state| state.reserve_array::<T>(region, config, length))?;
        // SAFETY: `reserve_array` returned `length` uninitialised elements.
        Ok(first.map(|first| unsafe { fill_default(first, length) }))
    }

    /// Thread-safe [`deallocate_array`](Self::deallocate_array)
    ///
    /// # Safety
    /// Same contract as [`deallocate_array`](Self::deallocate_array); no other
    /// thread may still use the elements.
    pub unsafe fn deallocate_array_sync<T: Send>(&self, ptr: *mut T) -> AllocResult<()> {
        // SAFETY: Caller contract.
        let array = self.locked(|region, _, state| unsafe { state.accept_array(region, ptr) })?;
        // SAFETY: The strategy accepted the block; its elements are live.
        unsafe { array.drop_elements() };
        let block = array.block.as_ptr();
        // SAFETY: Same block, its elements already dropped.
        self.locked(|region, _, state| unsafe { state.deallocate_raw(region, block) })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// First byte of the region
    #[inline]
    pub fn start(&self) -> NonNull<u8> {
        self.region.start()
    }

    /// Region size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.region.size()
    }

    /// The managed region
    #[inline]
    pub fn region(&self) -> &Region<'r> {
        &self.region
    }

    /// Active configuration
    #[inline]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Snapshot of used bytes and live allocations
    pub fn usage(&self) -> Usage {
        self.state.lock().usage
    }

    /// Bytes currently in use, padding and headers included
    pub fn used_memory(&self) -> usize {
        self.usage().used_memory()
    }

    /// Allocations currently live
    pub fn num_allocations(&self) -> usize {
        self.usage().num_allocations()
    }

    /// Whether `ptr` points into the region
    pub fn owns<T>(&self, ptr: *const T) -> bool {
        self.region.contains(ptr as usize)
    }

    /// Statistics snapshot
    pub fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        state.stats.snapshot(
            state.usage.used_memory(),
            state.usage.num_allocations(),
            self.region.size(),
        )
    }

    /// Clears the statistics counters; usage is left untouched
    pub fn reset_stats(&self) {
        self.state.lock().stats.reset();
    }

    /// Consumes the allocator, reporting memory that was never returned
    ///
    /// The region is released either way when it is owned.
    pub fn close(mut self) -> AllocResult<()> {
        self.closed = true;
        let usage = self.state.get_mut().usage;

        #[cfg(feature = "logging")]
        debug!(
            strategy = S::NAME,
            used = usage.used_memory(),
            allocations = usage.num_allocations(),
            "allocator closed"
        );

        if usage.is_empty() {
            Ok(())
        } else {
            Err(AllocError::leak_detected(
                usage.used_memory(),
                usage.num_allocations(),
            ))
        }
    }
}

impl<S: Strategy> MemoryUsage for Allocator<'_, S> {
    fn used_memory(&self) -> usize {
        self.usage().used_memory()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.size().saturating_sub(self.usage().used_memory()))
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.size())
    }
}

impl<S: Strategy> Drop for Allocator<'_, S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let usage = self.state.get_mut().usage;
        if usage.is_empty() {
            return;
        }

        #[cfg(feature = "logging")]
        error!(
            strategy = S::NAME,
            used = usage.used_memory(),
            allocations = usage.num_allocations(),
            "allocator dropped with undeallocated memory"
        );

        if self.config.leak_policy == LeakPolicy::Abort {
            std::process::abort();
        }
    }
}

impl<S: Strategy> fmt::Debug for Allocator<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Allocator");
        debug
            .field("strategy", &S::NAME)
            .field("region", &self.region);
        match self.state.try_lock() {
            Some(state) => debug.field("usage", &state.usage),
            None => debug.field("usage", &"<locked>"),
        };
        debug.finish()
    }
}
