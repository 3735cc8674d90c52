//! The span of bytes an allocator manages
//!
//! # Safety
//!
//! A [`Region`] is a raw `(start, size)` pair plus an ownership flag:
//! - Owned regions come from a leaked `Box<[u8]>` and are turned back into
//!   a box exactly once, in `Drop`
//! - Borrowed regions carry the lifetime of the caller's buffer and are
//!   never released
//! - All access to the bytes goes through raw pointers derived from `start`,
//!   so no reference to the buffer is held while allocations are live

use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::error::{AllocError, AllocResult};

#[track_caller]
fn ensure_size(size: usize) -> AllocResult<()> {
    if size == 0 {
        return Err(AllocError::invalid_config("size > 0", "region size must be larger than 0"));
    }
    Ok(())
}

/// Contiguous bytes managed by one allocator
pub struct Region<'r> {
    start: NonNull<u8>,
    size: usize,
    owned: bool,
    _buffer: PhantomData<&'r mut [u8]>,
}

impl Region<'static> {
    /// Acquires `size` zeroed bytes of system memory owned by the region
    pub fn acquire(size: usize) -> AllocResult<Self> {
        ensure_size(size)?;

        let memory: &'static mut [u8] = Box::leak(vec![0u8; size].into_boxed_slice());

        Ok(Self {
            start: NonNull::from(memory).cast::<u8>(),
            size,
            owned: true,
            _buffer: PhantomData,
        })
    }
}

impl<'r> Region<'r> {
    /// Borrows a caller-provided buffer; the region never releases it
    pub fn borrowed(buffer: &'r mut [u8]) -> AllocResult<Self> {
        let size = buffer.len();
        ensure_size(size)?;

        Ok(Self {
            start: NonNull::from(buffer).cast::<u8>(),
            size,
            owned: false,
            _buffer: PhantomData,
        })
    }

    /// Borrows `size` bytes starting at `start`
    ///
    /// # Safety
    /// - `start` must be valid for reads and writes of `size` bytes for `'r`
    /// - Nothing else may access those bytes while the region is alive
    pub unsafe fn from_raw_parts(start: NonNull<u8>, size: usize) -> AllocResult<Self> {
        ensure_size(size)?;

        Ok(Self {
            start,
            size,
            owned: false,
            _buffer: PhantomData,
        })
    }

    /// First byte of the region
    #[inline]
    pub fn start(&self) -> NonNull<u8> {
        self.start
    }

    /// Address of the first byte
    #[inline]
    pub fn start_addr(&self) -> usize {
        self.start.as_ptr() as usize
    }

    /// One past the last byte
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.start_addr() + self.size
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the region releases its memory when dropped
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Whether `address` falls inside the region
    #[inline]
    pub fn contains(&self, address: usize) -> bool {
        address >= self.start_addr() && address < self.end_addr()
    }

    /// Pointer to the byte at `address`, keeping the region's provenance
    #[inline]
    pub(crate) fn ptr_at(&self, address: usize) -> *mut u8 {
        debug_assert!(address >= self.start_addr() && address <= self.end_addr());
        self.start
            .as_ptr()
            .wrapping_add(address - self.start_addr())
    }

    /// Non-null pointer to the byte at `address`
    #[inline]
    pub(crate) fn block_at(&self, address: usize) -> NonNull<u8> {
        debug_assert!(address >= self.start_addr() && address <= self.end_addr());
        // SAFETY: The offset stays within the region or one past its end.
        unsafe { self.start.add(address - self.start_addr()) }
    }

    /// Overwrites `len` bytes at `address` with `pattern`
    ///
    /// # Safety
    /// `[address, address + len)` must lie inside the region and must not
    /// hold a live value.
    pub(crate) unsafe fn fill(&self, address: usize, len: usize, pattern: u8) {
        debug_assert!(address + len <= self.end_addr());
        // SAFETY: Range is inside the region and unused (caller contract).
        unsafe { ptr::write_bytes(self.ptr_at(address), pattern, len) };
    }
}

impl Drop for Region<'_> {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: Rebuilding the box leaked in `acquire`.
            // - start/size are exactly the leaked slice's pointer and length
            // - `owned` regions are only created by `acquire`
            // - Drop runs once, so the box is freed exactly once
            unsafe {
                drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                    self.start.as_ptr(),
                    self.size,
                )));
            }
        }
    }
}

impl fmt::Debug for Region<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("start", &format_args!("{:#x}", self.start_addr()))
            .field("size", &self.size)
            .field("owned", &self.owned)
            .finish()
    }
}

// SAFETY: Region can be sent between threads.
// - It is a uniquely owned buffer or an exclusive borrow of one
// - No thread-local state
unsafe impl Send for Region<'_> {}

// SAFETY: Region can be shared between threads.
// - Shared access only reads `start`/`size`/`owned`
// - Writes to the bytes happen under the owning allocator's lock or `&mut`
unsafe impl Sync for Region<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_acquire_is_owned() {
        let region = Region::acquire(128).unwrap();
        assert!(region.is_owned());
        assert_eq!(region.size(), 128);
        assert_eq!(region.end_addr() - region.start_addr(), 128);
    }

    #[test]
    fn test_borrowed_is_not_owned() {
        let mut buf = [7u8; 32];
        let start = buf.as_ptr() as usize;
        {
            let region = Region::borrowed(&mut buf).unwrap();
            assert!(!region.is_owned());
            assert_eq!(region.start_addr(), start);
            assert!(region.contains(start + 31));
            assert!(!region.contains(start + 32));
        }
        // buffer is still ours after the region is gone
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(
            Region::acquire(0).unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
        let mut empty: [u8; 0] = [];
        assert_eq!(
            Region::borrowed(&mut empty).unwrap_err().kind(),
            ErrorKind::InvalidConfig
        );
    }

    #[test]
    fn test_fill() {
        let mut buf = [0u8; 8];
        let region = Region::borrowed(&mut buf).unwrap();
        let start = region.start_addr();
        unsafe { region.fill(start + 2, 3, 0xAB) };
        drop(region);
        assert_eq!(buf, [0, 0, 0xAB, 0xAB, 0xAB, 0, 0, 0]);
    }
}
