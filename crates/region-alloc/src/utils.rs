//! Alignment and address arithmetic shared by every strategy
//!
//! Addresses are plain `usize` values; alignments must be powers of two.

/// Checks if a value is a power of two
#[inline(always)]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use region_alloc::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    (value + alignment - 1) & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(is_power_of_two(alignment));
    value & (alignment - 1) == 0
}

/// Smallest address greater than or equal to `address` that is a multiple of
/// `alignment`
///
/// # Examples
/// ```
/// use region_alloc::utils::next_aligned_address;
///
/// assert_eq!(next_aligned_address(0x1001, 16), 0x1010);
/// assert_eq!(next_aligned_address(0x1010, 16), 0x1010);
/// ```
#[inline(always)]
pub const fn next_aligned_address(address: usize, alignment: usize) -> usize {
    align_up(address, alignment)
}

/// Bytes to add to `address` to reach `alignment`, in `[0, alignment - 1]`
///
/// # Examples
/// ```
/// use region_alloc::utils::adjustment;
///
/// assert_eq!(adjustment(0x1001, 8), 7);
/// assert_eq!(adjustment(0x1008, 8), 0);
/// ```
#[inline(always)]
pub const fn adjustment(address: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    let misalignment = address & (alignment - 1);
    if misalignment == 0 {
        0
    } else {
        alignment - misalignment
    }
}

/// Adjustment that also leaves `header_size` bytes in front of the aligned
/// address
///
/// When the plain adjustment is smaller than the header it grows by whole
/// multiples of `alignment` until the header fits.
///
/// # Examples
/// ```
/// use region_alloc::utils::adjustment_with_header;
///
/// // already aligned: a full alignment step is needed to fit one header byte
/// assert_eq!(adjustment_with_header(0x1000, 8, 1), 8);
/// // three bytes of padding already hold a one-byte header
/// assert_eq!(adjustment_with_header(0x1005, 8, 1), 3);
/// // a 4-byte header needs one more step when only 3 bytes are free
/// assert_eq!(adjustment_with_header(0x1005, 8, 4), 11);
/// ```
#[inline]
pub const fn adjustment_with_header(address: usize, alignment: usize, header_size: usize) -> usize {
    let mut adjustment = adjustment(address, alignment);

    if adjustment < header_size {
        let needed = header_size - adjustment;
        adjustment += alignment * (needed / alignment);
        if needed % alignment > 0 {
            adjustment += alignment;
        }
    }

    adjustment
}

/// Moves a pointer by `delta` bytes, which may be negative
///
/// The result keeps the provenance of `ptr`; dereferencing it is only valid
/// if it stays inside the same allocation.
#[inline(always)]
pub fn offset(ptr: *mut u8, delta: isize) -> *mut u8 {
    ptr.wrapping_offset(delta)
}
