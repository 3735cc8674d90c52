//! Public macros for region-alloc

/// Return an [`AllocError`](crate::error::AllocError) from the enclosing
/// function unless a condition holds
///
/// The stringified condition and the macro's call site are recorded in the
/// error.
///
/// # Examples
/// ```
/// use region_alloc::alloc_ensure;
/// use region_alloc::error::{AllocResult, ErrorKind};
///
/// fn checked_half(size: usize) -> AllocResult<usize> {
///     alloc_ensure!(size > 0, ErrorKind::ZeroSize, "size must be larger than 0");
///     Ok(size / 2)
/// }
///
/// let err = checked_half(0).unwrap_err();
/// assert_eq!(err.condition(), "size > 0");
/// assert_eq!(checked_half(8).unwrap(), 4);
/// ```
#[macro_export]
macro_rules! alloc_ensure {
    ($cond:expr, $kind:expr, $($msg:tt)+) => {
        if !($cond) {
            return ::core::result::Result::Err($crate::error::AllocError::new(
                $kind,
                ::core::stringify!($cond),
                ::std::format!($($msg)+),
            ));
        }
    };
}
