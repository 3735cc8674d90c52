//! # region-alloc
//!
//! Linear, stack and pool allocators over a single pre-reserved memory region.
//!
//! Each allocator manages one contiguous [`Region`](allocator::Region), either
//! acquired from the system (and released when the allocator is dropped) or
//! borrowed from the caller. On top of a strategy-specific raw primitive every
//! allocator offers:
//! - Typed single-value allocation with in-place construction
//! - Arrays with a length header stored right before the first element
//! - `*_sync` variants that serialise through one allocator-wide lock
//! - Usage bookkeeping and an explicit leak check on [`close`](allocator::Allocator::close)
//!
//! ## Quick Start
//!
//! ```rust
//! use region_alloc::prelude::*;
//!
//! let mut stack = StackAllocator::new(1024)?;
//! let numbers = stack.allocate_array::<u32>(16)?.expect("region has room");
//! unsafe {
//!     *numbers.as_ptr() = 7;
//!     stack.deallocate_array(numbers.as_ptr())?;
//! }
//! stack.close()?;
//! # Ok::<(), AllocError>(())
//! ```
//!
//! ## Error model
//!
//! - Precondition violations return `Err(AllocError)` carrying the failed
//!   condition and the caller's source location
//! - An exhausted region returns `Ok(None)`; it is never an error
//! - Deallocating from a linear allocator is `Err` with kind `Unsupported`
//!
//! ## Features
//!
//! - `logging` (default): allocator lifecycle and raised errors via `tracing`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]
#![warn(rust_2018_idioms)]
// Struct bool fields are configuration
#![allow(clippy::struct_excessive_bools)]

// Error types
pub mod error;
#[macro_use]
mod macros;

// Core modules
pub mod allocator;
pub mod utils;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::{
        Allocator, AllocatorConfig, AllocatorStats, LeakPolicy, LinearAllocator, MemoryUsage,
        PoolAllocator, Region, StackAllocator, Strategy, Usage,
    };
    pub use crate::error::{AllocError, AllocResult, ErrorKind};
}

pub use crate::error::{AllocError, AllocResult, ErrorKind};
