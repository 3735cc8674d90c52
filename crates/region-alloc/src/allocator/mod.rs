//! Region allocators
//!
//! ## Allocators
//! - [`LinearAllocator`] - bump allocation, wholesale release via `clear`
//! - [`StackAllocator`] - LIFO allocation with a one-byte adjustment header
//! - [`PoolAllocator`] - fixed-size slots on an intrusive free list
//!
//! All three are [`Allocator`] instantiated with a [`Strategy`]; the typed,
//! array and thread-safe operations live on [`Allocator`] itself.

mod base;
pub mod config;
mod linear;
mod pool;
pub mod region;
mod sealed;
mod stack;
pub mod stats;
mod traits;

pub use base::{Allocator, Usage, array_header_slots};
pub use config::{AllocatorConfig, LeakPolicy};
pub use linear::{Linear, LinearAllocator, LinearCheckpoint, LinearScope};
pub use pool::{Pool, PoolAllocator};
pub use region::Region;
pub use stack::{HEADER_SIZE as STACK_HEADER_SIZE, MAX_ALIGNMENT as STACK_MAX_ALIGNMENT};
pub use stack::{Stack, StackAllocator};
pub use stats::AllocatorStats;
pub use traits::{BasicMemoryUsage, MemoryUsage, Strategy};
