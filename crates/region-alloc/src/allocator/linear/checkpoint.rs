//! Checkpoint and scoping support for the linear allocator

use core::ops::{Deref, DerefMut};

use super::LinearAllocator;

/// Checkpoint for saving/restoring the bump position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearCheckpoint {
    pub(super) position: usize,
    pub(super) num_allocations: usize,
    pub(super) generation: u32,
}

/// RAII guard for automatic checkpoint restoration
///
/// Dereferences to the allocator; when dropped, everything allocated through
/// the scope is released. Values placed in the region are not dropped.
pub struct LinearScope<'a, 'r> {
    allocator: &'a mut LinearAllocator<'r>,
    checkpoint: LinearCheckpoint,
}

impl<'a, 'r> LinearScope<'a, 'r> {
    pub(super) fn new(allocator: &'a mut LinearAllocator<'r>) -> Self {
        Self {
            checkpoint: allocator.checkpoint(),
            allocator,
        }
    }
}

impl<'r> Deref for LinearScope<'_, 'r> {
    type Target = LinearAllocator<'r>;

    fn deref(&self) -> &Self::Target {
        &*self.allocator
    }
}

impl DerefMut for LinearScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.allocator
    }
}

impl Drop for LinearScope<'_, '_> {
    fn drop(&mut self) {
        // A clear() inside the scope invalidates the checkpoint; nothing is
        // left to release then.
        let _ = self.allocator.rewind(self.checkpoint);
    }
}
