//! Intrusive free list threaded through unused pool slots
//!
//! # Safety
//!
//! Links live in the first bytes of free slots:
//! - A link is the next slot's index plus one, 0 ends the list
//! - It is stored little endian in `width` bytes, where `width` is the
//!   largest of 8/4/2/1 that fits the slot, so slots smaller than a pointer
//!   still hold their link
//! - Reads and writes are unaligned byte copies, so no alignment beyond the
//!   slot's own is assumed
//! - Only free slots are ever touched; popping a slot hands its bytes over to
//!   the caller

use core::ptr;

use crate::allocator::region::Region;

const MAX_LINK_WIDTH: usize = size_of::<u64>();

/// Geometry of the slot array inside a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SlotArea {
    pub(super) first: usize,
    pub(super) object_size: usize,
    pub(super) count: usize,
}

impl SlotArea {
    #[inline]
    pub(super) fn address(&self, index: usize) -> usize {
        debug_assert!(index < self.count);
        self.first + index * self.object_size
    }

    #[inline]
    pub(super) fn end(&self) -> usize {
        self.first + self.count * self.object_size
    }

    /// Slot index of `address`, if it is the first byte of a slot
    pub(super) fn index_of(&self, address: usize) -> Option<usize> {
        if address < self.first || address >= self.end() {
            return None;
        }
        let offset = address - self.first;
        (offset % self.object_size == 0).then(|| offset / self.object_size)
    }
}

/// Singly linked list of free slot indices
#[derive(Debug)]
pub(super) struct FreeList {
    head: Option<usize>,
    len: usize,
    width: usize,
}

impl FreeList {
    /// Bytes used per link for slots of `object_size` bytes
    pub(super) const fn link_width(object_size: usize) -> usize {
        let limit = if object_size < MAX_LINK_WIDTH {
            object_size
        } else {
            MAX_LINK_WIDTH
        };
        let mut width = MAX_LINK_WIDTH;
        while width > limit && width > 1 {
            width /= 2;
        }
        width
    }

    /// Most slots a list with `width`-byte links can address
    pub(super) const fn max_slots(width: usize) -> usize {
        if width >= size_of::<usize>() {
            usize::MAX - 1
        } else {
            (1usize << (8 * width)) - 1
        }
    }

    /// Links slot i to slot i + 1 and the last slot to the end marker
    ///
    /// # Safety
    /// Every slot of `slots` must lie inside `region` and hold no value, and
    /// `slots.count` must not exceed `max_slots(width)`.
    pub(super) unsafe fn thread(region: &Region<'_>, slots: &SlotArea, width: usize) -> Self {
        debug_assert!(slots.count <= Self::max_slots(width));
        for index in 0..slots.count {
            let next = (index + 1 < slots.count).then_some(index + 1);
            // SAFETY: Slot `index` is inside the region and free.
            unsafe { write_link(region, slots.address(index), width, next) };
        }

        Self {
            head: (slots.count > 0).then_some(0),
            len: slots.count,
            width,
        }
    }

    /// Free slots remaining
    #[inline]
    pub(super) fn len(&self) -> usize {
        self.len
    }

    /// Takes the head slot
    ///
    /// # Safety
    /// `slots` must be the area the list was threaded through.
    pub(super) unsafe fn pop(&mut self, region: &Region<'_>, slots: &SlotArea) -> Option<usize> {
        let index = self.head?;
        // SAFETY: The head is a free slot holding a link.
        self.head = unsafe { read_link(region, slots.address(index), self.width) };
        self.len -= 1;
        Some(index)
    }

    /// Makes slot `index` the new head
    ///
    /// # Safety
    /// Slot `index` of `slots` must be in use and hold no live value; it must
    /// not already be on the list.
    pub(super) unsafe fn push(&mut self, region: &Region<'_>, slots: &SlotArea, index: usize) {
        // SAFETY: The slot is being returned, so its bytes are ours again.
        unsafe { write_link(region, slots.address(index), self.width, self.head) };
        self.head = Some(index);
        self.len += 1;
    }
}

/// # Safety
/// `[address, address + width)` must be inside `region` and unused.
unsafe fn write_link(region: &Region<'_>, address: usize, width: usize, next: Option<usize>) {
    let encoded = next.map_or(0, |index| index as u64 + 1);
    let bytes = encoded.to_le_bytes();
    // SAFETY: Caller contract; `width <= 8` bytes of `bytes` are copied.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), region.ptr_at(address), width) };
}

/// # Safety
/// `[address, address + width)` must be inside `region` and hold a link.
unsafe fn read_link(region: &Region<'_>, address: usize, width: usize) -> Option<usize> {
    let mut bytes = [0u8; MAX_LINK_WIDTH];
    // SAFETY: Caller contract; `width <= 8` bytes land in `bytes`.
    unsafe { ptr::copy_nonoverlapping(region.ptr_at(address), bytes.as_mut_ptr(), width) };
    match u64::from_le_bytes(bytes) {
        0 => None,
        encoded => usize::try_from(encoded - 1).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 2)]
    #[case(4, 4)]
    #[case(6, 4)]
    #[case(8, 8)]
    #[case(24, 8)]
    fn test_link_width(#[case] object_size: usize, #[case] expected: usize) {
        assert_eq!(FreeList::link_width(object_size), expected);
    }

    #[test]
    fn test_max_slots() {
        assert_eq!(FreeList::max_slots(1), 255);
        assert_eq!(FreeList::max_slots(2), 65_535);
    }

    #[test]
    fn test_index_of() {
        let area = SlotArea {
            first: 0x1000,
            object_size: 16,
            count: 4,
        };
        assert_eq!(area.index_of(0x1000), Some(0));
        assert_eq!(area.index_of(0x1030), Some(3));
        assert_eq!(area.index_of(0x1008), None);
        assert_eq!(area.index_of(0x1040), None);
        assert_eq!(area.index_of(0x0ff0), None);
    }

    #[test]
    fn test_thread_pop_push_one_byte_slots() {
        let mut buf = [0u8; 5];
        let region = Region::borrowed(&mut buf).unwrap();
        let slots = SlotArea {
            first: region.start_addr(),
            object_size: 1,
            count: 5,
        };
        let mut list = unsafe { FreeList::thread(&region, &slots, 1) };
        assert_eq!(list.len(), 5);

        let popped: Vec<_> = (0..5)
            .map(|_| unsafe { list.pop(&region, &slots) }.unwrap())
            .collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert_eq!(unsafe { list.pop(&region, &slots) }, None);

        unsafe {
            list.push(&region, &slots, 3);
            list.push(&region, &slots, 1);
        }
        assert_eq!(list.len(), 2);
        assert_eq!(unsafe { list.pop(&region, &slots) }, Some(1));
        assert_eq!(unsafe { list.pop(&region, &slots) }, Some(3));
        assert_eq!(unsafe { list.pop(&region, &slots) }, None);
    }
}
