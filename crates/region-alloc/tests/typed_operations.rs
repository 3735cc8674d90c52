//! Typed single-value and array operations shared by every allocator

use std::cell::Cell;

use region_alloc::allocator::{
    AllocatorConfig, LeakPolicy, LinearAllocator, PoolAllocator, Region, StackAllocator,
    array_header_slots,
};
use region_alloc::error::ErrorKind;
use rstest::rstest;

thread_local! {
    static DROPS: Cell<usize> = const { Cell::new(0) };
}

fn drops() -> usize {
    DROPS.with(Cell::get)
}

fn reset_drops() {
    DROPS.with(|drops| drops.set(0));
}

/// Counts drops on the current test thread
#[derive(Debug)]
struct Tracked {
    value: u32,
}

impl Default for Tracked {
    fn default() -> Self {
        Self { value: 0x5EED }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        DROPS.with(|drops| drops.set(drops.get() + 1));
    }
}

fn checked_stack(size: usize) -> StackAllocator<'static> {
    StackAllocator::with_config(
        Region::acquire(size).expect("Failed to acquire region"),
        AllocatorConfig::debug().with_leak_policy(LeakPolicy::Log),
    )
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(42)]
fn test_stack_array_round_trip(#[case] length: usize) {
    reset_drops();
    let mut stack = checked_stack(4096);
    let before = stack.usage();

    let first = stack
        .allocate_array::<Tracked>(length)
        .expect("Allocation failed")
        .expect("Region should have room");
    assert_eq!(drops(), 0);
    for index in 0..length {
        assert_eq!(unsafe { (*first.as_ptr().add(index)).value }, 0x5EED);
    }

    unsafe { stack.deallocate_array(first.as_ptr()).expect("Array is on top") };
    assert_eq!(drops(), length);
    assert_eq!(stack.usage(), before);
    stack.close().expect("Stack should close clean");
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(42)]
fn test_array_length_header(#[case] length: usize) {
    let mut stack = checked_stack(4096);
    let first = stack.allocate_array::<u16>(length).unwrap().unwrap();

    let stored = unsafe {
        first
            .as_ptr()
            .cast::<u8>()
            .sub(size_of::<usize>())
            .cast::<usize>()
            .read_unaligned()
    };
    assert_eq!(stored, length);

    unsafe { stack.deallocate_array(first.as_ptr()).unwrap() };
    stack.close().unwrap();
}

#[test]
fn test_array_header_slots_formula() {
    assert_eq!(array_header_slots::<u8>(), size_of::<usize>());
    assert_eq!(array_header_slots::<u16>(), size_of::<usize>() / 2);
    assert_eq!(array_header_slots::<[u8; 3]>(), size_of::<usize>().div_ceil(3));
    assert_eq!(array_header_slots::<[u64; 8]>(), 1);
    assert_eq!(array_header_slots::<()>(), 0);
}

#[test]
fn test_array_header_for_odd_sized_elements() {
    let mut linear = LinearAllocator::new(1024).unwrap();
    linear.allocate_array::<[u8; 3]>(5).unwrap().unwrap();

    let header = array_header_slots::<[u8; 3]>() * 3;
    assert!(header >= size_of::<usize>());
    assert_eq!(linear.used_memory(), header + 5 * 3);
    linear.clear();
}

#[test]
fn test_array_header_for_elements_larger_than_usize() {
    // one whole element is reserved even though the length needs fewer bytes
    let mut linear = LinearAllocator::new(1024).unwrap();
    linear.allocate_array::<[u8; 24]>(2).unwrap().unwrap();

    assert_eq!(array_header_slots::<[u8; 24]>(), 1);
    assert_eq!(linear.used_memory(), 24 + 2 * 24);
    linear.clear();
}

#[test]
fn test_single_value_round_trip_drops_once() {
    reset_drops();
    let mut stack = checked_stack(256);
    let value = stack.allocate(Tracked { value: 9 }).unwrap().unwrap();
    assert_eq!(unsafe { (*value.as_ptr()).value }, 9);

    unsafe { stack.deallocate(value.as_ptr()).unwrap() };
    assert_eq!(drops(), 1);
    stack.close().unwrap();
}

#[test]
fn test_allocate_default_constructs_in_place() {
    reset_drops();
    let mut pool = PoolAllocator::with_slots::<Tracked>(2).unwrap();
    let value = pool.allocate_default::<Tracked>().unwrap().unwrap();
    assert_eq!(unsafe { (*value.as_ptr()).value }, 0x5EED);
    assert_eq!(drops(), 0);

    unsafe { pool.deallocate(value.as_ptr()).unwrap() };
    assert_eq!(drops(), 1);
    pool.close().unwrap();
}

#[test]
fn test_exhaustion_constructs_nothing() {
    reset_drops();
    let mut pool = PoolAllocator::with_slots::<Tracked>(1).unwrap();
    let kept = pool.allocate_default::<Tracked>().unwrap().unwrap();

    assert!(pool.allocate_default::<Tracked>().unwrap().is_none());
    assert_eq!(drops(), 0);

    // a moved-in value is dropped when there is no room for it
    assert!(pool.allocate(Tracked { value: 1 }).unwrap().is_none());
    assert_eq!(drops(), 1);

    unsafe { pool.deallocate(kept.as_ptr()).unwrap() };
    pool.close().unwrap();
}

#[test]
fn test_array_preconditions() {
    let mut stack = checked_stack(128);
    assert_eq!(
        stack.allocate_array::<u32>(0).unwrap_err().kind(),
        ErrorKind::ZeroLength
    );
    assert_eq!(
        stack.allocate_array::<()>(4).unwrap_err().kind(),
        ErrorKind::ZeroSize
    );
    assert_eq!(
        stack.allocate_array::<u64>(usize::MAX / 4).unwrap_err().kind(),
        ErrorKind::SizeOverflow
    );
    assert!(stack.allocate_array::<u64>(1024).unwrap().is_none());
    assert_eq!(
        unsafe { stack.deallocate_array::<u32>(std::ptr::null_mut()) }
            .unwrap_err()
            .kind(),
        ErrorKind::NullPointer
    );
    stack.close().unwrap();
}

#[test]
fn test_pool_array_must_fit_one_slot() {
    let mut pool = PoolAllocator::new(256, 64, 8).unwrap();
    // 8 header bytes + 7 elements fill one 64-byte slot exactly
    let array = pool.allocate_array::<u64>(7).unwrap().unwrap();
    assert_eq!(
        pool.allocate_array::<u64>(8).unwrap_err().kind(),
        ErrorKind::InvalidLayout
    );
    unsafe { pool.deallocate_array(array.as_ptr()).unwrap() };
    assert_eq!(pool.used_memory(), 0);
    pool.close().unwrap();
}
