//! Integration tests for the linear allocator

use region_alloc::allocator::{AllocatorConfig, LinearAllocator, Region};
use region_alloc::error::ErrorKind;

#[test]
fn test_linear_starts_empty_and_closes_clean() {
    let linear = LinearAllocator::new(256).expect("Failed to create linear allocator");
    assert_eq!(linear.used_memory(), 0);
    assert_eq!(linear.num_allocations(), 0);
    assert!(linear.region().is_owned());
    linear.close().expect("Fresh allocator should close clean");
}

#[test]
fn test_linear_scenario_clear_after_nine_bytes() {
    let mut linear = LinearAllocator::new(4096).expect("Failed to create linear allocator");

    let block = linear
        .allocate_raw(9, 1)
        .expect("Allocation failed")
        .expect("Region should have room");
    assert_eq!(block, linear.start());
    assert_eq!(linear.used_memory(), 9);

    linear.clear();
    assert_eq!(linear.used_memory(), 0);
    assert_eq!(linear.num_allocations(), 0);
    linear.close().expect("Cleared allocator should close clean");
}

#[test]
fn test_linear_clear_returns_region_start() {
    let mut linear = LinearAllocator::new(1024).expect("Failed to create linear allocator");

    for size in [3, 17, 64, 5] {
        linear
            .allocate_raw(size, 1)
            .expect("Allocation failed")
            .expect("Region should have room");
    }
    assert_eq!(linear.num_allocations(), 4);

    linear.clear();
    let again = linear
        .allocate_raw(32, 1)
        .expect("Allocation failed")
        .expect("Region should have room");
    assert_eq!(again, linear.start());
    linear.clear();
}

#[test]
fn test_linear_deallocate_always_unsupported() {
    let mut linear = LinearAllocator::new(128).expect("Failed to create linear allocator");
    let raw = linear.allocate_raw(8, 8).unwrap().unwrap();
    let value = linear.allocate(String::from("kept")).unwrap().unwrap();
    let array = linear.allocate_array::<u16>(4).unwrap().unwrap();

    unsafe {
        let err = linear.deallocate_raw(raw.as_ptr()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(err.is_unsupported());

        let err = linear.deallocate(value.as_ptr()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        // the value was not dropped by the failed call
        assert_eq!(&*value.as_ptr(), "kept");

        let err = linear.deallocate_array(array.as_ptr()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        // foreign addresses are refused the same way
        let mut local = 0u8;
        let err = linear.deallocate_raw(&raw mut local).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        std::ptr::drop_in_place(value.as_ptr());
    }
    assert_eq!(linear.num_allocations(), 3);
    linear.clear();
}

#[test]
fn test_linear_exhaustion_returns_none() {
    let mut buf = [0u8; 32];
    let mut linear = LinearAllocator::from_slice(&mut buf).expect("Failed to create linear allocator");

    assert!(linear.allocate_raw(32, 1).unwrap().is_some());
    assert!(linear.allocate_raw(1, 1).unwrap().is_none());
    assert!(linear.allocate(7u8).unwrap().is_none());
    assert_eq!(linear.num_allocations(), 1);
    linear.clear();
}

#[test]
fn test_linear_close_reports_leak() {
    let mut linear = LinearAllocator::with_config(
        Region::acquire(64).unwrap(),
        AllocatorConfig::production(),
    );
    linear.allocate_raw(16, 8).unwrap().unwrap();

    let err = linear.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeakDetected);
    assert!(err.is_leak());
}

#[test]
fn test_linear_zero_size_rejected() {
    let mut linear = LinearAllocator::new(64).unwrap();
    let err = linear.allocate_raw(0, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ZeroSize);
    assert_eq!(err.condition(), "size > 0");
    assert!(err.file().ends_with("base.rs"));

    let err = linear.allocate_raw(8, 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAlignment);

    assert_eq!(
        LinearAllocator::new(0).unwrap_err().kind(),
        ErrorKind::InvalidConfig
    );
}

#[test]
fn test_linear_sync_operations() {
    let linear = LinearAllocator::new(256).unwrap();
    let checkpoint = linear.checkpoint_sync();

    let value = linear.allocate_sync(11u64).unwrap().unwrap();
    assert_eq!(unsafe { *value.as_ptr() }, 11);
    let array = linear.allocate_array_sync::<u8>(10).unwrap().unwrap();
    assert_eq!(unsafe { *array.as_ptr().add(9) }, 0);
    assert_eq!(linear.num_allocations(), 2);

    linear.rewind_sync(checkpoint).unwrap();
    assert_eq!(linear.used_memory(), 0);
    linear.clear_sync();
    linear.close().unwrap();
}
