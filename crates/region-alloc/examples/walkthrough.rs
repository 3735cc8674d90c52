//! Walkthrough of the linear, stack and pool allocators
//!
//! Allocator events are printed through a `tracing` subscriber:
//! `cargo run --example walkthrough`

use std::time::Instant;

use region_alloc::prelude::*;

const MEMORY_SIZE: usize = 4096 * 4096;
const ARRAY_LENGTH: usize = 42;
const BENCH_ITEMS: usize = 200_000;

#[derive(Debug, Default, Clone, Copy)]
struct Record {
    id: i32,
    tag: u8,
    active: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    main_section("BASIC OPERATIONS");
    demo_linear()?;
    demo_stack()?;
    demo_pool()?;

    main_section("BENCHMARK");
    bench_against_box()?;

    Ok(())
}

fn demo_linear() -> AllocResult<()> {
    sub_section("Linear allocator over a borrowed buffer");

    let mut buffer = vec![0u8; MEMORY_SIZE];
    let mut linear = LinearAllocator::from_slice(&mut buffer)?;

    let timer = Instant::now();
    match linear.allocate_default::<Record>()? {
        Some(record) => {
            let record = unsafe { *record.as_ptr() };
            println!(
                "record {} tagged {} active={}",
                record.id, record.tag, record.active
            );
        }
        None => println!("couldn't allocate a single record"),
    }
    report("allocated a single item", timer, &linear);

    let timer = Instant::now();
    let records = linear.allocate_array::<Record>(ARRAY_LENGTH)?;
    report(&format!("allocated an array of {ARRAY_LENGTH} items"), timer, &linear);

    if let Some(records) = records {
        // individual release is not available on a linear allocator
        match unsafe { linear.deallocate_array(records.as_ptr()) } {
            Ok(()) => println!("array released"),
            Err(err) => println!("{} caught: {err}", err.code()),
        }
    }

    let timer = Instant::now();
    linear.clear();
    report("linear allocator cleared", timer, &linear);
    linear.close()?;

    sub_section("Linear allocator owning its region");
    let mut owned = LinearAllocator::new(MEMORY_SIZE)?;
    let timer = Instant::now();
    if owned.allocate_array::<Record>(ARRAY_LENGTH)?.is_none() {
        println!("couldn't allocate an array of {ARRAY_LENGTH} records");
    }
    report("allocated an array in owned memory", timer, &owned);
    owned.clear();
    owned.close()
}

fn demo_stack() -> AllocResult<()> {
    sub_section("Stack allocator");

    let mut stack = StackAllocator::new(64)?;
    let a = stack.allocate(0xA_u64)?.ok_or_else(exhausted)?;
    let b = stack.allocate(0xB_u64)?.ok_or_else(exhausted)?;
    report("allocated A and B", Instant::now(), &stack);

    unsafe { stack.deallocate(b.as_ptr())? };
    report("released B", Instant::now(), &stack);
    unsafe { stack.deallocate(a.as_ptr())? };
    report("released A", Instant::now(), &stack);

    stack.close()
}

fn demo_pool() -> AllocResult<()> {
    sub_section("Pool allocator");

    let mut pool = PoolAllocator::with_slots::<u32>(10)?;
    let mut slots = Vec::new();
    while let Some(slot) = pool.allocate(slots.len() as u32)? {
        slots.push(slot);
    }
    println!(
        "filled {} of {} slots, {} free",
        slots.len(),
        pool.slot_count(),
        pool.free_slots()
    );

    for slot in slots {
        unsafe { pool.deallocate(slot.as_ptr())? };
    }
    println!("{}", pool.stats());
    pool.close()
}

fn bench_against_box() -> AllocResult<()> {
    sub_section(&format!("{BENCH_ITEMS} records: Box vs linear allocator"));

    let timer = Instant::now();
    let boxed: Vec<Box<Record>> = (0..BENCH_ITEMS)
        .map(|i| {
            Box::new(Record {
                id: i as i32,
                ..Record::default()
            })
        })
        .collect();
    println!("Box::new: {:?}", timer.elapsed());
    drop(boxed);

    let mut linear = LinearAllocator::with_config(
        Region::acquire(BENCH_ITEMS * size_of::<Record>() * 2)?,
        AllocatorConfig::performance(),
    );
    let timer = Instant::now();
    for i in 0..BENCH_ITEMS {
        let record = Record {
            id: i as i32,
            tag: b'r',
            active: true,
        };
        if linear.allocate(record)?.is_none() {
            break;
        }
    }
    println!("linear allocate: {:?}", timer.elapsed());
    println!("{}", linear.stats());

    linear.clear();
    linear.close()
}

fn exhausted() -> AllocError {
    AllocError::invalid_state("region has room", "region exhausted")
}

fn report<S: Strategy>(what: &str, timer: Instant, allocator: &Allocator<'_, S>) {
    println!(
        "{what} in {:?}, there are {} allocations and {} bytes of memory used",
        timer.elapsed(),
        allocator.num_allocations(),
        allocator.used_memory()
    );
}

fn print_section(name: &str, horizontal: char, bottom_length: usize) {
    let bar: String = std::iter::repeat_n(horizontal, name.len() + 2).collect();
    let tail: String =
        std::iter::repeat_n(horizontal, bottom_length.saturating_sub(name.len() + 4)).collect();
    println!("\n+{bar}+");
    println!("| {name} |");
    println!("+{bar}+{tail}");
}

fn main_section(name: &str) {
    print_section(name, '=', 80);
}

fn sub_section(name: &str) {
    print_section(name, '-', 80);
}
