//! Heap Stress Demo - fragmentation and coalescing
//!
//! Allocates a checkerboard of blocks, frees every other one to
//! fragment the arena, then frees the rest and checks that free
//! bytes returns to (near) the initial baseline — demonstrating the
//! first-fit allocator's bidirectional coalescing.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt::info;
use minikernel::heap;

const BLOCKS: usize = 16;
const BLOCK_SIZE: usize = 64;

#[entry]
fn main() -> ! {
    info!("Heap Stress Demo");

    heap::os_heap_init();

    let baseline = heap::os_heap_free_bytes();
    info!("baseline free: {} bytes", baseline);

    let mut ptrs: [Option<core::ptr::NonNull<u8>>; BLOCKS] = [None; BLOCKS];

    for slot in ptrs.iter_mut() {
        *slot = heap::os_heap_alloc(BLOCK_SIZE).ok();
    }

    let after_alloc = heap::os_heap_free_bytes();
    info!("after {} allocs: {} bytes free", BLOCKS, after_alloc);

    // Free every other block to fragment the arena.
    for (i, slot) in ptrs.iter_mut().enumerate() {
        if i % 2 == 0 {
            heap::os_heap_free(slot.take());
        }
    }

    let fragmented = heap::os_heap_free_bytes();
    info!("after fragmenting: {} bytes free", fragmented);

    // Free the remainder; coalescing should restore the baseline.
    for slot in ptrs.iter_mut() {
        heap::os_heap_free(slot.take());
    }

    let restored = heap::os_heap_free_bytes();
    info!("after freeing all: {} bytes free (baseline {})", restored, baseline);
    info!("minimum ever free: {} bytes", heap::os_heap_min_free_bytes());

    assert_eq!(restored, baseline);

    loop {
        cortex_m::asm::wfi();
    }
}
