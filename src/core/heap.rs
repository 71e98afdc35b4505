//! First-fit heap allocator used for kernel bookkeeping
//!
//! A single static arena backs the whole kernel; there is no notion of
//! per-object pools here, just one address-ordered free list threaded
//! through block headers that live inside the arena itself. Every free
//! block starts with a header `{next, size}`; the high bit of `size`
//! doubles as the allocated marker, cleared in free blocks and set in
//! allocated ones, so a corrupt or already-free pointer handed to
//! [`os_heap_free`] is detectable without a separate bitmap.
//!
//! The free list is terminated by a sentinel block placed at the tail
//! end of the arena (`END`), mirroring `pxEnd` in the reference
//! allocator; a second sentinel (`start`) sits before the first real
//! block so insertion never needs a null check for "is this the head".
//!
//! All mutation here assumes the caller holds the kernel's critical
//! section — there is no internal locking beyond that.

use core::ptr::NonNull;

use crate::config::{CFG_HEAP_ALIGN, CFG_HEAP_SIZE};
use crate::critical::critical_section;
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult};

const ALIGN_MASK: usize = CFG_HEAP_ALIGN - 1;

/// High bit of a block's `size` field: set means allocated, clear means free.
const ALLOC_BIT: u32 = 1 << 31;

/// Free-block / allocated-block header. Embedded directly at the start
/// of every block inside the arena.
#[repr(C)]
struct BlockHeader {
    next: Option<NonNull<BlockHeader>>,
    size: u32,
}

impl BlockHeader {
    const fn is_allocated(&self) -> bool {
        self.size & ALLOC_BIT != 0
    }

    const fn raw_size(&self) -> u32 {
        self.size & !ALLOC_BIT
    }
}

/// Header size, rounded up to the heap's byte alignment.
const HEADER_SIZE: usize = (core::mem::size_of::<BlockHeader>() + ALIGN_MASK) & !ALIGN_MASK;

struct HeapState {
    arena: [u8; CFG_HEAP_SIZE],
    /// Sentinel head of the free list; `start.next` is the first free block.
    start: BlockHeader,
    /// Sentinel tail placed at the arena's end; never itself allocated or freed.
    end: Option<NonNull<BlockHeader>>,
    free_bytes: usize,
    min_free_bytes: usize,
    initialized: bool,
}

impl HeapState {
    const fn new() -> Self {
        HeapState {
            arena: [0; CFG_HEAP_SIZE],
            start: BlockHeader { next: None, size: 0 },
            end: None,
            free_bytes: 0,
            min_free_bytes: 0,
            initialized: false,
        }
    }

    /// Align the arena, drop a tail sentinel in at its end, and make the
    /// rest of the arena one giant free block.
    fn init(&mut self) {
        let arena_addr = self.arena.as_mut_ptr() as usize;
        let aligned_addr = (arena_addr + ALIGN_MASK) & !ALIGN_MASK;
        let slack = aligned_addr - arena_addr;

        let mut usable = CFG_HEAP_SIZE - slack;
        usable -= HEADER_SIZE;
        usable &= !ALIGN_MASK;

        let end_ptr = (aligned_addr + usable) as *mut BlockHeader;
        unsafe {
            (*end_ptr).size = 0;
            (*end_ptr).next = None;
        }
        let end = unsafe { NonNull::new_unchecked(end_ptr) };

        let first_ptr = aligned_addr as *mut BlockHeader;
        let first_size = end_ptr as usize - first_ptr as usize;
        unsafe {
            (*first_ptr).size = first_size as u32;
            (*first_ptr).next = Some(end);
        }

        self.start.size = 0;
        self.start.next = Some(unsafe { NonNull::new_unchecked(first_ptr) });
        self.end = Some(end);
        self.free_bytes = first_size;
        self.min_free_bytes = first_size;
        self.initialized = true;
    }

    fn ensure_init(&mut self) {
        if !self.initialized {
            self.init();
        }
    }

    /// Insert a free block back into the address-ordered free list,
    /// merging with its physical predecessor and/or successor if either
    /// is adjacent. Mirrors `prvInsertBlockIntoFreeList`.
    ///
    /// # Safety
    /// `block` must not currently be linked into the free list, and its
    /// `size` must already have the allocated bit cleared.
    unsafe fn insert_free_block(&mut self, block: NonNull<BlockHeader>) {
        let end = self.end.expect("heap used before init");

        let mut iter = NonNull::from(&mut self.start);
        loop {
            let next = unsafe { iter.as_ref().next };
            match next {
                Some(n) if (n.as_ptr() as usize) < block.as_ptr() as usize => iter = n,
                _ => break,
            }
        }

        let mut insert = block;
        let iter_end = iter.as_ptr() as usize + unsafe { iter.as_ref().size } as usize;
        if iter_end == insert.as_ptr() as usize {
            let add = unsafe { insert.as_ref().size };
            unsafe { (*iter.as_ptr()).size += add };
            insert = iter;
        }

        let original_next = unsafe { iter.as_ref().next };
        let insert_end = insert.as_ptr() as usize + unsafe { insert.as_ref().size } as usize;

        match original_next {
            Some(next) if insert_end == next.as_ptr() as usize => {
                if next != end {
                    let next_size = unsafe { next.as_ref().size };
                    let next_next = unsafe { next.as_ref().next };
                    unsafe {
                        (*insert.as_ptr()).size += next_size;
                        (*insert.as_ptr()).next = next_next;
                    }
                } else {
                    unsafe { (*insert.as_ptr()).next = Some(end) };
                }
            }
            _ => unsafe { (*insert.as_ptr()).next = original_next },
        }

        if iter != insert {
            unsafe { (*iter.as_ptr()).next = Some(insert) };
        }
    }

    fn alloc(&mut self, n_bytes: usize) -> OsResult<NonNull<u8>> {
        self.ensure_init();

        if n_bytes == 0 {
            return Err(OsError::MemInvalidSize);
        }

        let mut wanted = n_bytes + HEADER_SIZE;
        wanted = (wanted + ALIGN_MASK) & !ALIGN_MASK;

        if wanted > u32::MAX as usize || (wanted as u32) & ALLOC_BIT != 0 {
            return Err(OsError::MemInvalidSize);
        }
        if wanted > self.free_bytes {
            return Err(OsError::MemNoFreeBlks);
        }

        let end = self.end.expect("heap used before init");
        let mut prev = NonNull::from(&mut self.start);
        let mut block = unsafe { prev.as_ref().next }.expect("free list always ends at sentinel");

        while (unsafe { block.as_ref().size } as usize) < wanted {
            match unsafe { block.as_ref().next } {
                Some(next) => {
                    prev = block;
                    block = next;
                }
                None => break,
            }
        }

        if block == end {
            return Err(OsError::MemNoFreeBlks);
        }

        let next_free = unsafe { block.as_ref().next };
        unsafe { (*prev.as_ptr()).next = next_free };

        let block_size = unsafe { block.as_ref().size } as usize;
        if block_size - wanted > HEADER_SIZE * 2 {
            let remainder_ptr = (block.as_ptr() as usize + wanted) as *mut BlockHeader;
            unsafe {
                (*remainder_ptr).size = (block_size - wanted) as u32;
                (*remainder_ptr).next = None;
                (*block.as_ptr()).size = wanted as u32;
                let remainder = NonNull::new_unchecked(remainder_ptr);
                self.insert_free_block(remainder);
            }
        }

        let granted = unsafe { block.as_ref().size } as usize;
        self.free_bytes -= granted;
        if self.free_bytes < self.min_free_bytes {
            self.min_free_bytes = self.free_bytes;
        }

        unsafe {
            (*block.as_ptr()).size |= ALLOC_BIT;
            (*block.as_ptr()).next = None;
        }

        let user_ptr = (block.as_ptr() as usize + HEADER_SIZE) as *mut u8;
        Ok(unsafe { NonNull::new_unchecked(user_ptr) })
    }

    fn free(&mut self, ptr: NonNull<u8>) {
        let header_ptr = (ptr.as_ptr() as usize - HEADER_SIZE) as *mut BlockHeader;
        let block = unsafe { NonNull::new_unchecked(header_ptr) };

        let header = unsafe { block.as_ref() };
        if !header.is_allocated() || header.next.is_some() {
            // Not our block, or already free / corrupt. Silently ignored
            // per the spec's "bad pointer to free" error design.
            return;
        }

        let size = header.raw_size();
        unsafe { (*block.as_ptr()).size = size };
        self.free_bytes += size as usize;

        unsafe { self.insert_free_block(block) };
    }
}

unsafe impl Send for HeapState {}

/// Global kernel heap instance.
static HEAP: CsCell<HeapState> = CsCell::new(HeapState::new());

/// Initialize the kernel heap. Idempotent; also runs lazily on first
/// [`os_heap_alloc`] if not called explicitly. Re-initializing discards
/// every live allocation, so this is meant to be called once at startup.
pub fn os_heap_init() {
    critical_section(|cs| HEAP.get(cs).init());
}

/// Allocate `n_bytes`, rounded up to the heap's alignment plus header
/// overhead. Returns `Err(MemInvalidSize)` for a zero-sized or
/// bit-overflowing request, `Err(MemNoFreeBlks)` if no free block is
/// large enough.
pub fn os_heap_alloc(n_bytes: usize) -> OsResult<NonNull<u8>> {
    critical_section(|cs| HEAP.get(cs).alloc(n_bytes))
}

/// Free a block previously returned by [`os_heap_alloc`]. `None` is a
/// no-op. A pointer that isn't a live allocation (already free, or not
/// one of ours) is silently ignored.
pub fn os_heap_free(ptr: Option<NonNull<u8>>) {
    if let Some(ptr) = ptr {
        critical_section(|cs| HEAP.get(cs).free(ptr));
    }
}

/// Bytes currently free in the kernel heap.
pub fn os_heap_free_bytes() -> usize {
    critical_section(|cs| {
        let state = HEAP.get(cs);
        state.ensure_init();
        state.free_bytes
    })
}

/// Smallest value `free_bytes` has ever taken, a high-water mark for
/// worst-case heap usage.
pub fn os_heap_min_free_bytes() -> usize {
    critical_section(|cs| {
        let state = HEAP.get(cs);
        state.ensure_init();
        state.min_free_bytes
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The kernel heap is a single global arena, exactly as it is on
    // target; host test threads don't get the real interrupt-disable
    // isolation a single Cortex-M core would give them, so serialize
    // these tests against one another explicitly.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn reset() -> std::sync::MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        critical_section(|cs| HEAP.get(cs).init());
        guard
    }

    #[test]
    fn init_reports_usable_capacity() {
        let _guard = reset();
        let free0 = os_heap_free_bytes();
        assert!(free0 > 0);
        assert!(free0 <= CFG_HEAP_SIZE);
        assert_eq!(os_heap_min_free_bytes(), free0);
    }

    #[test]
    fn alloc_zero_is_rejected() {
        let _guard = reset();
        assert_eq!(os_heap_alloc(0), Err(OsError::MemInvalidSize));
    }

    #[test]
    fn alloc_more_than_free_fails() {
        let _guard = reset();
        let free0 = os_heap_free_bytes();
        assert_eq!(os_heap_alloc(free0 + 1), Err(OsError::MemNoFreeBlks));
    }

    #[test]
    fn alloc_then_free_returns_to_baseline() {
        let _guard = reset();
        let free0 = os_heap_free_bytes();
        let p = os_heap_alloc(64).unwrap();
        assert!(os_heap_free_bytes() < free0);
        os_heap_free(Some(p));
        assert_eq!(os_heap_free_bytes(), free0);
    }

    #[test]
    fn free_of_null_is_noop() {
        let _guard = reset();
        let free0 = os_heap_free_bytes();
        os_heap_free(None);
        assert_eq!(os_heap_free_bytes(), free0);
    }

    #[test]
    fn double_free_is_ignored() {
        let _guard = reset();
        let free0 = os_heap_free_bytes();
        let p = os_heap_alloc(32).unwrap();
        os_heap_free(Some(p));
        let after_first_free = os_heap_free_bytes();
        assert_eq!(after_first_free, free0);
        // Second free of the same (now-free) pointer must not double-count.
        os_heap_free(Some(p));
        assert_eq!(os_heap_free_bytes(), after_first_free);
    }

    #[test]
    fn fragmentation_then_coalesce_restores_baseline() {
        // Scenario F from the spec's testable properties.
        let _guard = reset();
        let free0 = os_heap_free_bytes();

        let p1 = os_heap_alloc(100).unwrap();
        let p2 = os_heap_alloc(200).unwrap();
        let p3 = os_heap_alloc(300).unwrap();
        assert!(os_heap_free_bytes() < free0);

        os_heap_free(Some(p2));
        let after_p2 = os_heap_free_bytes();
        assert!(after_p2 > 0);

        os_heap_free(Some(p1));
        let after_p1 = os_heap_free_bytes();
        assert!(after_p1 > after_p2);

        os_heap_free(Some(p3));
        assert_eq!(os_heap_free_bytes(), free0);

        // Coalescing must have produced one contiguous block again.
        let big = os_heap_alloc(100 + 200 + 300).unwrap();
        os_heap_free(Some(big));
        assert_eq!(os_heap_free_bytes(), free0);
    }

    #[test]
    fn minimum_ever_free_tracks_worst_case() {
        let _guard = reset();
        let free0 = os_heap_free_bytes();
        let p1 = os_heap_alloc(1000).unwrap();
        let low_water = os_heap_free_bytes();
        os_heap_free(Some(p1));
        assert_eq!(os_heap_free_bytes(), free0);
        assert_eq!(os_heap_min_free_bytes(), low_water);
    }

    #[test]
    fn live_allocations_do_not_overlap() {
        let _guard = reset();
        let p1 = os_heap_alloc(50).unwrap();
        let p2 = os_heap_alloc(50).unwrap();
        let p3 = os_heap_alloc(50).unwrap();
        let a1 = p1.as_ptr() as usize;
        let a2 = p2.as_ptr() as usize;
        let a3 = p3.as_ptr() as usize;
        assert!(a1 + 50 <= a2 || a2 + 50 <= a1);
        assert!(a2 + 50 <= a3 || a3 + 50 <= a2);
        assert!(a1 + 50 <= a3 || a3 + 50 <= a1);
        os_heap_free(Some(p1));
        os_heap_free(Some(p2));
        os_heap_free(Some(p3));
    }
}
