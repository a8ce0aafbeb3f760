//! Kernel heap
//!
//! A linked-list allocator over a static region. Everything the kernel
//! allocates dynamically (the stack arena at boot, one buffer per live pipe)
//! comes from here; user processes have no heap of their own.

#[cfg(target_os = "none")]
use linked_list_allocator::LockedHeap;

#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// 512 KiB serves the fixed tables comfortably; there is no demand growth.
#[cfg(target_os = "none")]
const HEAP_SIZE: usize = 0x8_0000;

#[cfg(target_os = "none")]
static mut HEAP_SPACE: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

/// Hand the heap region to the allocator.
///
/// # Safety
/// Call exactly once, before the first allocation.
#[cfg(target_os = "none")]
pub unsafe fn init() {
    let space = &raw mut HEAP_SPACE;
    ALLOCATOR.lock().init(space as *mut u8, HEAP_SIZE);
}
