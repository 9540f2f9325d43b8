//! Physical memory management: a bitmap page allocator and a small-object heap built on top of it

pub mod heap;
pub mod page_alloc;

/// Initializes the physical allocator and the kernel heap
/// # Safety
/// Must be called exactly once, before any allocation
pub unsafe fn init() {
    crate::call_once!();
    page_alloc::init();
    // SAFETY: the page allocator is initialized immediately above
    unsafe {
        heap::init();
    }
}
