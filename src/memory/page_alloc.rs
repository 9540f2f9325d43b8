//! Bitmap-based physical page allocator
//!
//! One bit per page over a contiguous managed region; bit = 1 means allocated. The bitmap itself
//! lives at a fixed address below the managed region, chosen to stay clear of the kernel image.

use crate::{architecture::exception::Guard, call_once, log, sync::SpinLock};

/// Page size, in bytes
pub const PAGE_SIZE: usize = 0x1000;

/// Start of the bitmap, in physical memory
#[cfg(target_arch = "aarch64")]
#[allow(clippy::as_conversions)]
const BITMAP_ADDR: *mut u8 = 0x10_0000 as *mut u8;
/// Start of the region the bitmap tracks: immediately past the bitmap's own page range
#[cfg(target_arch = "aarch64")]
#[allow(clippy::as_conversions)]
const MANAGED_BASE: usize = 0x20_0000;
/// Size of the managed region: 64 MiB
const MANAGED_SIZE: usize = 64 * 1024 * 1024;
/// Number of pages tracked by the bitmap
const NUM_PAGES: usize = MANAGED_SIZE / PAGE_SIZE;
/// Number of bytes needed to hold one bit per page
const BITMAP_BYTES: usize = NUM_PAGES.div_ceil(8);

struct Bitmap {
    /// Backing bytes for the bitmap, one bit per page
    bytes: &'static mut [u8],
    /// Number of pages tracked by this bitmap
    num_pages: usize,
    /// Number of pages currently allocated
    used: usize,
}

// SAFETY: the bitmap is only ever accessed through the `SpinLock` below
unsafe impl Send for Bitmap {}

impl Bitmap {
    fn is_set(&self, page: usize) -> bool {
        self.bytes[page / 8] & (1 << (page % 8)) != 0
    }

    fn set(&mut self, page: usize) {
        self.bytes[page / 8] |= 1 << (page % 8);
    }

    fn clear(&mut self, page: usize) {
        self.bytes[page / 8] &= !(1 << (page % 8));
    }

    /// Scans for `count` consecutive clear bits and returns the index of the first one
    fn find_run(&self, count: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;
        for page in 0..self.num_pages {
            if self.is_set(page) {
                run_len = 0;
                run_start = page + 1;
            } else {
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            }
        }
        None
    }
}

static BITMAP: SpinLock<Option<Bitmap>> = SpinLock::new(None);

/// Base address of the managed region
///
/// On real hardware this is a fixed physical address, safe to use because it is identity-mapped
/// and reserved for exactly this purpose. Host unit tests have no such mapping, so they instead
/// carve the managed region (and the bitmap backing it) out of the host allocator once, lazily.
fn managed_base() -> usize {
    #[cfg(target_arch = "aarch64")]
    {
        MANAGED_BASE
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        use core::sync::atomic::{AtomicUsize, Ordering};
        static BASE: AtomicUsize = AtomicUsize::new(0);
        let existing = BASE.load(Ordering::Acquire);
        if existing != 0 {
            return existing;
        }
        let buf: &'static mut [u8] = alloc::vec![0_u8; MANAGED_SIZE].leak();
        let addr = buf.as_mut_ptr() as usize;
        BASE.store(addr, Ordering::Release);
        addr
    }
}

/// Initializes the page allocator over the managed physical region
pub fn init() {
    call_once!();
    #[cfg(target_arch = "aarch64")]
    // SAFETY: `BITMAP_ADDR` is reserved for exactly this use and large enough for `BITMAP_BYTES`
    let bytes = unsafe { core::slice::from_raw_parts_mut(BITMAP_ADDR, BITMAP_BYTES) };
    #[cfg(not(target_arch = "aarch64"))]
    let bytes: &'static mut [u8] = alloc::vec![0_u8; BITMAP_BYTES].leak();
    bytes.fill(0);
    let _guard = Guard::new();
    *BITMAP.lock() = Some(Bitmap { bytes, num_pages: NUM_PAGES, used: 0 });
}

/// Allocates `count` contiguous pages, returning the physical address of the first one
///
/// Returns `None` if `count` is 0 or no long enough run of free pages exists.
pub fn page_alloc_n(count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let _irq_guard = Guard::new();
    let mut guard = BITMAP.lock();
    let bitmap = guard.as_mut().expect("page allocator must be initialized");
    let start = bitmap.find_run(count)?;
    for page in start..start + count {
        bitmap.set(page);
    }
    bitmap.used += count;
    Some(managed_base() + start * PAGE_SIZE)
}

/// Frees `count` contiguous pages previously returned by [`page_alloc_n`]
///
/// Addresses below the managed region are silently ignored. Freeing pages that are already free
/// is not detected (matches a double-free) and simply clears already-clear bits.
pub fn page_free_n(addr: usize, count: usize) {
    let base = managed_base();
    if addr < base {
        log!("page_free_n: address 0x{addr:x} is below the managed region, ignoring");
        return;
    }
    let start = (addr - base) / PAGE_SIZE;
    if start + count > NUM_PAGES {
        log!("page_free_n: range starting at 0x{addr:x} exceeds the managed region, ignoring");
        return;
    }
    let _irq_guard = Guard::new();
    let mut guard = BITMAP.lock();
    let bitmap = guard.as_mut().expect("page allocator must be initialized");
    for page in start..start + count {
        bitmap.clear(page);
    }
    bitmap.used = bitmap.used.saturating_sub(count);
}

/// Page usage counters: (total, free, used)
pub fn stats() -> (usize, usize, usize) {
    let _irq_guard = Guard::new();
    let guard = BITMAP.lock();
    let bitmap = guard.as_ref().expect("page allocator must be initialized");
    (NUM_PAGES, NUM_PAGES - bitmap.used, bitmap.used)
}

/// Initializes the page allocator if it hasn't been already, for tests that share the global
/// allocator across many `#[test]` functions (unlike [`init`], safe to call more than once)
#[cfg(test)]
pub(crate) fn ensure_initialized_for_tests() {
    use core::sync::atomic::{AtomicBool, Ordering};
    static DONE: AtomicBool = AtomicBool::new(false);
    if !DONE.swap(true, Ordering::Relaxed) {
        init();
    }
}

#[cfg(test)]
mod tests {
    use super::Bitmap;
    use alloc::{boxed::Box, vec};

    fn test_bitmap(num_pages: usize) -> Bitmap {
        let bytes = Box::leak(vec![0_u8; num_pages.div_ceil(8)].into_boxed_slice());
        Bitmap { bytes, num_pages, used: 0 }
    }

    #[test]
    fn find_run_locates_first_fit() {
        let mut bitmap = test_bitmap(16);
        bitmap.set(0);
        bitmap.set(1);
        assert_eq!(bitmap.find_run(3), Some(2));
    }

    #[test]
    fn alloc_free_round_trip_clears_bits() {
        let mut bitmap = test_bitmap(16);
        let start = bitmap.find_run(4).expect("a run of 4 should exist");
        for page in start..start + 4 {
            bitmap.set(page);
        }
        assert!((0..4).all(|p| bitmap.is_set(p)));
        for page in start..start + 4 {
            bitmap.clear(page);
        }
        assert!((0..16).all(|p| !bitmap.is_set(p)));
    }

    #[test]
    fn no_run_found_when_full() {
        let mut bitmap = test_bitmap(4);
        for page in 0..4 {
            bitmap.set(page);
        }
        assert_eq!(bitmap.find_run(1), None);
    }
}
