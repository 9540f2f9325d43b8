//! Synchronization primitives
//!
//! A single coarse spinlock discipline is used throughout the kernel: the ready queue, TCB pool,
//! page bitmap, and heap free list are each one global behind one `SpinLock`. This is intentional
//! (see the design notes on the coarse lock) rather than an oversight.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Guarantees single-access of the enclosed data
pub trait Mutex {
    /// The type of state that is wrapped by this mutex.
    type State;

    /// Locks the mutex and grants the closure temporary mutable access to the inner state
    fn lock<'a, R>(&'a self, f: impl FnOnce(&'a mut Self::State) -> R) -> R;
}

/// A spinlock mutex, acquired with an exclusive load and released with a store, backing off on
/// contention with `wfe`/`sev` rather than busy-spinning
pub struct SpinLock<T: ?Sized> {
    /// Whether or not the spinlock is taken
    is_locked: AtomicBool,
    /// The protected data
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted while `is_locked` is held
unsafe impl<T> Send for SpinLock<T> {}
// SAFETY: the spinlock guarantees mutual exclusion over `data`
unsafe impl<T> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a spinlock around the given data
    pub const fn new(data: T) -> Self {
        Self {
            data: UnsafeCell::new(data),
            is_locked: AtomicBool::new(false),
        }
    }

    /// Locks the mutex. The mutex is automatically unlocked when the returned `SpinLockGuard` is
    /// dropped
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        #[cfg(target_arch = "aarch64")]
        use aarch64_cpu::asm::{sev, wfe};
        #[cfg(not(target_arch = "aarch64"))]
        fn wfe() {}
        #[cfg(not(target_arch = "aarch64"))]
        fn sev() {}

        while self.is_locked.swap(true, Ordering::Acquire) {
            while self.is_locked.load(Ordering::Relaxed) {
                wfe();
            }
        }
        let _ = sev;
        SpinLockGuard { lock: self }
    }
}

impl<T> Mutex for SpinLock<T> {
    type State = T;

    fn lock<'a, R>(&'a self, f: impl FnOnce(&'a mut Self::State) -> R) -> R {
        let guard = SpinLock::lock(self);
        // SAFETY: `guard` proves the lock is held for the duration of this call, so granting `f`
        // a `'a`-lifetime reference is sound as long as it doesn't outlive `guard`'s drop below.
        let state = unsafe { &mut *self.data.get() };
        let result = f(state);
        drop(guard);
        result
    }
}

/// RAII guard returned by [`SpinLock::lock`]; releases the lock on drop
pub struct SpinLockGuard<'locked, T> {
    /// The spinlock this guard releases on drop
    lock: &'locked SpinLock<T>,
}

impl<'locked, T> Deref for SpinLockGuard<'locked, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: holding the guard proves the lock is held, granting exclusive access
        unsafe { &*self.lock.data.get() }
    }
}

impl<'locked, T> DerefMut for SpinLockGuard<'locked, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: holding the guard proves the lock is held, granting exclusive access
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'locked, T> Drop for SpinLockGuard<'locked, T> {
    fn drop(&mut self) {
        #[cfg(target_arch = "aarch64")]
        use aarch64_cpu::asm::sev;
        #[cfg(not(target_arch = "aarch64"))]
        fn sev() {}

        self.lock.is_locked.store(false, Ordering::Release);
        sev();
    }
}

#[cfg(test)]
mod tests {
    use super::SpinLock;

    #[test]
    fn lock_grants_exclusive_access() {
        let lock = SpinLock::new(0_u32);
        *lock.lock() += 1;
        *lock.lock() += 41;
        assert_eq!(*lock.lock(), 42);
    }
}
