/// The platform interrupt controller (GICv2 + local timer routing)
pub mod gic;
/// Thin wrapper for typed access to a memory-mapped register block
mod mmio;
/// UART (PL011) support
mod uart;

pub use mmio::Mmio;
pub use uart::serial;

use crate::call_once;

#[cfg(target_arch = "aarch64")]
extern "C" {
    // Must not be run on concurrent execution paths with the same core ID
    fn _per_core_init() -> !;
}

/// Wakes up all cores and runs their per-core initialization sequences
/// # Safety
/// Must only be called once
#[cfg(target_arch = "aarch64")]
pub unsafe fn wake_all_cores() {
    call_once!();
    #[allow(clippy::as_conversions)]
    // SAFETY: These are the Raspberry Pi 4 spin-table wakeup slots for cores 1, 2, and 3
    unsafe {
        // Tell the cores to start running the per core init sequence
        core::ptr::write_volatile(0xE0 as *mut unsafe extern "C" fn() -> !, _per_core_init);
        core::ptr::write_volatile(0xE8 as *mut unsafe extern "C" fn() -> !, _per_core_init);
        core::ptr::write_volatile(0xF0 as *mut unsafe extern "C" fn() -> !, _per_core_init);
    }
    // make sure the cores are notified to wake up
    aarch64_cpu::asm::sev();
}

/// Host-test stand-in: there is no spin-table to poke off-target
/// # Safety
/// Must only be called once
#[cfg(not(target_arch = "aarch64"))]
pub unsafe fn wake_all_cores() {
    call_once!();
}

/// Board-specific initialization sequences
/// # Safety
/// Must be initialized only once
pub unsafe fn init() {
    call_once!();
    serial().init();
    gic::init();
}

/// Per-core board initialization: the GIC CPU interface and local timer routing
pub fn per_core_init() {
    gic::per_core_init();
}
