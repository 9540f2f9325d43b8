use aarch64_cpu::asm::wfi;

/// Parks this core in a low-power wait loop forever
///
/// This is the fate of a core after a fatal error: there is no supervisor to restart the kernel,
/// so the only correct move is to stop scheduling work on it.
pub fn halt() -> ! {
    loop {
        wfi();
    }
}

/// Exits the test harness, as appropriate
///
/// In QEMU, this exits QEMU with the given status code. This is reserved for the `#[cfg(test)]`
/// harness: production boots never call this, since there is nothing for the kernel to exit to.
pub fn shutdown(exit_code: u32) -> ! {
    use crate::{architecture, log};
    use core::sync::atomic::{AtomicBool, Ordering};

    /// Stores whether or not a shutdown has already been called
    static SHUTDOWN_CALLED: AtomicBool = AtomicBool::new(false);
    if SHUTDOWN_CALLED.swap(true, Ordering::Relaxed) {
        halt();
    }

    log!(
        "Core {}: test harness exit ({})",
        architecture::machine::core_id(),
        exit_code
    );

    #[cfg(target_arch = "aarch64")]
    {
        use qemu_exit::QEMUExit;
        qemu_exit::AArch64::new().exit(exit_code);
    }
    #[cfg(not(target_arch = "aarch64"))]
    halt();
}
