use crate::kernel::time::Tick;
use aarch64_cpu::{
    asm::barrier,
    registers::{CNTFRQ_EL0, CNTPCT_EL0, CNTP_CTL_EL0, CNTP_TVAL_EL0},
};
use core::num::NonZeroU32;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

mod timer_irq_lock;
pub use timer_irq_lock::TimerIrqGuard;

/// Milliseconds between two consecutive preemption points
pub const QUANTUM_MS: u32 = 100;

/// Returns the frequency of the system timer, in Hz
pub fn frequency() -> NonZeroU32 {
    // The upper 32 bits are reserved to 0
    u32::try_from(CNTFRQ_EL0.get())
        .expect("The clock frequency should fit into 32 bits")
        .try_into()
        .expect("The clock frequency should not be 0")
}

/// Returns the current value of the system timer
pub fn current_tick() -> Tick {
    // Prevent that the counter is read ahead of time due to out-of-order execution.
    barrier::isb(barrier::SY);
    Tick::new(CNTPCT_EL0.get())
}

/// Arms the per-core countdown timer to fire in `interval_ms` milliseconds, with its interrupt
/// unmasked
pub fn arm(interval_ms: u32) {
    let interval = u64::from(frequency().get() / 1000) * u64::from(interval_ms);
    CNTP_TVAL_EL0.set(interval);
    CNTP_CTL_EL0.modify(CNTP_CTL_EL0::ENABLE::SET + CNTP_CTL_EL0::IMASK::CLEAR);
}

/// Re-arms the per-core timer for another quantum; must be called on every firing regardless of
/// whether the scheduler actually switches tasks
pub fn rearm() {
    arm(QUANTUM_MS);
}