use crate::{add_test, call_once_per_core, kernel::exception::PrivilegeLevel};
use aarch64_cpu::{
    asm::barrier,
    registers::{CurrentEL, CNTP_CTL_EL0, SCTLR_EL1},
};
#[cfg(target_arch = "aarch64")]
use aarch64_cpu::registers::{DAIF, VBAR_EL1};
use tock_registers::interfaces::{ReadWriteable, Readable};
#[cfg(target_arch = "aarch64")]
use tock_registers::interfaces::Writeable;

// The exception vector table and the IRQ trapframe save/restore stub are naked functions rather
// than a separate assembled `.s` file; see `vector` below.
#[cfg(target_arch = "aarch64")]
mod vector {
    use crate::{architecture::exception_handlers, sched};
    use core::arch::naked_asm;

    /// The 16-entry, 2 KiB-aligned AArch64 exception vector table
    ///
    /// Each of the 4 groups (current EL SP0, current EL SPx, lower EL AArch64, lower EL AArch32)
    /// holds 4 entries (sync, IRQ, FIQ, SError), each occupying exactly 0x80 bytes. All but the
    /// current-EL-SPx IRQ entry tail-branch straight into a handler that never returns; that one
    /// entry branches into `curr_elx_irq_entry`, which saves a full trapframe before calling into
    /// Rust.
    #[unsafe(naked)]
    #[no_mangle]
    #[link_section = ".text._exception_vector"]
    pub unsafe extern "C" fn _exception_vector() -> ! {
        naked_asm!(
            ".balign 0x800",
            "b {curr_el0_sync}",
            ".balign 0x80",
            "b {curr_el0_irq}",
            ".balign 0x80",
            "b {curr_el0_fiq}",
            ".balign 0x80",
            "b {curr_el0_other}",
            ".balign 0x80",
            "b {curr_elx_sync}",
            ".balign 0x80",
            "b {curr_elx_irq_entry}",
            ".balign 0x80",
            "b {curr_elx_fiq}",
            ".balign 0x80",
            "b {curr_elx_other}",
            ".balign 0x80",
            "b {lower_sync_64}",
            ".balign 0x80",
            "b {lower_irq_64}",
            ".balign 0x80",
            "b {lower_fiq_64}",
            ".balign 0x80",
            "b {lower_other_64}",
            ".balign 0x80",
            "b {lower_sync_32}",
            ".balign 0x80",
            "b {lower_irq_32}",
            ".balign 0x80",
            "b {lower_fiq_32}",
            ".balign 0x80",
            "b {lower_other_32}",
            curr_el0_sync = sym exception_handlers::handle_curr_el0_sync,
            curr_el0_irq = sym exception_handlers::handle_curr_el0_irq,
            curr_el0_fiq = sym exception_handlers::handle_curr_el0_fiq,
            curr_el0_other = sym exception_handlers::handle_curr_el0_other,
            curr_elx_sync = sym exception_handlers::handle_curr_elx_sync,
            curr_elx_irq_entry = sym curr_elx_irq_entry,
            curr_elx_fiq = sym exception_handlers::handle_curr_elx_fiq,
            curr_elx_other = sym exception_handlers::handle_curr_elx_other,
            lower_sync_64 = sym exception_handlers::handle_lower_el_sync_64,
            lower_irq_64 = sym exception_handlers::handle_lower_el_irq_64,
            lower_fiq_64 = sym exception_handlers::handle_lower_el_fiq_64,
            lower_other_64 = sym exception_handlers::handle_lower_el_other_64,
            lower_sync_32 = sym exception_handlers::handle_lower_el_sync_32,
            lower_irq_32 = sym exception_handlers::handle_lower_el_irq_32,
            lower_fiq_32 = sym exception_handlers::handle_lower_el_fiq_32,
            lower_other_32 = sym exception_handlers::handle_lower_el_other_32,
        )
    }

    /// Saves a 34-word trapframe (the same layout `sched::build_trapframe` synthesizes for a new
    /// task), calls `handle_curr_elx_irq(old_sp) -> new_sp`, then restores from `new_sp` and
    /// returns
    ///
    /// `x9`/`x10` are clobbered to stage `ELR_EL1`/`SPSR_EL1` only after they are already safely
    /// on the outgoing stack, and are restored from the (possibly different) incoming frame by
    /// the final `ldp` pass.
    #[unsafe(naked)]
    unsafe extern "C" fn curr_elx_irq_entry() -> ! {
        naked_asm!(
            "sub sp, sp, #{frame_bytes}",
            "stp x0, x1, [sp, #0]",
            "stp x2, x3, [sp, #16]",
            "stp x4, x5, [sp, #32]",
            "stp x6, x7, [sp, #48]",
            "stp x8, x9, [sp, #64]",
            "stp x10, x11, [sp, #80]",
            "stp x12, x13, [sp, #96]",
            "stp x14, x15, [sp, #112]",
            "stp x16, x17, [sp, #128]",
            "stp x18, x19, [sp, #144]",
            "stp x20, x21, [sp, #160]",
            "stp x22, x23, [sp, #176]",
            "stp x24, x25, [sp, #192]",
            "stp x26, x27, [sp, #208]",
            "stp x28, x29, [sp, #224]",
            "str x30, [sp, #{lr_off}]",
            "mrs x9, ELR_EL1",
            "str x9, [sp, #{elr_off}]",
            "mrs x9, SPSR_EL1",
            "str x9, [sp, #{spsr_off}]",
            "mov x0, sp",
            "bl {handler}",
            "mov sp, x0",
            "ldr x9, [sp, #{elr_off}]",
            "msr ELR_EL1, x9",
            "ldr x9, [sp, #{spsr_off}]",
            "msr SPSR_EL1, x9",
            "ldp x0, x1, [sp, #0]",
            "ldp x2, x3, [sp, #16]",
            "ldp x4, x5, [sp, #32]",
            "ldp x6, x7, [sp, #48]",
            "ldp x8, x9, [sp, #64]",
            "ldp x10, x11, [sp, #80]",
            "ldp x12, x13, [sp, #96]",
            "ldp x14, x15, [sp, #112]",
            "ldp x16, x17, [sp, #128]",
            "ldp x18, x19, [sp, #144]",
            "ldp x20, x21, [sp, #160]",
            "ldp x22, x23, [sp, #176]",
            "ldp x24, x25, [sp, #192]",
            "ldp x26, x27, [sp, #208]",
            "ldp x28, x29, [sp, #224]",
            "ldr x30, [sp, #{lr_off}]",
            "add sp, sp, #{frame_bytes}",
            "eret",
            frame_bytes = const sched::TRAPFRAME_BYTES,
            lr_off = const sched::LR_WORD * 8,
            elr_off = const sched::ELR_WORD * 8,
            spsr_off = const sched::SPSR_WORD * 8,
            handler = sym exception_handlers::handle_curr_elx_irq,
        )
    }
}

/// Exception level
pub fn el() -> PrivilegeLevel {
    match CurrentEL.read_as_enum(CurrentEL::EL) {
        Some(CurrentEL::EL::Value::EL2) => PrivilegeLevel::Hypervisor,
        Some(CurrentEL::EL::Value::EL1) => PrivilegeLevel::Kernel,
        Some(CurrentEL::EL::Value::EL0) => PrivilegeLevel::User,
        _ => PrivilegeLevel::Unknown,
    }
}

/// Initializes certain exceptions
pub fn init() {}

/// Ready exception handling by setting the exception vector base address register.
pub fn per_core_init() {
    #[cfg(target_arch = "aarch64")]
    {
        extern "Rust" {
            static _exception_vector: core::cell::UnsafeCell<()>;
        }
        #[allow(clippy::as_conversions)]
        // SAFETY: the exception vector is the naked function of the same name in `vector`
        VBAR_EL1.set(unsafe { _exception_vector.get() }.to_bits() as u64);
    }
    call_once_per_core!();

    // Force VBAR update to complete before next instruction.
    barrier::isb(barrier::SY);

    // Turn on alignment checks
    SCTLR_EL1.modify(SCTLR_EL1::A::Enable + SCTLR_EL1::NAA::Enable + SCTLR_EL1::SA::Enable);
    // Enable timer exceptions
    CNTP_CTL_EL0.modify(CNTP_CTL_EL0::IMASK::CLEAR);
}

/// Host stand-in for `DAIF`: there is no real mask register off-target, so the host unit test
/// binary simulates one bit of state (masked/unmasked) to keep `Guard` exercisable on the host.
#[cfg(not(target_arch = "aarch64"))]
mod host_daif {
    use core::sync::atomic::{AtomicU64, Ordering};

    /// Exceptions start masked, mirroring real hardware before the first `enable()`
    const MASKED: u64 = 1;

    static STATE: AtomicU64 = AtomicU64::new(MASKED);

    pub fn get() -> u64 {
        STATE.load(Ordering::Relaxed)
    }

    pub fn set(value: u64) {
        STATE.store(value, Ordering::Relaxed);
    }

    pub fn is_masked() -> bool {
        get() == MASKED
    }
}

/// Checks if exceptions are fully disabled
fn are_disabled() -> bool {
    #[cfg(target_arch = "aarch64")]
    {
        DAIF.matches_all(DAIF::D::Masked + DAIF::A::Masked + DAIF::I::Masked + DAIF::F::Masked)
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        host_daif::is_masked()
    }
}

/// Turns on exceptions
/// # Safety
/// This function should only be used to enable exceptions when it is certain that exceptions were disable but enabling them is OK
pub unsafe fn enable() {
    assert!(are_disabled(), "Interrupts must be disabled to enable them");
    #[cfg(target_arch = "aarch64")]
    DAIF.write(DAIF::D::Unmasked + DAIF::A::Unmasked + DAIF::I::Unmasked + DAIF::F::Unmasked);
    #[cfg(not(target_arch = "aarch64"))]
    host_daif::set(0);
}

/// Disables exceptions
/// # Safety
/// Exceptions must be re-enabled by the caller
pub unsafe fn disable() {
    assert!(
        !are_disabled(),
        "Interrupts must be enabled to disable them"
    );
    #[cfg(target_arch = "aarch64")]
    {
        DAIF.write(DAIF::D::Masked + DAIF::A::Masked + DAIF::I::Masked + DAIF::F::Masked);
        // Ensure that the changes are fully committed before continuing
        barrier::isb(barrier::SY);
    }
    #[cfg(not(target_arch = "aarch64"))]
    host_daif::set(1);
}

/// An exception `Guard` masks exceptions while alive,
/// and restores the prior mask state upon being dropped
pub struct Guard {
    /// The mask states
    daif: u64,
}

impl Guard {
    /// Creates a new exception guard, masking exceptions
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        #[cfg(target_arch = "aarch64")]
        let daif = DAIF.get();
        #[cfg(not(target_arch = "aarch64"))]
        let daif = host_daif::get();
        if !are_disabled() {
            // SAFETY: We have just checked that interrupts are enabled,
            // and we are intending to protect interupts for the duration
            // of this guard
            unsafe {
                disable();
            }
        }
        Self { daif }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        #[cfg(target_arch = "aarch64")]
        DAIF.set(self.daif);
        #[cfg(not(target_arch = "aarch64"))]
        host_daif::set(self.daif);
    }
}

add_test!(guard_preserves_interrupt_state, {
    assert!(
        DAIF.matches_all(
            DAIF::D::Unmasked + DAIF::A::Unmasked + DAIF::I::Unmasked + DAIF::F::Unmasked
        ),
        "Interrupts should be enabled when a thread runs, by default"
    );
    let guard = Guard::new();
    assert!(
        DAIF.matches_all(DAIF::D::Masked + DAIF::A::Masked + DAIF::I::Masked + DAIF::F::Masked),
        "Interrupts should be disabled while a guard is active"
    );
    drop(guard);
    assert!(
        DAIF.matches_all(
            DAIF::D::Unmasked + DAIF::A::Unmasked + DAIF::I::Unmasked + DAIF::F::Unmasked
        ),
        "Dropping all guards should re-enable interrupts"
    );
    let guard1 = Guard::new();
    assert!(
        DAIF.matches_all(DAIF::D::Masked + DAIF::A::Masked + DAIF::I::Masked + DAIF::F::Masked),
        "Interrupts should be disabled while a guard is active"
    );
    let guard2 = Guard::new();
    assert!(
        DAIF.matches_all(DAIF::D::Masked + DAIF::A::Masked + DAIF::I::Masked + DAIF::F::Masked),
        "Interrupts should be disabled while a guard is active"
    );
    drop(guard2);
    assert!(
        DAIF.matches_all(DAIF::D::Masked + DAIF::A::Masked + DAIF::I::Masked + DAIF::F::Masked),
        "Interrupts should remain disabled while a guard is active, even if another guard is dropped"
    );
    drop(guard1);
    assert!(
        DAIF.matches_all(
            DAIF::D::Unmasked + DAIF::A::Unmasked + DAIF::I::Unmasked + DAIF::F::Unmasked
        ),
        "Dropping all guards should re-enable interrupts"
    );
});
