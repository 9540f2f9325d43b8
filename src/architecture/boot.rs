// The boot sequence
//
// Both entry points are naked functions rather than a separate assembled `.s` file: the firmware
// starts every core at `_start`, which parks everything but the primary core until the spin-table
// wakeup pokes `_per_core_init`'s address into the secondary cores' wakeup slots (see
// `board::wake_all_cores`).

#[cfg(target_arch = "aarch64")]
mod asm {
    use core::arch::naked_asm;

    /// Size of each core's boot-time stack, used only until `kernel::init` takes over with the
    /// scheduler's own per-task stacks
    const BOOT_STACK_SIZE: usize = 0x4000;

    #[repr(C, align(16))]
    struct BootStack([u8; BOOT_STACK_SIZE]);

    /// The primary core's boot stack
    static mut PRIMARY_BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);
    /// Boot stacks for the three secondary cores
    static mut SECONDARY_BOOT_STACKS: [BootStack; 3] =
        [const { BootStack([0; BOOT_STACK_SIZE]) }; 3];

    extern "Rust" {
        static mut __bss_start: u8;
        static __bss_end: u8;
    }

    /// Entry point for every core, per the linker script's `ENTRY(_start)`
    ///
    /// Only the primary core (id 0) proceeds; the rest spin, woken later by the spin-table
    /// mechanism in `board::wake_all_cores`.
    #[unsafe(naked)]
    #[no_mangle]
    #[link_section = ".text._start"]
    unsafe extern "C" fn _start() -> ! {
        naked_asm!(
            "msr DAIFSET, #0b1111",
            "mrs x0, MPIDR_EL1",
            "and x0, x0, #0b11",
            "cbz x0, 1f",
            "0:",
            "wfe",
            "b 0b",
            "1:",
            // Zero BSS
            "adrp x0, {bss_start}",
            "add x0, x0, :lo12:{bss_start}",
            "adrp x1, {bss_end}",
            "add x1, x1, :lo12:{bss_end}",
            "2:",
            "cmp x0, x1",
            "b.ge 3f",
            "str xzr, [x0], #8",
            "b 2b",
            "3:",
            // Set up this core's boot stack
            "adrp x0, {stack}",
            "add x0, x0, :lo12:{stack}",
            "add sp, x0, #{stack_size}",
            "b {el2_init}",
            bss_start = sym __bss_start,
            bss_end = sym __bss_end,
            stack = sym PRIMARY_BOOT_STACK,
            stack_size = const BOOT_STACK_SIZE,
            el2_init = sym super::el2_init,
        )
    }

    /// Entry point for a secondary core, woken by a write to its spin-table slot
    ///
    /// BSS is already zeroed by the primary core; this just sets up a stack (one slice per core,
    /// indexed by `MPIDR_EL1`'s affinity-0 field) and proceeds to the same EL2-to-EL1 transition.
    #[unsafe(naked)]
    #[no_mangle]
    #[link_section = ".text._start_per_core"]
    unsafe extern "C" fn _per_core_init() -> ! {
        naked_asm!(
            "msr DAIFSET, #0b1111",
            "mrs x0, MPIDR_EL1",
            "and x0, x0, #0b11",
            "sub x0, x0, #1",
            "mov x1, #{stack_size}",
            "madd x0, x0, x1, x1",
            "adrp x2, {stacks}",
            "add x2, x2, :lo12:{stacks}",
            "add sp, x2, x0",
            "b {el2_init}",
            stacks = sym SECONDARY_BOOT_STACKS,
            stack_size = const BOOT_STACK_SIZE,
            el2_init = sym super::el2_init,
        )
    }
}

/// Switches the core from EL2 to EL1\
/// Switches to the given stack pointer\
/// Jumps to the main init sequence\
#[no_mangle]
fn el2_init() {
    use crate::{architecture, call_once_per_core, kernel::exception::PrivilegeLevel};
    use aarch64_cpu::{
        asm::eret,
        registers::{CNTHCTL_EL2, CNTVOFF_EL2, ELR_EL2, HCR_EL2, SP, SPSR_EL2, SP_EL1},
    };
    use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

    call_once_per_core!();
    // Make sure this is running in EL2
    assert_eq!(
        architecture::exception::el(),
        PrivilegeLevel::Hypervisor,
        "The boot sequence must be running in EL2"
    );
    // Enable 64 bit mode for EL1
    // Prevent exceptions from going to EL2
    HCR_EL2.modify(
        HCR_EL2::RW::EL1IsAarch64
            + HCR_EL2::TGE::DisableTrapGeneralExceptionsToEl2
            + HCR_EL2::E2H::DisableOsAtEl2,
    );

    // Disable interrupts in EL1 mode, and switch the stack pointer on a per-exception level basis

    // why do i need to manually do dis :()
    CNTHCTL_EL2.write(CNTHCTL_EL2::EL1PCEN::SET + CNTHCTL_EL2::EL1PCTEN::SET);
    CNTVOFF_EL2.set(0);
    SPSR_EL2.modify(
        SPSR_EL2::D::Masked
            + SPSR_EL2::A::Masked
            + SPSR_EL2::I::Masked
            + SPSR_EL2::F::Masked
            + SPSR_EL2::M::EL1h,
    );
    // Begin execution with the main init sequence
    ELR_EL2.set(crate::kernel::init as *const () as u64);
    // Set the stack pointer when execution resumes
    SP_EL1.set(SP.get());
    eret();
}
