use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use aarch64_cpu::asm::{sev, wfe, wfi};

use crate::{architecture, board, call_once, fs, kernel, log, memory, sched, shell};

/// Global initialization of the system
#[no_mangle]
pub extern "C" fn init() -> ! {
    /// Whether or not initialization is complete
    static MAIN_INIT_DONE: AtomicBool = AtomicBool::new(false);
    // SAFETY: This should only run once
    unsafe {
        if architecture::machine::core_id() == 0 {
            // This is the global initialization sequence; it should only run once
            call_once!();

            // Set up the physical page allocator and kernel heap
            memory::init();

            // Initialize architecture-specific items (exceptions, config, MMU)
            architecture::init();

            // Initialize board-specific items (UART, GIC)
            board::init();

            // Mount the in-memory filesystem
            fs::init();

            // Build the fixed task pool; task 0 runs the shell
            sched::init();

            log!("Kernel initialized, waking secondary cores");

            MAIN_INIT_DONE.store(true, Ordering::Release);
            sev();
        } else {
            while !MAIN_INIT_DONE.load(Ordering::Acquire) {
                wfe();
            }
        }

        per_core_init()
    }
}

/// Per-core initialization
/// # Safety
/// Must only be called once per core
unsafe fn per_core_init() -> ! {
    /// Cores that have completed their per-core setup
    static FINISHED_CORES: AtomicUsize = AtomicUsize::new(0);

    // Make sure this is running in EL1
    assert_eq!(
        architecture::exception::el(),
        kernel::exception::PrivilegeLevel::Kernel,
        "The kernel must be running with kernel privileges"
    );

    architecture::per_core_init();
    board::per_core_init();

    let finished = FINISHED_CORES.fetch_add(1, Ordering::Relaxed);
    if architecture::machine::core_id() == 0 {
        // SAFETY: The primary core pokes the spin-table exactly once, after its own setup
        unsafe {
            board::wake_all_cores();
        }
    }

    log!("Enabling interrupts");
    // SAFETY: This is the first time we are enabling exceptions on this core
    unsafe {
        architecture::exception::enable();
    }

    if finished == 0 && architecture::machine::core_id() == 0 {
        shell::run();
    }

    loop {
        wfi();
    }
}
