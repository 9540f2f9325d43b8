//! GICv2 distributor + CPU interface, plus the per-core local timer-routing registers
//!
//! Documentation: ARM `IHI0048B` (GICv2 architecture specification) for the distributor/CPU
//! interface blocks, and the BCM2711 peripherals datasheet for the local timer-routing registers.

use crate::{architecture::machine::core_id, board::Mmio, log, sched};
use aarch64_cpu::registers::CNTP_CTL_EL0;
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

/// Base address of the GIC distributor block (`GIC_BASE + 0x1000`)
#[allow(clippy::as_conversions)]
const DISTRIBUTOR_BASE: usize = 0xFF84_0000 + 0x1000;
/// Base address of the GIC CPU interface block (`GIC_BASE + 0x2000`)
const CPU_INTERFACE_BASE: usize = 0xFF84_0000 + 0x2000;
/// Base address of the per-core local timer-routing registers
#[allow(clippy::as_conversions)]
const LOCAL_TIMER_ROUTING_BASE: usize = 0xFF80_0040;
/// Base address of the per-core local interrupt-source registers
const LOCAL_INTERRUPT_SOURCE_BASE: usize = 0xFF80_0060;
/// Interrupt id of the architected (non-secure) physical timer, a per-processor interrupt
pub const TIMER_PPI: u32 = 30;

register_bitfields! {u32,
    /// Distributor control register
    ICDDCR [
        ENABLE OFFSET(0) NUMBITS(1) [],
    ],
    /// CPU interface control register
    ICCICR [
        ENABLE OFFSET(0) NUMBITS(1) [],
    ],
    /// CPU interface priority mask register
    ICCPMR [
        PRIORITY OFFSET(0) NUMBITS(8) [],
    ],
    /// CPU interface interrupt acknowledge / end-of-interrupt registers
    ICCIAR [
        INTERRUPT_ID OFFSET(0) NUMBITS(10) [],
    ],
    /// Local timer-routing register: which of FIQ/IRQ this core's timer sources raise
    LOCAL_TIMER_ROUTING [
        NCNTPNSIRQ OFFSET(1) NUMBITS(1) [],
    ],
    /// Local interrupt-source register: which sources are currently pending on this core
    LOCAL_INTERRUPT_SOURCE [
        CNTPNSIRQ OFFSET(1) NUMBITS(1) [],
    ],
}

register_structs! {
    #[allow(non_snake_case)]
    DistributorBlock {
        (0x000 => ICDDCR: ReadWrite<u32, ICDDCR::Register>),
        (0x004 => _reserved0),
        (0x100 => ICDISER: [ReadWrite<u32>; 32]),
        (0x180 => _reserved1),
        (0x400 => ICDIPR: [ReadWrite<u8>; 1024]),
        (0x800 => ICDIPTR: [ReadWrite<u8>; 1024]),
        (0xC00 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    CpuInterfaceBlock {
        (0x00 => ICCICR: ReadWrite<u32, ICCICR::Register>),
        (0x04 => ICCPMR: ReadWrite<u32, ICCPMR::Register>),
        (0x08 => _reserved),
        (0x0C => ICCIAR: ReadOnly<u32, ICCIAR::Register>),
        (0x10 => ICCEOIR: WriteOnly<u32, ICCIAR::Register>),
        (0x14 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    LocalTimerRoutingBlock {
        (0x00 => CORE0: ReadWrite<u32, LOCAL_TIMER_ROUTING::Register>),
        (0x04 => CORE1: ReadWrite<u32, LOCAL_TIMER_ROUTING::Register>),
        (0x08 => CORE2: ReadWrite<u32, LOCAL_TIMER_ROUTING::Register>),
        (0x0C => CORE3: ReadWrite<u32, LOCAL_TIMER_ROUTING::Register>),
        (0x10 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    LocalInterruptSourceBlock {
        (0x00 => CORE0: ReadOnly<u32, LOCAL_INTERRUPT_SOURCE::Register>),
        (0x04 => CORE1: ReadOnly<u32, LOCAL_INTERRUPT_SOURCE::Register>),
        (0x08 => CORE2: ReadOnly<u32, LOCAL_INTERRUPT_SOURCE::Register>),
        (0x0C => CORE3: ReadOnly<u32, LOCAL_INTERRUPT_SOURCE::Register>),
        (0x10 => @END),
    }
}

/// Wrapper carrying all of the MMIO blocks this module touches
struct Gic {
    /// The distributor block
    distributor: Mmio<DistributorBlock>,
    /// The per-core CPU interface block
    cpu_interface: Mmio<CpuInterfaceBlock>,
    /// The per-core local timer-routing registers
    timer_routing: Mmio<LocalTimerRoutingBlock>,
    /// The per-core local interrupt-source registers
    interrupt_source: Mmio<LocalInterruptSourceBlock>,
}

// SAFETY: every register this module touches is either per-core or mutated only during `init`
unsafe impl Send for Gic {}
// SAFETY: see above
unsafe impl Sync for Gic {}

#[allow(clippy::undocumented_unsafe_blocks, clippy::as_conversions)]
static GIC: Gic = Gic {
    // SAFETY: addresses are fixed by the platform and used only through this one instance
    distributor: unsafe { Mmio::new(DISTRIBUTOR_BASE as *mut DistributorBlock) },
    // SAFETY: see above
    cpu_interface: unsafe { Mmio::new(CPU_INTERFACE_BASE as *mut CpuInterfaceBlock) },
    // SAFETY: see above
    timer_routing: unsafe { Mmio::new(LOCAL_TIMER_ROUTING_BASE as *mut LocalTimerRoutingBlock) },
    // SAFETY: see above
    interrupt_source: unsafe {
        Mmio::new(LOCAL_INTERRUPT_SOURCE_BASE as *mut LocalInterruptSourceBlock)
    },
};

/// Initializes the distributor: disable, configure, then enable
pub fn init() {
    crate::call_once!();
    GIC.distributor.ICDDCR.write(ICDDCR::ENABLE::CLEAR);
    enable_interrupt(TIMER_PPI);
    GIC.distributor.ICDDCR.write(ICDDCR::ENABLE::SET);
}

/// Sets an interrupt's priority to a middle value, targets it at core 0, and enables it
pub fn enable_interrupt(id: u32) {
    let id = id as usize;
    GIC.distributor.ICDIPR[id].set(0x80);
    GIC.distributor.ICDIPTR[id].set(0b1);
    GIC.distributor.ICDISER[id / 32].set(1 << (id % 32));
}

/// Per-core initialization: lowest priority mask, enable the CPU interface, enable the local
/// timer-routing register for this core
pub fn per_core_init() {
    crate::call_once_per_core!();
    GIC.cpu_interface.ICCPMR.write(ICCPMR::PRIORITY.val(0xFF));
    GIC.cpu_interface.ICCICR.write(ICCICR::ENABLE::SET);

    let routing = &GIC.timer_routing;
    match core_id() {
        0 => routing.CORE0.write(LOCAL_TIMER_ROUTING::NCNTPNSIRQ::SET),
        1 => routing.CORE1.write(LOCAL_TIMER_ROUTING::NCNTPNSIRQ::SET),
        2 => routing.CORE2.write(LOCAL_TIMER_ROUTING::NCNTPNSIRQ::SET),
        3 => routing.CORE3.write(LOCAL_TIMER_ROUTING::NCNTPNSIRQ::SET),
        _ => unreachable!("the platform has 4 cores"),
    }
}

/// Whether the non-secure physical timer is pending on the current core
///
/// Under emulation the timer interrupt is only ever delivered to core 0, so this reads the
/// architected timer's own status bit directly rather than relying on the distributor to have
/// forwarded anything — the short-circuit the design notes call out.
fn timer_pending() -> bool {
    CNTP_CTL_EL0.matches_all(CNTP_CTL_EL0::ISTATUS::SET)
}

/// Dispatches the pending IRQ, re-arming the timer on every firing regardless of whether the
/// scheduler actually switches tasks
///
/// Returns the stack pointer of the task that should run next.
pub fn handle_irq(old_sp: usize) -> usize {
    let id = GIC.cpu_interface.ICCIAR.read(ICCIAR::INTERRUPT_ID);

    if timer_pending() || id == TIMER_PPI {
        crate::architecture::time::rearm();
        GIC.cpu_interface.ICCEOIR.write(ICCIAR::INTERRUPT_ID.val(id));
        return sched::schedule_irq(old_sp);
    }

    if GIC.interrupt_source.CORE0.matches_any(LOCAL_INTERRUPT_SOURCE::CNTPNSIRQ::SET) {
        crate::architecture::time::rearm();
        return sched::schedule_irq(old_sp);
    }

    log!("gic: IRQ from unregistered source {id}, ignoring");
    GIC.cpu_interface.ICCEOIR.write(ICCIAR::INTERRUPT_ID.val(id));
    old_sp
}

/// Services the local timer without consulting the scheduler, for a secondary core that is not
/// participating in preemption: acknowledges and re-arms, nothing else
///
/// Secondary cores poll this from their own idle loop rather than taking a real IRQ, matching the
/// platform's single-core interrupt routing under emulation.
pub fn poll_local_timer() {
    if timer_pending() {
        crate::architecture::time::rearm();
    }
}
