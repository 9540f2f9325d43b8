//! Identity-mapped translation tables: one level-0 table, one level-1 table, and two fully
//! populated level-2 tables of 2 MB block descriptors (RAM and device).

use crate::cell::InitCell;
use aarch64_cpu::{
    asm::barrier,
    registers::{MAIR_EL1, SCTLR_EL1, TCR_EL1, TTBR0_EL1, TTBR1_EL1},
};
use core::ptr::addr_of;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

/// Size of a level-2 block mapping
const BLOCK_SIZE: u64 = 0x20_0000;
/// Number of entries in a translation table at any level
const ENTRIES: usize = 512;

/// attr index 0: device-nGnRE; attr index 1: normal write-back cacheable
const MAIR_DEVICE_INDEX: u64 = 0;
const MAIR_NORMAL_INDEX: u64 = 1;

/// Block descriptor attributes for normal, inner-shareable, kernel read/write memory
const RAM_BLOCK_ATTRS: u64 = (1 << 10) // access flag
    | (0b11 << 8) // inner shareable
    | (MAIR_NORMAL_INDEX << 2)
    | 0b01; // block descriptor, valid

/// Block descriptor attributes for device, outer-shareable memory
const DEVICE_BLOCK_ATTRS: u64 = (1 << 54) // privileged execute-never
    | (1 << 10) // access flag
    | (0b10 << 8) // outer shareable
    | (MAIR_DEVICE_INDEX << 2)
    | 0b01;

/// Table descriptor attributes (points at the next level)
const TABLE_DESCRIPTOR_ATTRS: u64 = 0b11;

#[repr(C, align(4096))]
struct Table([u64; ENTRIES]);

const fn ram_table() -> Table {
    let mut entries = [0_u64; ENTRIES];
    let mut i = 0;
    while i < ENTRIES {
        entries[i] = (i as u64 * BLOCK_SIZE) | RAM_BLOCK_ATTRS;
        i += 1;
    }
    Table(entries)
}

const fn device_table() -> Table {
    let mut entries = [0_u64; ENTRIES];
    let mut i = 0;
    while i < ENTRIES {
        entries[i] = (0xC000_0000_u64 + i as u64 * BLOCK_SIZE) | DEVICE_BLOCK_ATTRS;
        i += 1;
    }
    Table(entries)
}

static L2_RAM: Table = ram_table();
static L2_DEVICE: Table = device_table();

static mut L1: Table = Table([0; ENTRIES]);
static mut L0: Table = Table([0; ENTRIES]);

/// The register values a secondary core must adopt to see the same mappings as the primary core
#[derive(Clone, Copy)]
pub struct SharedConfig {
    /// Value for `TTBR0_EL1`
    pub ttbr0: u64,
    /// Value for `TCR_EL1`
    pub tcr: u64,
    /// Value for `MAIR_EL1`
    pub mair: u64,
}

/// Published by the primary core once its tables are built, consumed by secondary cores
pub static SHARED_CONFIG: InitCell<SharedConfig> = InitCell::new();

/// Builds the identity-mapping translation tables and turns on the MMU and caches
///
/// Must run on the primary core, before any secondary core is released, with the MMU off.
pub fn init() {
    crate::call_once!();

    // SAFETY: L0/L1 are only mutated here, before the MMU or any other core is active
    unsafe {
        L1.0[0] = addr_of!(L2_RAM) as u64 | TABLE_DESCRIPTOR_ATTRS;
        L1.0[3] = addr_of!(L2_DEVICE) as u64 | TABLE_DESCRIPTOR_ATTRS;
        L0.0[0] = addr_of!(L1) as u64 | TABLE_DESCRIPTOR_ATTRS;
    }

    MAIR_EL1.write(
        MAIR_EL1::Attr1_Normal_Outer::WriteBack_NonTransient_ReadWriteAlloc
            + MAIR_EL1::Attr1_Normal_Inner::WriteBack_NonTransient_ReadWriteAlloc
            + MAIR_EL1::Attr0_Device::nonGathering_nonReordering_EarlyWriteAck,
    );

    TCR_EL1.write(
        TCR_EL1::TG0::KiB_4
            + TCR_EL1::SH0::Inner
            + TCR_EL1::ORGN0::WriteBack_ReadAlloc_WriteAlloc_Cacheable
            + TCR_EL1::IRGN0::WriteBack_ReadAlloc_WriteAlloc_Cacheable
            + TCR_EL1::T0SZ.val(64 - 48)
            + TCR_EL1::IPS::Bits_40
            + TCR_EL1::EPD1::DisableTTBR1Walks,
    );

    // SAFETY: L0 is fully built above
    let ttbr0 = addr_of!(L0) as u64;
    TTBR0_EL1.set(ttbr0);
    TTBR1_EL1.set(0);

    barrier::dsb(barrier::SY);
    barrier::isb(barrier::SY);

    SCTLR_EL1.modify(SCTLR_EL1::M::Enable + SCTLR_EL1::C::Cacheable + SCTLR_EL1::I::Cacheable);

    barrier::dsb(barrier::SY);
    barrier::isb(barrier::SY);

    // SAFETY: `init` runs exactly once on the primary core, before any reader exists
    unsafe {
        SHARED_CONFIG.set(SharedConfig {
            ttbr0,
            tcr: TCR_EL1.get(),
            mair: MAIR_EL1.get(),
        });
    }
}

/// Adopts the primary core's translation tables and enables the MMU on a secondary core
///
/// # Safety
/// Must run once per secondary core, after [`init`] has published [`SHARED_CONFIG`]
pub unsafe fn adopt_shared() {
    crate::call_once_per_core!();

    let config = *SHARED_CONFIG;

    MAIR_EL1.set(config.mair);
    TCR_EL1.set(config.tcr);
    TTBR0_EL1.set(config.ttbr0);
    TTBR1_EL1.set(0);

    barrier::dsb(barrier::SY);
    barrier::isb(barrier::SY);

    SCTLR_EL1.modify(SCTLR_EL1::M::Enable + SCTLR_EL1::C::Cacheable + SCTLR_EL1::I::Cacheable);

    barrier::dsb(barrier::SY);
    barrier::isb(barrier::SY);
}
