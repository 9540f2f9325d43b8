//! A Raspberry Pi Operating System
#![no_main]
#![no_std]

// Pulls in the library crate purely for its linkage: `_start`/`_per_core_init` (naked, `#[no_mangle]`),
// the panic handler, and everything `kernel::init` drives from there.
extern crate stdos as _;
