// Architecture-specific (ARM) code
mod boot;
mod config;
pub mod exception;
mod exception_handlers;
pub mod machine;
pub mod mmu;
mod shutdown;
pub mod time;

pub use config::CONFIG;
pub use shutdown::{halt, shutdown};

pub fn init() {
    crate::call_once!();
    exception::init();
    config::init();
    mmu::init();
}

pub fn per_core_init() {
    crate::call_once_per_core!();
    exception::per_core_init();
}
