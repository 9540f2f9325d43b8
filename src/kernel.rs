/// Generic kernel exception handling
pub mod exception;
/// Main initialization sequences
mod init;
/// Panic handling
mod panic;
/// Per-core items
mod per_core;
/// Printing to serial output
pub mod print;
/// The serial interface
pub mod serial;
/// Timekeeping support
pub mod time;

pub use init::init;
pub use per_core::PerCore;
pub use serial::Serial;
