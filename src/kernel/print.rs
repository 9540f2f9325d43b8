/// Writes the given information out to the serial output
pub fn _print(args: core::fmt::Arguments) {
    use crate::{board, kernel::Serial};
    board::serial().write_fmt(args);
}
/// Discards the input arguments
pub fn _unused(_args: core::fmt::Arguments) {}

/// Print to serial output
// <https://doc.rust-lang.org/src/std/macros.rs.html>
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kernel::print::_print(format_args!($($arg)*)));
}

/// Print, with a newline, to serial output
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($fmt:expr) => ({
        $crate::kernel::print::_print(format_args!($fmt));
        $crate::print!("\n");
    });
    ($fmt:expr, $($arg:tt)*) => ({
        $crate::kernel::print::_print(format_args!($fmt, $($arg)*));
        $crate::print!("\n");
    });
}

/// Prints info prefixed with core ID and timestamp
#[macro_export]
#[cfg(feature = "verbose")]
macro_rules! log {
    ($string:expr) => ({
        use core::time::Duration;
        let timestamp: Duration = $crate::kernel::time::now();
        $crate::print!(
            "[core {}, {}.{:03}s] ",
            $crate::architecture::machine::core_id(),
            timestamp.as_secs(),
            timestamp.subsec_millis(),
        );
        $crate::kernel::print::_print(format_args!($string));
        $crate::print!("\n");
    });
    ($format_string:expr, $($arg:tt)*) => ({
        use core::time::Duration;
        let timestamp: Duration = $crate::kernel::time::now();
        $crate::print!(
            "[core {}, {}.{:03}s] ",
            $crate::architecture::machine::core_id(),
            timestamp.as_secs(),
            timestamp.subsec_millis(),
        );
        $crate::kernel::print::_print(format_args!($format_string, $($arg)*));
        $crate::print!("\n");
    })
}

/// A no-op logging mechanism
#[cfg(not(feature = "verbose"))]
#[macro_export]
macro_rules! log {
    ($string:expr) => ({
        $crate::kernel::print::_unused(format_args!($string));
    });
    ($format_string:expr, $($arg:tt)*) => ({
        $crate::kernel::print::_unused(format_args!(
            $format_string,
            $($arg)*
        ));
    })
}
