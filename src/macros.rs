/// Safety macros for code that should only run once, or once per core
pub mod once;
/// Macro to derive a consistent implementation of Ord
pub mod ord;

/// Marks a block as an on-target test
///
/// These touch real system registers and only make sense when actually running on an aarch64
/// core, so unlike the host-runnable `#[cfg(test)]` modules elsewhere, this expands to nothing
/// when compiled for the host unit test binary.
#[macro_export]
macro_rules! add_test {
    ($name:ident, $body:block) => {
        #[cfg(all(test, target_arch = "aarch64"))]
        #[test]
        #[allow(non_snake_case)]
        fn $name() {
            $body
        }
    };
}
