//! Test registry shared by the integration test binary.
//!
//! Tests register themselves with [`integration_test!`] and are collected
//! into a libtest-mimic run by `main.rs`.

// Unfortunately needed here to work with linkme
#![allow(unsafe_code)]

use linkme::distributed_slice;

/// A test function that returns a Result
pub type TestFn = fn() -> color_eyre::Result<()>;

/// Metadata for a registered integration test
#[derive(Debug)]
pub struct IntegrationTest {
    /// Name of the integration test
    pub name: &'static str,
    /// Test function to execute
    pub f: TestFn,
    /// Needs libvirt, Open vSwitch and base images on the host
    pub host: bool,
}

impl IntegrationTest {
    /// A test that only runs the binary against temporary files
    pub const fn new(name: &'static str, f: TestFn) -> Self {
        Self {
            name,
            f,
            host: false,
        }
    }

    /// A test that provisions a real lab on the host
    pub const fn host(name: &'static str, f: TestFn) -> Self {
        Self {
            name,
            f,
            host: true,
        }
    }
}

/// Distributed slice holding all registered integration tests
#[distributed_slice]
pub static INTEGRATION_TESTS: [IntegrationTest];

/// Register an integration test with less boilerplate.
///
/// ```ignore
/// fn test_help() -> Result<()> {
///     let output = run_vlab(&["--help"])?;
///     output.assert_success("help");
///     Ok(())
/// }
/// integration_test!(test_help);
/// ```
///
/// `integration_test!(host test_lifecycle)` registers a test that is ignored
/// unless the host is set up for it.
#[macro_export]
macro_rules! integration_test {
    ($fn_name:ident) => {
        ::paste::paste! {
            #[distributed_slice($crate::INTEGRATION_TESTS)]
            static [<$fn_name:upper>]: $crate::IntegrationTest =
                $crate::IntegrationTest::new(stringify!($fn_name), $fn_name);
        }
    };
    (host $fn_name:ident) => {
        ::paste::paste! {
            #[distributed_slice($crate::INTEGRATION_TESTS)]
            static [<$fn_name:upper>]: $crate::IntegrationTest =
                $crate::IntegrationTest::host(stringify!($fn_name), $fn_name);
        }
    };
}
