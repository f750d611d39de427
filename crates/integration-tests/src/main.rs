//! Integration tests for vlab

use std::process::Output;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use libtest_mimic::{Arguments, Trial};

pub(crate) use integration_tests::INTEGRATION_TESTS;

mod tests {
    pub mod lab_cli;
    pub mod lab_lifecycle;
}

/// Get the path to the vlab binary, checking VLAB_PATH env var first, then falling back to "vlab"
pub(crate) fn get_vlab_command() -> Result<String> {
    if let Ok(path) = std::env::var("VLAB_PATH") {
        return Ok(path);
    }
    // Force the user to set this if we're running from the project dir
    if let Some(path) = ["target/debug/vlab", "target/release/vlab"]
        .into_iter()
        .find(|p| Utf8Path::new(p).exists())
    {
        return Err(eyre!(
            "Detected {path} - set VLAB_PATH={path} to run using this binary"
        ));
    }
    Ok("vlab".to_owned())
}

/// Config file of a lab the host tests may create and destroy.
///
/// Host tests are ignored unless VLAB_TEST_CONFIG is set.
pub(crate) fn get_host_test_config() -> Option<Utf8PathBuf> {
    std::env::var("VLAB_TEST_CONFIG").ok().map(Utf8PathBuf::from)
}

/// Captured output from a command with decoded stdout/stderr strings
pub(crate) struct CapturedOutput {
    pub output: Output,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Create from a raw Output
    pub fn new(output: Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Self {
            output,
            stdout,
            stderr,
        }
    }

    /// Assert that the command succeeded, printing debug info on failure
    pub fn assert_success(&self, context: &str) {
        assert!(
            self.output.status.success(),
            "{} failed: {}",
            context,
            self.stderr
        );
    }

    /// Assert that the command failed and mentioned `needle` on stderr
    pub fn assert_failure_with(&self, context: &str, needle: &str) {
        assert!(
            !self.output.status.success(),
            "{} unexpectedly succeeded: {}",
            context,
            self.stdout
        );
        assert!(
            self.stderr.contains(needle),
            "{} should mention {:?}: {}",
            context,
            needle,
            self.stderr
        );
    }
}

/// Run the vlab command, capturing output
pub(crate) fn run_vlab(args: &[&str]) -> Result<CapturedOutput> {
    let vlab = get_vlab_command()?;
    let output = std::process::Command::new(&vlab)
        .args(args)
        // Keep log output predictable regardless of the caller's environment
        .env_remove("RUST_LOG")
        .output()?;
    Ok(CapturedOutput::new(output))
}

fn main() {
    let args = Arguments::from_args();
    let host_ready = get_host_test_config().is_some();

    // Collect tests from the distributed slice
    let tests: Vec<Trial> = INTEGRATION_TESTS
        .iter()
        .map(|test| {
            let f = test.f;
            Trial::test(test.name, move || f().map_err(|e| format!("{:?}", e).into()))
                .with_ignored_flag(test.host && !host_ready)
        })
        .collect();

    // Run the tests and exit with the result
    libtest_mimic::run(&args, tests).exit();
}
