//! Lab-wide commands keep going when one device fails; this collects what
//! went wrong so the command can still exit non-zero.

use color_eyre::{eyre::eyre, Result};
use std::fmt::Display;

/// Failed steps of a best-effort run
#[derive(Debug, Default)]
pub struct StepFailures {
    failures: Vec<String>,
}

impl StepFailures {
    /// Nothing failed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and remember a failed step; pass a successful value through.
    pub fn record<T>(&mut self, step: impl Display, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!("{step}: {e:#}");
                self.failures.push(format!("{step}: {e:#}"));
                None
            }
        }
    }

    /// Take over the failures of a nested run
    pub fn extend(&mut self, other: StepFailures) {
        self.failures.extend(other.failures);
    }

    /// Number of failed steps
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True if every step succeeded
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok` if nothing failed, else an error listing every failed step
    pub fn into_result(self, operation: &str) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(eyre!(
            "{operation}: {} step(s) failed:\n  {}",
            self.failures.len(),
            self.failures.join("\n  ")
        ))
    }
}
