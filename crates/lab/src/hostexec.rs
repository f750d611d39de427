//! Build commands for host tools that may need elevated privileges.

use std::ffi::OsString;
use std::process::Command;

/// How privileged host tools are invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostExec {
    /// Prefix privileged commands with `sudo`
    pub sudo: bool,
    /// `PATH` used to look up host tools; the caller's when unset
    pub path: Option<OsString>,
}

impl HostExec {
    /// Tools from the caller's `PATH`, optionally through `sudo`
    pub fn new(sudo: bool) -> Self {
        Self { sudo, path: None }
    }

    /// Create a command for `program`, wrapped in `sudo` when configured.
    pub fn command(&self, program: &str) -> Command {
        let mut cmd = if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        };
        if let Some(path) = &self.path {
            cmd.env("PATH", path);
        }
        cmd
    }

    /// The argv prefix used for `program`, for places that need a shell string.
    pub fn argv(&self, program: &str) -> Vec<String> {
        let mut v = Vec::with_capacity(2);
        if self.sudo {
            v.push("sudo".to_string());
        }
        v.push(program.to_string());
        v
    }
}
