//! Thin wrapper over `virsh` for the domain lifecycle verbs the lab uses.

use crate::cmdext::CommandRunExt;
use crate::hostexec::HostExec;
use camino::Utf8Path;
use color_eyre::{eyre::eyre, eyre::Context, Result};
use std::process::Command;

/// Domain state as reported by `virsh domstate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainState {
    /// `running`
    Running,
    /// `shut off`
    ShutOff,
    /// `paused`
    Paused,
    /// Anything else libvirt reports
    Other(String),
}

impl DomainState {
    /// Parse state string from libvirt
    pub fn parse(state: &str) -> Self {
        match state.trim() {
            "running" => DomainState::Running,
            "shut off" => DomainState::ShutOff,
            "paused" => DomainState::Paused,
            other => DomainState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainState::Running => f.write_str("running"),
            DomainState::ShutOff => f.write_str("shut off"),
            DomainState::Paused => f.write_str("paused"),
            DomainState::Other(s) => f.write_str(s),
        }
    }
}

/// True if virsh's stderr says the domain is not defined at all
fn is_missing_domain(stderr: &str) -> bool {
    stderr.contains("failed to get domain") || stderr.contains("Domain not found")
}

/// virsh invocation settings
#[derive(Debug, Clone)]
pub struct Virsh {
    host: HostExec,
    connect: Option<String>,
}

impl Virsh {
    /// Create a wrapper
    pub fn new(host: HostExec, connect: Option<String>) -> Self {
        Self { host, connect }
    }

    /// A virsh command with sudo and connection URI applied
    pub fn command(&self) -> Command {
        let mut cmd = self.host.command("virsh");
        if let Some(ref uri) = self.connect {
            cmd.arg("-c").arg(uri);
        }
        cmd
    }

    /// argv of `virsh console <name>`, for running inside a terminal
    pub fn console_argv(&self, name: &str) -> Vec<String> {
        let mut argv = self.host.argv("virsh");
        if let Some(ref uri) = self.connect {
            argv.push("-c".into());
            argv.push(uri.clone());
        }
        argv.push("console".into());
        argv.push(name.into());
        argv
    }

    fn verb(&self, verb: &str, arg: &str) -> Result<()> {
        self.command()
            .args([verb, arg])
            .run_get_string()
            .with_context(|| format!("virsh {verb} {arg} failed"))?;
        Ok(())
    }

    /// `virsh define <xml>`
    pub fn define(&self, xml: &Utf8Path) -> Result<()> {
        self.verb("define", xml.as_str())
    }

    /// `virsh start <name>`
    pub fn start(&self, name: &str) -> Result<()> {
        self.verb("start", name)
    }

    /// `virsh shutdown <name>`: ask the guest to power off
    pub fn shutdown(&self, name: &str) -> Result<()> {
        self.verb("shutdown", name)
    }

    /// `virsh destroy <name>`: pull the plug
    pub fn destroy(&self, name: &str) -> Result<()> {
        self.verb("destroy", name)
    }

    /// `virsh undefine <name>`
    pub fn undefine(&self, name: &str) -> Result<()> {
        self.verb("undefine", name)
    }

    /// Current state, or `None` if the domain is not defined
    pub fn domain_state(&self, name: &str) -> Result<Option<DomainState>> {
        let output = self
            .command()
            .args(["domstate", name])
            .run_capture()
            .with_context(|| format!("Failed to get state for domain '{}'", name))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_domain(&stderr) {
                return Ok(None);
            }
            return Err(eyre!(
                "Failed to get domain state for '{}': {}",
                name,
                stderr.trim()
            ));
        }

        Ok(Some(DomainState::parse(&String::from_utf8(output.stdout)?)))
    }

    /// Whether the domain exists and is running
    pub fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self.domain_state(name)? == Some(DomainState::Running))
    }
}
