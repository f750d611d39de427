//! Lab lifecycle subcommands
//!
//! - `create`: disks, descriptors, bridges, then define and configure every VM
//! - `start`/`stop`: boot or shut down one VM or all of them
//! - `destroy`: power off and undefine every VM, then remove files and bridges
//! - `status`: show the topology and each VM's libvirt state
//! - `console`: open a console window for one VM

use crate::config::LabConfig;
use crate::failures::StepFailures;
use crate::hostexec::HostExec;
use crate::network::LabNetwork;
use crate::ovs::Ovs;
use crate::topology::Topology;
use crate::virsh::Virsh;
use crate::vm::LabVm;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Subcommand, ValueEnum};
use color_eyre::Result;

pub mod console;
pub mod create;
pub mod destroy;
pub mod start;
pub mod status;
pub mod stop;

/// Output format for commands that print data
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable table
    Table,
    /// JSON
    Json,
}

/// Everything a subcommand needs to act on the lab
#[derive(Debug)]
pub struct Lab {
    config: LabConfig,
    workdir: Utf8PathBuf,
    topology: Topology,
    host: HostExec,
    virsh: Virsh,
}

impl Lab {
    /// Build the lab from a validated configuration. `connect` overrides
    /// the configured libvirt URI.
    pub fn new(config: LabConfig, connect: Option<String>) -> Result<Self> {
        let workdir = config.resolve_workdir()?;
        let topology = Topology::generate(config.number_of_servers);
        let host = HostExec::new(config.sudo);
        let virsh = Virsh::new(host.clone(), connect.or_else(|| config.connect.clone()));
        Ok(Self {
            config,
            workdir,
            topology,
            host,
            virsh,
        })
    }

    /// Devices of this lab
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Where base and generated files live
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Files and bridges
    pub fn network(&self) -> LabNetwork<'_> {
        LabNetwork::new(
            &self.workdir,
            Utf8Path::new(&self.config.qcow_base),
            Utf8Path::new(&self.config.xml_base),
            &self.topology,
            Ovs::new(self.host.clone()),
        )
    }

    /// Every VM, or only `name`. An unknown name is an error.
    pub fn vms(&self, name: Option<&str>) -> Result<Vec<LabVm<'_>>> {
        let devices = self.topology.select(name)?;
        Ok(devices
            .into_iter()
            .map(|d| LabVm::new(d, &self.virsh, &self.host, &self.workdir))
            .collect())
    }

    /// Run `step` on each VM, carrying on past failures
    pub fn for_each_vm<F>(&self, name: Option<&str>, step: F) -> Result<StepFailures>
    where
        F: Fn(&LabVm<'_>, &mut StepFailures),
    {
        let mut failures = StepFailures::new();
        for vm in self.vms(name)? {
            step(&vm, &mut failures);
        }
        Ok(failures)
    }
}

/// Lab subcommands
#[derive(Debug, Subcommand)]
pub enum LabCommands {
    /// Create the lab: disks, descriptors, bridges and configured VMs
    Create(create::CreateOpts),

    /// Start one VM or all of them, each with a console window
    Start(start::StartOpts),

    /// Shut down one VM or all of them
    Stop(stop::StopOpts),

    /// Tear the whole lab down
    Destroy(destroy::DestroyOpts),

    /// Show devices, addresses and VM state
    Status(status::StatusOpts),

    /// Open a console window for a VM
    Console(console::ConsoleOpts),
}

impl LabCommands {
    /// Run the subcommand
    pub fn run(self, lab: &Lab) -> Result<()> {
        match self {
            LabCommands::Create(opts) => create::run(lab, opts),
            LabCommands::Start(opts) => start::run(lab, opts),
            LabCommands::Stop(opts) => stop::run(lab, opts),
            LabCommands::Destroy(opts) => destroy::run(lab, opts),
            LabCommands::Status(opts) => status::run(lab, opts),
            LabCommands::Console(opts) => console::run(lab, opts),
        }
    }
}
