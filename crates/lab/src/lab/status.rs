//! `vlab status`: the topology joined with what libvirt and the work
//! directory currently say about each VM.

use std::net::Ipv4Addr;

use clap::Parser;
use color_eyre::{eyre::Context as _, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use tracing::warn;

use super::{Lab, OutputFormat};
use crate::topology::{Bridge, Role};
use crate::vm::LabVm;

/// Options for showing lab status
#[derive(Debug, Parser)]
pub struct StatusOpts {
    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

/// One row of the status report
#[derive(Debug, Serialize)]
pub struct VmStatus {
    /// Domain name
    pub name: String,
    /// Device role
    pub role: Role,
    /// Bridges the VM is attached to
    pub bridges: Vec<Bridge>,
    /// Interface addresses in guest order
    pub addresses: Vec<Ipv4Addr>,
    /// libvirt state; `None` if the domain is not defined
    pub state: Option<String>,
    /// Whether `<name>.qcow2` exists in the work directory
    pub disk: bool,
}

impl VmStatus {
    fn collect(lab: &Lab, vm: &LabVm<'_>) -> Self {
        let device = vm.device();
        let state = match vm.state() {
            Ok(s) => s.map(|s| s.to_string()),
            Err(e) => {
                warn!("VM '{}': {e:#}", vm.name());
                Some("unknown".to_string())
            }
        };
        Self {
            name: device.name.clone(),
            role: device.role,
            bridges: device.bridges().to_vec(),
            addresses: device.interfaces.iter().map(|i| i.ipv4).collect(),
            state,
            disk: lab.network().qcow2_path(device).exists(),
        }
    }

    fn row(&self) -> Vec<String> {
        let join = |items: Vec<String>| items.join(", ");
        vec![
            self.name.clone(),
            self.role.to_string(),
            join(self.bridges.iter().map(|b| b.to_string()).collect()),
            join(self.addresses.iter().map(|a| a.to_string()).collect()),
            self.state.clone().unwrap_or_else(|| "undefined".into()),
            if self.disk { "yes" } else { "no" }.into(),
        ]
    }
}

/// Render the report as a table
pub fn render_table(rows: &[VmStatus]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["NAME", "ROLE", "BRIDGES", "ADDRESSES", "STATE", "DISK"]);
    for row in rows {
        table.add_row(row.row());
    }
    table
}

/// Execute the status command
pub fn run(lab: &Lab, opts: StatusOpts) -> Result<()> {
    let rows: Vec<VmStatus> = lab
        .vms(None)?
        .iter()
        .map(|vm| VmStatus::collect(lab, vm))
        .collect();

    match opts.format {
        OutputFormat::Table => {
            println!("{}", render_table(&rows));
            println!("\nWork directory: {}", lab.workdir());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("Failed to serialize status as JSON")?
            );
        }
    }
    Ok(())
}
