//! `vlab destroy`: remove every VM, the generated files and the bridges.

use clap::Parser;
use color_eyre::Result;
use tracing::info;

use super::Lab;

/// Options for destroying the lab
#[derive(Debug, Parser)]
pub struct DestroyOpts {
    /// Keep generated disks, descriptors and bridges; only remove the VMs
    #[clap(long)]
    pub keep_files: bool,
}

/// Execute the destroy command
pub fn run(lab: &Lab, opts: DestroyOpts) -> Result<()> {
    let mut failures = lab.for_each_vm(None, |vm, failures| {
        let name = vm.name();
        failures.record(format_args!("VM '{name}': destroy"), vm.destroy());
        failures.record(format_args!("VM '{name}': undefine"), vm.undefine());
        failures.record(format_args!("VM '{name}': close console"), vm.close_console());
    })?;

    if !opts.keep_files {
        failures.extend(lab.network().clean_environment());
    }

    failures.into_result("destroy")?;
    info!("Lab destroyed");
    Ok(())
}
