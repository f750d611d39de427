//! `vlab create`: build the environment, then define and configure each VM.

use clap::Parser;
use color_eyre::Result;
use tracing::info;

use super::Lab;

/// Options for creating the lab
#[derive(Debug, Parser)]
pub struct CreateOpts {
    /// Stop after creating files and bridges; do not define or configure VMs
    #[clap(long)]
    pub no_define: bool,
}

/// Execute the create command
pub fn run(lab: &Lab, opts: CreateOpts) -> Result<()> {
    let mut failures = lab.network().create_environment();

    if !opts.no_define {
        let topology = lab.topology();
        failures.extend(lab.for_each_vm(None, |vm, failures| {
            let defined = failures.record(format_args!("VM '{}': define", vm.name()), vm.define());
            // Guest tools resolve the disk through the domain definition
            if defined.is_some() {
                vm.configure(topology, failures);
            }
        })?);
    }

    failures.into_result("create")?;
    info!("Lab created in {}", lab.workdir());
    Ok(())
}
