//! `vlab console VM`: open a console window for a running VM.

use clap::Parser;
use color_eyre::Result;

use super::Lab;

/// Options for opening a console
#[derive(Debug, Parser)]
pub struct ConsoleOpts {
    /// VM whose console to open
    pub vm: String,

    /// Close existing console windows of the VM first
    #[clap(long)]
    pub replace: bool,
}

/// Execute the console command
pub fn run(lab: &Lab, opts: ConsoleOpts) -> Result<()> {
    for vm in lab.vms(Some(&opts.vm))? {
        if !vm.is_running()? {
            color_eyre::eyre::bail!("VM '{}' is not running", vm.name());
        }
        if opts.replace {
            vm.close_console()?;
        }
        vm.show_console()?;
    }
    Ok(())
}
