//! `vlab stop [VM]`: shut down one VM or all of them.

use clap::Parser;
use color_eyre::Result;

use super::Lab;

/// Options for stopping VMs
#[derive(Debug, Parser)]
pub struct StopOpts {
    /// VM to stop (lb, c1, s1...); all VMs if omitted
    pub vm: Option<String>,

    /// Power off immediately instead of asking the guest to shut down
    #[clap(long, short = 'f')]
    pub force: bool,
}

/// Execute the stop command
pub fn run(lab: &Lab, opts: StopOpts) -> Result<()> {
    let failures = lab.for_each_vm(opts.vm.as_deref(), |vm, failures| {
        let name = vm.name();
        failures.record(format_args!("VM '{name}': stop"), vm.stop(opts.force));
        failures.record(format_args!("VM '{name}': close console"), vm.close_console());
    })?;
    failures.into_result("stop")
}
