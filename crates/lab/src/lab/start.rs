//! `vlab start [VM]`: boot one VM or all of them.

use clap::Parser;
use color_eyre::Result;

use super::Lab;

/// Options for starting VMs
#[derive(Debug, Parser)]
pub struct StartOpts {
    /// VM to start (lb, c1, s1...); all VMs if omitted
    pub vm: Option<String>,

    /// Do not open console windows
    #[clap(long)]
    pub no_console: bool,
}

/// Execute the start command
pub fn run(lab: &Lab, opts: StartOpts) -> Result<()> {
    let failures = lab.for_each_vm(opts.vm.as_deref(), |vm, failures| {
        let name = vm.name();
        // A window left from a previous boot would show a dead console
        failures.record(format_args!("VM '{name}': close console"), vm.close_console());
        if failures
            .record(format_args!("VM '{name}': start"), vm.start())
            .is_none()
        {
            return;
        }
        if !opts.no_console {
            failures.record(format_args!("VM '{name}': console"), vm.show_console());
        }
    })?;
    failures.into_result("start")
}
