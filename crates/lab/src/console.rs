//! Serial console windows: one `xterm` per domain running `virsh console`.

use crate::cmdext::CommandRunExt;
use crate::virsh::Virsh;
use color_eyre::{eyre::Context as _, Result};
use rustix::process::{kill_process, Pid, Signal};
use std::process::{Command, Stdio};
use tracing::debug;

/// `xterm -hold -e <virsh console argv>`
pub fn open_command(virsh: &Virsh, name: &str) -> Command {
    let mut cmd = Command::new("xterm");
    cmd.args(["-hold", "-e"]).args(virsh.console_argv(name));
    cmd
}

/// Open a console window for `name` without waiting for it
pub fn open(virsh: &Virsh, name: &str) -> Result<()> {
    open_command(virsh, name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Error while opening console for '{name}'"))?;
    debug!("VM '{name}' console opened in a new window");
    Ok(())
}

/// Whether a process command line is an xterm attached to `name`'s console.
///
/// Matches whole words so `s1` does not match `s10`.
pub fn is_console_of(cmdline: &str, name: &str) -> bool {
    let words: Vec<&str> = cmdline.split_whitespace().collect();
    let Some(program) = words.first() else {
        return false;
    };
    let is_xterm = program.rsplit('/').next() == Some("xterm");
    is_xterm
        && words.contains(&"virsh")
        && words.windows(2).any(|w| w[0] == "console" && w[1] == name)
}

/// Parse `ps -o pid=,args=` output into `(pid, command line)` pairs
pub fn parse_process_table(ps: &str) -> Vec<(i32, &str)> {
    ps.lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, args) = line.split_once(char::is_whitespace)?;
            Some((pid.parse().ok()?, args.trim()))
        })
        .collect()
}

/// Kill every console window attached to `name`; returns how many were closed
pub fn close(name: &str) -> Result<usize> {
    let ps = Command::new("ps")
        .args(["-e", "-ww", "-o", "pid=,args="])
        .run_get_string()
        .context("Failed to list processes")?;

    let mut closed = 0;
    for (pid, args) in parse_process_table(&ps) {
        if !is_console_of(args, name) {
            continue;
        }
        let Some(raw) = Pid::from_raw(pid) else {
            continue;
        };
        kill_process(raw, Signal::KILL)
            .with_context(|| format!("Error closing xterm window {pid} for VM '{name}'"))?;
        debug!("Closed xterm window for VM console '{name}' (pid {pid})");
        closed += 1;
    }
    Ok(closed)
}
