//! Helper functions for interacting with qemu-img

use crate::cmdext::CommandRunExt;
use camino::Utf8Path;
use color_eyre::{eyre::Context, Result};
use std::process::Command;

/// `qemu-img create` for a qcow2 overlay of `base` at `target`.
///
/// qemu-img records `base` verbatim and resolves a relative path against the
/// overlay's directory.
pub fn overlay_command(base: &Utf8Path, target: &Utf8Path) -> Command {
    let mut cmd = Command::new("qemu-img");
    cmd.args(["create", "-F", "qcow2", "-f", "qcow2", "-b"])
        .arg(base.as_str())
        .arg(target.as_str());
    cmd
}

/// Create a copy-on-write overlay of `base` at `target`, run from `dir`.
///
/// Runs as the invoking user so the image stays writable without root.
pub fn create_overlay(dir: &Utf8Path, base: &Utf8Path, target: &Utf8Path) -> Result<()> {
    overlay_command(base, target)
        .current_dir(dir)
        .run_get_string()
        .with_context(|| format!("Failed to create qcow2 overlay {target} of {base}"))?;
    Ok(())
}
