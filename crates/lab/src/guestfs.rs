//! Offline access to guest filesystems through the libguestfs tools
//! (`virt-copy-in`, `virt-edit`, `virt-cat`). The domain must be defined and
//! should not be running.

use crate::cmdext::CommandRunExt;
use crate::hostexec::HostExec;
use camino::Utf8Path;
use color_eyre::{eyre::Context as _, Result};
use std::process::Command;
use tracing::debug;

/// Guest filesystem of one libvirt domain
#[derive(Debug, Clone)]
pub struct GuestFs<'a> {
    host: &'a HostExec,
    domain: &'a str,
}

impl<'a> GuestFs<'a> {
    /// Access the disks of `domain`
    pub fn new(host: &'a HostExec, domain: &'a str) -> Self {
        Self { host, domain }
    }

    fn command(&self, tool: &str) -> Command {
        let mut cmd = self.host.command(tool);
        cmd.args(["-d", self.domain]);
        cmd
    }

    /// `virt-edit -d <domain> <path> -e <expr>`
    pub fn edit_command(&self, path: &str, expr: &str) -> Command {
        let mut cmd = self.command("virt-edit");
        cmd.args([path, "-e", expr]);
        cmd
    }

    /// `virt-copy-in -d <domain> <local> <dir>`
    pub fn copy_in_command(&self, local: &Utf8Path, target_dir: &str) -> Command {
        let mut cmd = self.command("virt-copy-in");
        cmd.args([local.as_str(), target_dir]);
        cmd
    }

    /// Apply a Perl substitution to a file inside the guest
    pub fn edit(&self, path: &str, expr: &str) -> Result<()> {
        self.edit_command(path, expr)
            .run_get_string()
            .with_context(|| format!("Error while editing {path} in '{}'", self.domain))?;
        debug!("VM '{}':{path} edited", self.domain);
        Ok(())
    }

    /// Read a file from the guest
    pub fn cat(&self, path: &str) -> Result<String> {
        let mut cmd = self.command("virt-cat");
        cmd.arg(path);
        cmd.run_get_string()
            .with_context(|| format!("Error while reading {path} from '{}'", self.domain))
    }

    /// Write `content` to `<target_dir>/<file_name>` inside the guest.
    ///
    /// virt-copy-in keeps the local file name, so the content is staged
    /// under that exact name in a temporary directory.
    pub fn copy_in(&self, content: &str, file_name: &str, target_dir: &str) -> Result<()> {
        let tempdir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let local = Utf8Path::from_path(tempdir.path())
            .ok_or_else(|| color_eyre::eyre::eyre!("Temporary path is not UTF-8"))?
            .join(file_name);
        std::fs::write(&local, content).with_context(|| format!("Failed to write {local}"))?;

        self.copy_in_command(&local, target_dir)
            .run_get_string()
            .with_context(|| format!("Error while copying the file '{file_name}'"))?;
        debug!("File '{file_name}' copied to {}:{target_dir}", self.domain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_edit_command() {
        let host = HostExec::new(true);
        let fs = GuestFs::new(&host, "lb");
        assert_eq!(
            args(&fs.edit_command("/etc/hosts", "s/127.0.1.1.*/127.0.1.1 lb/")),
            [
                "sudo",
                "virt-edit",
                "-d",
                "lb",
                "/etc/hosts",
                "-e",
                "s/127.0.1.1.*/127.0.1.1 lb/"
            ]
        );
    }

    #[test]
    fn test_copy_in_command() {
        let host = HostExec::new(false);
        let fs = GuestFs::new(&host, "s1");
        assert_eq!(
            args(&fs.copy_in_command(Utf8Path::new("/tmp/x/index.html"), "/var/www/html/")),
            ["virt-copy-in", "-d", "s1", "/tmp/x/index.html", "/var/www/html/"]
        );
    }
}
