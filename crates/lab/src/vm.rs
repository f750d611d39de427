//! One lab VM: define it from its descriptor, write its guest configuration,
//! and drive it through start/stop/destroy.

use crate::console;
use crate::failures::StepFailures;
use crate::guest_config::{self, LB_BOOT_COMMAND, SERVER_BOOT_COMMAND};
use crate::guestfs::GuestFs;
use crate::hostexec::HostExec;
use crate::topology::{Device, Role, Topology};
use crate::virsh::{DomainState, Virsh};
use camino::Utf8Path;
use color_eyre::Result;
use tracing::{debug, info, warn};

const HAPROXY_CONF: &str = "/etc/haproxy/haproxy.cfg";

/// A device of the lab bound to the host tools that manage it
#[derive(Debug)]
pub struct LabVm<'a> {
    device: &'a Device,
    virsh: &'a Virsh,
    host: &'a HostExec,
    workdir: &'a Utf8Path,
}

impl<'a> LabVm<'a> {
    /// Bind `device`; its descriptor lives at `<workdir>/<name>.xml`
    pub fn new(
        device: &'a Device,
        virsh: &'a Virsh,
        host: &'a HostExec,
        workdir: &'a Utf8Path,
    ) -> Self {
        Self {
            device,
            virsh,
            host,
            workdir,
        }
    }

    /// Domain name
    pub fn name(&self) -> &'a str {
        &self.device.name
    }

    /// The topology entry
    pub fn device(&self) -> &'a Device {
        self.device
    }

    fn guestfs(&self) -> GuestFs<'a> {
        GuestFs::new(self.host, &self.device.name)
    }

    /// Register the domain with libvirt
    pub fn define(&self) -> Result<()> {
        let xml = self.workdir.join(format!("{}.xml", self.name()));
        self.virsh.define(&xml)?;
        info!("VM '{}' defined", self.name());
        Ok(())
    }

    /// Write a file into the guest
    pub fn copy_to_vm(&self, content: &str, file_name: &str, target_dir: &str) -> Result<()> {
        self.guestfs().copy_in(content, file_name, target_dir)
    }

    /// Point the guest's own name at 127.0.1.1
    pub fn edit_hosts(&self) -> Result<()> {
        self.guestfs()
            .edit("/etc/hosts", &guest_config::hosts_expression(self.device))
    }

    /// Turn on IPv4 forwarding
    pub fn edit_load_balancer(&self) -> Result<()> {
        self.guestfs()
            .edit("/etc/sysctl.conf", guest_config::ip_forward_expression())
    }

    /// Append the frontend and backend pool to the guest's haproxy config.
    ///
    /// The current file is read first; if that fails nothing is written.
    pub fn edit_haproxy_conf(&self, topology: &Topology) -> Result<()> {
        let guestfs = self.guestfs();
        let current = guestfs.cat(HAPROXY_CONF)?;
        let merged =
            guest_config::merge_haproxy_config(&current, &guest_config::haproxy_block(topology));
        guestfs.copy_in(&merged, "haproxy.cfg", "/etc/haproxy")?;
        debug!("VM '{}': haproxy configured", self.name());
        Ok(())
    }

    /// Run `command` at boot from rc.local
    pub fn configure_rc_local(&self, command: &str) -> Result<()> {
        self.guestfs()
            .edit("/etc/rc.local", &guest_config::rc_local_expression(command))
    }

    /// Write hostname, interfaces and hosts, plus the role-specific files.
    ///
    /// Each step is attempted even if an earlier one failed.
    pub fn configure(&self, topology: &Topology, failures: &mut StepFailures) {
        let name = self.name();
        let before = failures.len();

        failures.record(
            format_args!("VM '{name}': hostname"),
            self.copy_to_vm(&guest_config::hostname(self.device), "hostname", "/etc"),
        );
        failures.record(
            format_args!("VM '{name}': interfaces"),
            self.copy_to_vm(
                &guest_config::interfaces_file(self.device),
                "interfaces",
                "/etc/network",
            ),
        );
        failures.record(format_args!("VM '{name}': hosts"), self.edit_hosts());

        match self.device.role {
            Role::LoadBalancer => {
                failures.record(
                    format_args!("VM '{name}': ip forwarding"),
                    self.edit_load_balancer(),
                );
                failures.record(
                    format_args!("VM '{name}': haproxy"),
                    self.edit_haproxy_conf(topology),
                );
                failures.record(
                    format_args!("VM '{name}': rc.local"),
                    self.configure_rc_local(LB_BOOT_COMMAND),
                );
            }
            Role::Server => {
                failures.record(
                    format_args!("VM '{name}': rc.local"),
                    self.configure_rc_local(SERVER_BOOT_COMMAND),
                );
                failures.record(
                    format_args!("VM '{name}': index.html"),
                    self.copy_to_vm(
                        &guest_config::index_html(self.device),
                        "index.html",
                        "/var/www/html",
                    ),
                );
            }
            Role::Client => {}
        }

        if failures.len() == before {
            info!("VM '{name}' configured");
        }
    }

    /// Current libvirt state; `None` if not defined
    pub fn state(&self) -> Result<Option<DomainState>> {
        self.virsh.domain_state(self.name())
    }

    /// Whether the domain is running
    pub fn is_running(&self) -> Result<bool> {
        self.virsh.is_running(self.name())
    }

    /// Boot the domain
    pub fn start(&self) -> Result<()> {
        self.virsh.start(self.name())?;
        info!("VM '{}' started", self.name());
        Ok(())
    }

    /// Shut the domain down if it is running; `force` pulls the plug instead
    pub fn stop(&self, force: bool) -> Result<()> {
        let name = self.name();
        if !self.is_running()? {
            info!("VM '{name}' is not running");
            return Ok(());
        }
        if force {
            self.virsh.destroy(name)?;
            info!("VM '{name}' forcibly stopped");
        } else {
            self.virsh.shutdown(name)?;
            info!("VM '{name}' stopped");
        }
        Ok(())
    }

    /// Force off the domain if it is running
    pub fn destroy(&self) -> Result<()> {
        let name = self.name();
        if !self.is_running()? {
            debug!("VM '{name}' is not running, nothing to destroy");
            return Ok(());
        }
        self.virsh.destroy(name)?;
        info!("VM '{name}' destroyed");
        Ok(())
    }

    /// Remove the domain definition if there is one
    pub fn undefine(&self) -> Result<()> {
        let name = self.name();
        if self.state()?.is_none() {
            warn!("VM '{name}' is not defined");
            return Ok(());
        }
        self.virsh.undefine(name)?;
        info!("VM '{name}' undefined");
        Ok(())
    }

    /// Open a console window
    pub fn show_console(&self) -> Result<()> {
        console::open(self.virsh, self.name())
    }

    /// Close every console window of this VM
    pub fn close_console(&self) -> Result<()> {
        let closed = console::close(self.name())?;
        if closed == 0 {
            debug!("No console window open for VM '{}'", self.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::os::unix::fs::PermissionsExt;

    const RUNNING: &str = "echo running";
    const SHUT_OFF: &str = r#"echo "shut off""#;
    const UNDEFINED: &str = r#"echo "error: failed to get domain '$2'" >&2; exit 1"#;
    const CAT_OK: &str = r"printf 'global\n    daemon\n'";
    const CAT_FAIL: &str = "echo 'virt-cat: no such file' >&2; exit 1";

    /// Shell stand-ins for virsh and the virt-* tools that append their
    /// argv to `<dir>/log`; virt-copy-in also keeps the copied file.
    struct FakeTools {
        _td: tempfile::TempDir,
        dir: Utf8PathBuf,
        host: HostExec,
    }

    impl FakeTools {
        fn new(domstate: &str, cat: &str) -> Self {
            let td = tempfile::tempdir().unwrap();
            let dir = Utf8PathBuf::try_from(td.path().to_path_buf()).unwrap();
            let log = dir.join("log");
            let logged = |name: &str| format!(r#"printf '%s\n' "{name} $*" >> "{log}""#);

            let virsh = format!("if [ \"$1\" = domstate ]; then\n{domstate}\nfi");
            write_tool(&dir, "virsh", &format!("{}\n{virsh}", logged("virsh")));
            write_tool(&dir, "virt-edit", &logged("virt-edit"));
            write_tool(&dir, "virt-cat", &format!("{}\n{cat}", logged("virt-cat")));
            // Log the staged file by name only, and keep a copy of it
            let copy_in = format!(
                r#"printf '%s\n' "virt-copy-in $1 $2 $(basename "$3") $4" >> "{log}"
cp "$3" "{dir}/copied-$(basename "$3")""#
            );
            write_tool(&dir, "virt-copy-in", &copy_in);

            let inherited = std::env::var_os("PATH").unwrap_or_default();
            let search = std::iter::once(dir.clone().into_std_path_buf())
                .chain(std::env::split_paths(&inherited));
            let host = HostExec {
                sudo: false,
                path: Some(std::env::join_paths(search).unwrap()),
            };
            Self { _td: td, dir, host }
        }

        fn log(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.join("log"))
                .unwrap_or_default()
                .lines()
                .map(String::from)
                .collect()
        }

        fn copied(&self, name: &str) -> String {
            std::fs::read_to_string(self.dir.join(format!("copied-{name}"))).unwrap()
        }
    }

    fn write_tool(dir: &Utf8Path, name: &str, body: &str) {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn configure(tools: &FakeTools, name: &str) -> StepFailures {
        let topology = Topology::generate(2);
        let virsh = Virsh::new(tools.host.clone(), None);
        let vm = LabVm::new(topology.device(name).unwrap(), &virsh, &tools.host, &tools.dir);
        let mut failures = StepFailures::new();
        vm.configure(&topology, &mut failures);
        failures
    }

    #[test]
    fn test_configure_load_balancer() {
        let tools = FakeTools::new(SHUT_OFF, CAT_OK);
        let failures = configure(&tools, "lb");
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(
            tools.log(),
            [
                "virt-copy-in -d lb hostname /etc",
                "virt-copy-in -d lb interfaces /etc/network",
                "virt-edit -d lb /etc/hosts -e s/127.0.1.1.*/127.0.1.1 lb/",
                concat!(
                    "virt-edit -d lb /etc/sysctl.conf -e ",
                    "s/#net.ipv4.ip_forward=1/net.ipv4.ip_forward=1/"
                ),
                "virt-cat -d lb /etc/haproxy/haproxy.cfg",
                "virt-copy-in -d lb haproxy.cfg /etc/haproxy",
                r"virt-edit -d lb /etc/rc.local -e s|^exit 0|service haproxy restart\nexit 0|",
            ]
        );
        let topology = Topology::generate(2);
        assert_eq!(
            tools.copied("haproxy.cfg"),
            guest_config::merge_haproxy_config(
                "global\n    daemon\n",
                &guest_config::haproxy_block(&topology)
            )
        );
        assert_eq!(tools.copied("hostname"), "lb\n");
    }

    #[test]
    fn test_configure_server() {
        let tools = FakeTools::new(SHUT_OFF, CAT_OK);
        let failures = configure(&tools, "s1");
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(
            tools.log(),
            [
                "virt-copy-in -d s1 hostname /etc",
                "virt-copy-in -d s1 interfaces /etc/network",
                "virt-edit -d s1 /etc/hosts -e s/127.0.1.1.*/127.0.1.1 s1/",
                r"virt-edit -d s1 /etc/rc.local -e s|^exit 0|systemctl start apache2\nexit 0|",
                "virt-copy-in -d s1 index.html /var/www/html",
            ]
        );
        assert_eq!(tools.copied("index.html"), "'s1' index page\n");
    }

    #[test]
    fn test_configure_client() {
        let tools = FakeTools::new(SHUT_OFF, CAT_OK);
        let failures = configure(&tools, "c1");
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(
            tools.log(),
            [
                "virt-copy-in -d c1 hostname /etc",
                "virt-copy-in -d c1 interfaces /etc/network",
                "virt-edit -d c1 /etc/hosts -e s/127.0.1.1.*/127.0.1.1 c1/",
            ]
        );
    }

    #[test]
    fn test_unreadable_haproxy_conf_is_left_alone() {
        let tools = FakeTools::new(SHUT_OFF, CAT_FAIL);
        let failures = configure(&tools, "lb");
        assert_eq!(failures.len(), 1);
        let log = tools.log();
        assert!(!log.iter().any(|l| l.contains("haproxy.cfg /etc/haproxy")), "{log:?}");
        // Later steps still run
        assert!(log.last().unwrap().contains("/etc/rc.local"), "{log:?}");
    }

    fn with_vm(tools: &FakeTools, f: impl FnOnce(&LabVm<'_>)) {
        let topology = Topology::generate(2);
        let virsh = Virsh::new(tools.host.clone(), None);
        let vm = LabVm::new(topology.device("s1").unwrap(), &virsh, &tools.host, &tools.dir);
        f(&vm);
    }

    #[test]
    fn test_stop_and_destroy_skip_stopped_domain() {
        let tools = FakeTools::new(SHUT_OFF, CAT_OK);
        with_vm(&tools, |vm| {
            vm.stop(false).unwrap();
            vm.stop(true).unwrap();
            vm.destroy().unwrap();
        });
        assert_eq!(tools.log(), ["virsh domstate s1"; 3]);
    }

    #[test]
    fn test_stop_running_domain() {
        let tools = FakeTools::new(RUNNING, CAT_OK);
        with_vm(&tools, |vm| {
            assert!(vm.is_running().unwrap());
            vm.stop(false).unwrap();
            vm.stop(true).unwrap();
            vm.destroy().unwrap();
        });
        assert_eq!(
            tools.log(),
            [
                "virsh domstate s1",
                "virsh domstate s1",
                "virsh shutdown s1",
                "virsh domstate s1",
                "virsh destroy s1",
                "virsh domstate s1",
                "virsh destroy s1",
            ]
        );
    }

    #[test]
    fn test_undefine_only_defined_domain() {
        let tools = FakeTools::new(UNDEFINED, CAT_OK);
        with_vm(&tools, |vm| {
            assert_eq!(vm.state().unwrap(), None);
            vm.undefine().unwrap();
            vm.stop(false).unwrap();
        });
        assert_eq!(tools.log(), ["virsh domstate s1"; 3]);

        let tools = FakeTools::new(SHUT_OFF, CAT_OK);
        with_vm(&tools, |vm| vm.undefine().unwrap());
        assert_eq!(tools.log(), ["virsh domstate s1", "virsh undefine s1"]);
    }

    #[test]
    fn test_define_uses_workdir_descriptor() {
        let tools = FakeTools::new(SHUT_OFF, CAT_OK);
        with_vm(&tools, |vm| {
            assert_eq!(vm.name(), "s1");
            assert_eq!(vm.device().role, Role::Server);
            vm.define().unwrap();
        });
        assert_eq!(tools.log(), [format!("virsh define {}/s1.xml", tools.dir)]);
    }
}
