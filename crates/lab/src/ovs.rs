//! Open vSwitch bridges and the host's own leg on the lab network.

use crate::cmdext::CommandRunExt;
use crate::hostexec::HostExec;
use crate::topology::{Bridge, HOST_LAN1_CIDR, HOST_ROUTE, HOST_ROUTE_VIA};
use color_eyre::{eyre::Context as _, Result};
use std::process::Command;

/// Bridge manager
#[derive(Debug, Clone)]
pub struct Ovs {
    host: HostExec,
}

impl Ovs {
    /// Create a manager
    pub fn new(host: HostExec) -> Self {
        Self { host }
    }

    /// `ovs-vsctl --may-exist add-br <bridge>`
    pub fn add_bridge_command(&self, bridge: Bridge) -> Command {
        let mut cmd = self.host.command("ovs-vsctl");
        cmd.args(["--may-exist", "add-br", bridge.as_ref()]);
        cmd
    }

    /// `ovs-vsctl --if-exists del-br <bridge>`
    pub fn del_bridge_command(&self, bridge: Bridge) -> Command {
        let mut cmd = self.host.command("ovs-vsctl");
        cmd.args(["--if-exists", "del-br", bridge.as_ref()]);
        cmd
    }

    /// Create `bridge`; an existing bridge is left alone
    pub fn add_bridge(&self, bridge: Bridge) -> Result<()> {
        self.add_bridge_command(bridge)
            .run_get_string()
            .with_context(|| format!("Error creating bridge {bridge}"))?;
        Ok(())
    }

    /// Delete `bridge`; a missing bridge is not an error
    pub fn del_bridge(&self, bridge: Bridge) -> Result<()> {
        self.del_bridge_command(bridge)
            .run_get_string()
            .with_context(|| format!("Error deleting bridge {bridge}"))?;
        Ok(())
    }

    /// The `ip` invocations that give the host an address on LAN1 and a
    /// route into the lab through the load balancer.
    pub fn host_interface_commands(&self) -> Vec<Command> {
        let lan1 = Bridge::Lan1.as_ref();
        let via = HOST_ROUTE_VIA.to_string();
        let steps: [Vec<&str>; 3] = [
            vec!["link", "set", lan1, "up"],
            vec!["addr", "replace", HOST_LAN1_CIDR, "dev", lan1],
            vec!["route", "replace", HOST_ROUTE, "via", &via],
        ];
        steps
            .into_iter()
            .map(|args| {
                let mut cmd = self.host.command("ip");
                cmd.args(args);
                cmd
            })
            .collect()
    }

    /// Bring LAN1 up on the host with a fixed address and route
    pub fn add_host_interface(&self) -> Result<()> {
        for mut cmd in self.host_interface_commands() {
            cmd.run_get_string()
                .context("Error adding interface to host")?;
        }
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
    fn test_bridge_commands() {
        let ovs = Ovs::new(HostExec::new(true));
        assert_eq!(
            args(&ovs.add_bridge_command(Bridge::Lan1)),
            ["sudo", "ovs-vsctl", "--may-exist", "add-br", "LAN1"]
        );
        assert_eq!(
            args(&ovs.del_bridge_command(Bridge::Lan2)),
            ["sudo", "ovs-vsctl", "--if-exists", "del-br", "LAN2"]
        );
    }

    #[test]
    fn test_host_interface_commands() {
        let ovs = Ovs::new(HostExec::new(false));
        let cmds: Vec<_> = ovs.host_interface_commands().iter().map(args).collect();
        assert_eq!(
            cmds,
            vec![
                vec!["ip", "link", "set", "LAN1", "up"],
                vec!["ip", "addr", "replace", "10.1.1.3/24", "dev", "LAN1"],
                vec!["ip", "route", "replace", "10.1.0.0/16", "via", "10.1.1.1"],
            ]
        );
    }
}
