//! Contents of the files written into guests, and the `virt-edit` expressions
//! applied to files that already exist there.

use crate::topology::{Device, Topology};
use indoc::{indoc, writedoc};
use std::fmt::Write as _;

/// Service started from `/etc/rc.local` on servers
pub const SERVER_BOOT_COMMAND: &str = "systemctl start apache2";
/// Service restarted from `/etc/rc.local` on the load balancer
pub const LB_BOOT_COMMAND: &str = "service haproxy restart";

const HAPROXY_PREAMBLE: &str = indoc! {"
    listen stats
        bind :8001
        stats enable
        stats uri /
        stats hide-version
        stats auth admin:cdps

    frontend lb
        bind *:80
        mode http
        default_backend webservers

    backend webservers
        mode http
        balance roundrobin
"};

/// `/etc/hostname`
pub fn hostname(device: &Device) -> String {
    format!("{}\n", device.name)
}

/// `/var/www/html/index.html` for a server
pub fn index_html(device: &Device) -> String {
    format!("'{}' index page\n", device.name)
}

/// Debian style `/etc/network/interfaces` with a static stanza per interface.
///
/// Stanzas are separated by blank lines, with one before the loopback stanza
/// and one after the last interface.
pub fn interfaces_file(device: &Device) -> String {
    let mut out = String::from("\nauto lo\niface lo inet loopback\n");
    for iface in &device.interfaces {
        // Writing to a String cannot fail
        let _ = writedoc!(
            out,
            "

                auto {name}
                iface {name} inet static
                    address {addr}
                    netmask {mask}
                    gateway {gw}
            ",
            name = iface.name,
            addr = iface.ipv4,
            mask = iface.mask,
            gw = iface.gateway,
        );
    }
    out.push('\n');
    out
}

/// The stats listener, frontend and round-robin backend over every server.
pub fn haproxy_block(topology: &Topology) -> String {
    let mut block = HAPROXY_PREAMBLE.to_string();
    for (name, ip) in topology.haproxy_backends() {
        let _ = writeln!(block, "    server {name} {ip}:80 check");
    }
    block.trim().to_string()
}

/// Append `block` to the current `haproxy.cfg` content.
pub fn merge_haproxy_config(current: &str, block: &str) -> String {
    format!("\n{current}{block}\n")
}

/// Point `127.0.1.1` at the device's own name in `/etc/hosts`.
pub fn hosts_expression(device: &Device) -> String {
    format!("s/127.0.1.1.*/127.0.1.1 {}/", device.name)
}

/// Uncomment `net.ipv4.ip_forward=1` in `/etc/sysctl.conf`.
pub fn ip_forward_expression() -> &'static str {
    "s/#net.ipv4.ip_forward=1/net.ipv4.ip_forward=1/"
}

/// Insert `command` before the final `exit 0` of `/etc/rc.local`.
pub fn rc_local_expression(command: &str) -> String {
    format!("s|^exit 0|{command}\\nexit 0|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_interfaces_single() {
        let topo = Topology::generate(2);
        let s1 = topo.device("s1").unwrap();
        let expected = indoc! {"
            auto lo
            iface lo inet loopback

            auto eth0
            iface eth0 inet static
                address 10.1.2.11
                netmask 255.255.255.0
                gateway 10.1.2.1
        "};
        assert_eq!(interfaces_file(s1), format!("\n{expected}\n"));
    }

    #[test]
    fn test_interfaces_lb_has_both() {
        let topo = Topology::generate(2);
        let out = interfaces_file(topo.device("lb").unwrap());
        assert!(out.contains("auto eth0\niface eth0 inet static\n    address 10.1.1.1\n"));
        assert!(out.contains("auto eth1\niface eth1 inet static\n    address 10.1.2.1\n"));
        assert!(out.find("eth0").unwrap() < out.find("eth1").unwrap());
        assert!(out.starts_with("\nauto lo\n"));
        assert!(out.ends_with("    gateway 10.1.2.1\n\n"), "{out:?}");
    }

    #[test]
    fn test_haproxy_block() {
        let topo = Topology::generate(3);
        assert_eq!(
            haproxy_block(&topo),
            indoc! {"
                listen stats
                    bind :8001
                    stats enable
                    stats uri /
                    stats hide-version
                    stats auth admin:cdps

                frontend lb
                    bind *:80
                    mode http
                    default_backend webservers

                backend webservers
                    mode http
                    balance roundrobin
                    server s1 10.1.2.11:80 check
                    server s2 10.1.2.12:80 check
                    server s3 10.1.2.13:80 check"}
        );
    }

    #[test]
    fn test_merge_haproxy_config() {
        let merged = merge_haproxy_config("global\n    daemon\n", "frontend lb");
        assert_eq!(merged, "\nglobal\n    daemon\nfrontend lb\n");
    }

    #[test]
    fn test_small_files() {
        let topo = Topology::generate(2);
        let s2 = topo.device("s2").unwrap();
        assert_eq!(hostname(s2), "s2\n");
        assert_eq!(index_html(s2), "'s2' index page\n");
        assert_eq!(hosts_expression(s2), "s/127.0.1.1.*/127.0.1.1 s2/");
    }

    #[test]
    fn test_rc_local_expression() {
        assert_eq!(
            rc_local_expression(SERVER_BOOT_COMMAND),
            r"s|^exit 0|systemctl start apache2\nexit 0|"
        );
        assert_eq!(
            rc_local_expression(LB_BOOT_COMMAND),
            r"s|^exit 0|service haproxy restart\nexit 0|"
        );
    }
}
