//! Lab devices, their addresses and the bridges they attach to.
//!
//! The layout is fixed apart from the number of servers:
//!
//! ```text
//!   c1 ── LAN1 ── lb ── LAN2 ── s1..sN
//!                  │
//!                 host (10.1.1.3)
//! ```

use serde::Serialize;
use std::net::Ipv4Addr;

/// Reasons a device lookup fails
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    /// No device with this name in the lab
    #[error("VM '{0}' not found in the lab")]
    UnknownDevice(String),
}

/// The virtual switches of the lab
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum Bridge {
    /// Client side network
    #[strum(to_string = "LAN1")]
    #[serde(rename = "LAN1")]
    Lan1,
    /// Server side network
    #[strum(to_string = "LAN2")]
    #[serde(rename = "LAN2")]
    Lan2,
}

/// What a device does in the lab, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// `lb`
    LoadBalancer,
    /// `c<N>`
    Client,
    /// `s<N>`
    Server,
}

impl Role {
    /// Classify a device name by its naming convention.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "lb" {
            Some(Role::LoadBalancer)
        } else if name.starts_with('c') {
            Some(Role::Client)
        } else if name.starts_with('s') {
            Some(Role::Server)
        } else {
            None
        }
    }

    /// Bridges a device with this role is plugged into, in interface order.
    pub fn bridges(&self) -> &'static [Bridge] {
        match self {
            Role::LoadBalancer => &[Bridge::Lan1, Bridge::Lan2],
            Role::Client => &[Bridge::Lan1],
            Role::Server => &[Bridge::Lan2],
        }
    }
}

/// Static IPv4 configuration of one guest interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    /// Guest interface name, e.g. `eth0`
    pub name: String,
    /// Address
    pub ipv4: Ipv4Addr,
    /// Netmask
    pub mask: Ipv4Addr,
    /// Default gateway
    pub gateway: Ipv4Addr,
}

impl Interface {
    fn new(name: &str, ipv4: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            ipv4,
            mask: NETMASK,
            gateway,
        }
    }
}

/// One virtual machine of the lab
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Domain name, also the guest hostname
    pub name: String,
    /// Role implied by the name
    pub role: Role,
    /// Interfaces in guest order
    pub interfaces: Vec<Interface>,
}

impl Device {
    /// Bridges this device attaches to.
    pub fn bridges(&self) -> &'static [Bridge] {
        self.role.bridges()
    }

    /// Address of the first interface, if any.
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.interfaces.first().map(|i| i.ipv4)
    }
}

const NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
const LAN1_GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 1);
const LAN2_GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 1, 2, 1);
/// Last octet of `s1`'s address; `sN` gets `SERVER_BASE_OCTET + N`.
const SERVER_BASE_OCTET: u8 = 10;

/// Address the host takes on LAN1
pub const HOST_LAN1_CIDR: &str = "10.1.1.3/24";
/// Route from the host to every lab network
pub const HOST_ROUTE: &str = "10.1.0.0/16";
/// Next hop for [`HOST_ROUTE`]
pub const HOST_ROUTE_VIA: Ipv4Addr = LAN1_GATEWAY;

/// The generated lab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    devices: Vec<Device>,
}

impl Topology {
    /// Build the lab for `number_of_servers` backends: `lb`, `c1`, `s1`..`sN`.
    pub fn generate(number_of_servers: u32) -> Self {
        let mut devices = vec![
            Device {
                name: "lb".into(),
                role: Role::LoadBalancer,
                interfaces: vec![
                    Interface::new("eth0", LAN1_GATEWAY, LAN1_GATEWAY),
                    Interface::new("eth1", LAN2_GATEWAY, LAN2_GATEWAY),
                ],
            },
            Device {
                name: "c1".into(),
                role: Role::Client,
                interfaces: vec![Interface::new(
                    "eth0",
                    Ipv4Addr::new(10, 1, 1, 2),
                    LAN1_GATEWAY,
                )],
            },
        ];
        devices.extend((1..=number_of_servers).map(|i| {
            // The config layer caps this well below overflow
            let octet = SERVER_BASE_OCTET.saturating_add(u8::try_from(i).unwrap_or(u8::MAX));
            Device {
                name: format!("s{i}"),
                role: Role::Server,
                interfaces: vec![Interface::new(
                    "eth0",
                    Ipv4Addr::new(10, 1, 2, octet),
                    LAN2_GATEWAY,
                )],
            }
        }));
        Self { devices }
    }

    /// All devices in lab order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Look up a device by name.
    pub fn device(&self, name: &str) -> Result<&Device, TopologyError> {
        self.devices
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| TopologyError::UnknownDevice(name.to_string()))
    }

    /// Either the named device or every device.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&Device>, TopologyError> {
        match name {
            Some(name) => Ok(vec![self.device(name)?]),
            None => Ok(self.devices.iter().collect()),
        }
    }

    /// Device name to bridges, in lab order.
    pub fn network_map(&self) -> Vec<(&str, &'static [Bridge])> {
        self.devices
            .iter()
            .map(|d| (d.name.as_str(), d.bridges()))
            .collect()
    }

    /// `(name, eth0 address)` of every server, for the load balancer backend list.
    pub fn haproxy_backends(&self) -> Vec<(&str, Ipv4Addr)> {
        self.devices
            .iter()
            .filter(|d| d.role == Role::Server)
            .filter_map(|d| {
                d.interfaces
                    .iter()
                    .find(|i| i.name == "eth0")
                    .map(|i| (d.name.as_str(), i.ipv4))
            })
            .collect()
    }
}
