//! Provision a small virtual network lab: a load balancer, a client and
//! a pool of web servers as libvirt VMs on two Open vSwitch bridges.
//!
//! Everything is done by driving host tools (`virsh`, `qemu-img`,
//! `ovs-vsctl`, `ip`, the libguestfs `virt-*` tools and `xterm`); the
//! [`lab`] module holds the subcommands built on top of them.

pub mod cmdext;
pub mod config;
pub mod console;
pub mod domain_xml;
pub mod failures;
pub mod guest_config;
pub mod guestfs;
pub mod hostexec;
pub mod lab;
pub mod network;
pub mod ovs;
pub mod qemu_img;
pub mod topology;
pub mod virsh;
pub mod vm;
pub mod xml_utils;
