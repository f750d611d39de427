//! Per-device libvirt domain XML, derived from the shared base template.

use crate::topology::Bridge;
use crate::xml_utils::{self, XmlNode};
use camino::Utf8Path;
use color_eyre::eyre::{eyre, Context as _};
use color_eyre::Result;

const DISK_SOURCE: &[&str] = &["devices", "disk", "source"];
const INTERFACE: &[&str] = &["devices", "interface"];

/// A parsed domain descriptor
#[derive(Debug, Clone)]
pub struct DomainDescriptor {
    root: XmlNode,
}

impl DomainDescriptor {
    /// Parse a descriptor from a string
    pub fn parse(xml: &str) -> Result<Self> {
        let root = xml_utils::parse_xml_dom(xml)?;
        if root.name != "domain" {
            return Err(eyre!("Expected <domain> root element, found <{}>", root.name));
        }
        Ok(Self { root })
    }

    /// Read and parse a descriptor file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path).with_context(|| format!("{path} not found"))?;
        Self::parse(&xml).with_context(|| format!("Failed to parse {path}"))
    }

    /// Serialize with an XML declaration
    pub fn to_xml(&self) -> Result<String> {
        self.root.to_document_string()
    }

    /// Write the descriptor to `path`, replacing it
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        std::fs::write(path, self.to_xml()?).with_context(|| format!("Failed to write {path}"))
    }

    /// Domain name
    pub fn name(&self) -> Option<&str> {
        self.root.find("name").map(|n| n.text_content())
    }

    /// Disk image backing the first disk
    pub fn disk_source(&self) -> Option<&str> {
        self.root.find_path(DISK_SOURCE).and_then(|n| n.attr("file"))
    }

    /// Bridge of every interface, in device order
    pub fn bridges(&self) -> Vec<&str> {
        self.root
            .child("devices")
            .into_iter()
            .flat_map(|d| d.children_named("interface"))
            .filter_map(|i| i.child("source").and_then(|s| s.attr("bridge")))
            .collect()
    }

    /// Set the domain name
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let node = self
            .root
            .find_mut("name")
            .ok_or_else(|| eyre!("Missing <name> element"))?;
        node.text = name.to_string();
        Ok(())
    }

    /// Point the first disk that has a `<source>` at `path`
    pub fn set_disk_source(&mut self, path: &Utf8Path) -> Result<()> {
        self.root
            .find_path_mut(DISK_SOURCE)
            .ok_or_else(|| eyre!("Missing <devices><disk><source> element"))?
            .set_attr("file", path.as_str());
        Ok(())
    }

    /// Attach the domain to `bridges`.
    ///
    /// The first interface of the template is rebound to the first bridge and
    /// gets an Open vSwitch virtualport if it has none. Each further bridge
    /// gets a copy of that interface.
    pub fn bind_bridges(&mut self, bridges: &[Bridge]) -> Result<()> {
        let (first, rest) = bridges
            .split_first()
            .ok_or_else(|| eyre!("A domain needs at least one bridge"))?;

        let interface = self
            .root
            .find_path_mut(INTERFACE)
            .ok_or_else(|| eyre!("Missing <devices><interface> element"))?;
        set_interface_bridge(interface, *first)?;
        if interface.child("virtualport").is_none() {
            let mut virtualport = XmlNode::new("virtualport");
            virtualport.set_attr("type", "openvswitch");
            interface.children.push(virtualport);
        }
        let template = interface.clone();

        let devices = self
            .root
            .find_mut("devices")
            .ok_or_else(|| eyre!("Missing <devices> element"))?;
        for bridge in rest {
            let mut copy = template.clone();
            set_interface_bridge(&mut copy, *bridge)?;
            devices.children.push(copy);
        }
        Ok(())
    }
}

fn set_interface_bridge(interface: &mut XmlNode, bridge: Bridge) -> Result<()> {
    interface
        .child_mut("source")
        .ok_or_else(|| eyre!("Missing <source> in <interface>"))?
        .set_attr("bridge", bridge.as_ref());
    Ok(())
}
