//! Lab environment on the host: disk overlays and domain descriptors in the
//! work directory, the bridges, and the host's address on LAN1.

use crate::domain_xml::DomainDescriptor;
use crate::failures::StepFailures;
use crate::ovs::Ovs;
use crate::qemu_img;
use crate::topology::{Bridge, Device, Topology};
use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{eyre, Context as _};
use color_eyre::Result;
use regex::Regex;
use strum::IntoEnumIterator;
use tracing::{debug, info};

/// File names this tool generates: `<device>.xml` and `<device>.qcow2`
const GENERATED_FILE_PATTERN: &str = r"^(lb|c[0-9]+|s[0-9]+)\.(xml|qcow2)$";

/// Per-lab files and bridges
#[derive(Debug)]
pub struct LabNetwork<'a> {
    workdir: &'a Utf8Path,
    qcow_base: &'a Utf8Path,
    xml_base: &'a Utf8Path,
    topology: &'a Topology,
    ovs: Ovs,
}

impl<'a> LabNetwork<'a> {
    /// Manage the lab in `workdir`; base paths are relative to it
    pub fn new(
        workdir: &'a Utf8Path,
        qcow_base: &'a Utf8Path,
        xml_base: &'a Utf8Path,
        topology: &'a Topology,
        ovs: Ovs,
    ) -> Self {
        Self {
            workdir,
            qcow_base,
            xml_base,
            topology,
            ovs,
        }
    }

    /// `<workdir>/<device>.xml`
    pub fn xml_path(&self, device: &Device) -> Utf8PathBuf {
        self.workdir.join(format!("{}.xml", device.name))
    }

    /// `<workdir>/<device>.qcow2`
    pub fn qcow2_path(&self, device: &Device) -> Utf8PathBuf {
        self.workdir.join(format!("{}.qcow2", device.name))
    }

    /// Overlay the base image once per device
    pub fn create_qcow2_files(&self, failures: &mut StepFailures) {
        for device in self.topology.devices() {
            let target = Utf8PathBuf::from(format!("{}.qcow2", device.name));
            let r = qemu_img::create_overlay(self.workdir, self.qcow_base, &target);
            if failures
                .record(format_args!("QCOW2 for {}", device.name), r)
                .is_some()
            {
                debug!("{target} successfully created");
            }
        }
        info!("QCOW2 files created");
    }

    /// Copy the base descriptor once per device
    pub fn create_xml_files(&self, failures: &mut StepFailures) {
        let base = self.workdir.join(self.xml_base);
        for device in self.topology.devices() {
            let target = self.xml_path(device);
            let r = std::fs::copy(&base, &target)
                .with_context(|| format!("Failed to copy {base} to {target}"));
            if failures
                .record(format_args!("XML for {}", device.name), r)
                .is_some()
            {
                debug!("{target} successfully created");
            }
        }
        info!("XML files created");
    }

    /// Rewrite one device's descriptor: name, disk and bridges
    pub fn configure_xml(&self, device: &Device) -> Result<()> {
        let xml = self.xml_path(device);
        let qcow2 = self.qcow2_path(device);
        if !qcow2.exists() {
            return Err(eyre!("{qcow2} does not exist"));
        }
        let source = qcow2
            .canonicalize_utf8()
            .with_context(|| format!("Failed to resolve {qcow2}"))?;

        let mut descriptor = DomainDescriptor::load(&xml)?;
        descriptor.set_name(&device.name)?;
        descriptor.set_disk_source(&source)?;
        descriptor.bind_bridges(device.bridges())?;
        descriptor.save(&xml)?;
        debug!("{xml} successfully modified");
        Ok(())
    }

    /// Configure every device's descriptor per the topology
    pub fn configure_xml_env(&self, failures: &mut StepFailures) {
        for device in self.topology.devices() {
            failures.record(
                format_args!("Error modifying {}.xml", device.name),
                self.configure_xml(device),
            );
        }
        info!("XML files configured");
    }

    /// Create LAN1 and LAN2
    pub fn create_bridges(&self, failures: &mut StepFailures) {
        for bridge in Bridge::iter() {
            if failures
                .record(format_args!("bridge {bridge}"), self.ovs.add_bridge(bridge))
                .is_some()
            {
                info!("Bridge {bridge} created");
            }
        }
    }

    /// Remove LAN1 and LAN2
    pub fn delete_bridges(&self, failures: &mut StepFailures) {
        for bridge in Bridge::iter() {
            if failures
                .record(format_args!("bridge {bridge}"), self.ovs.del_bridge(bridge))
                .is_some()
            {
                info!("Bridge {bridge} deleted");
            }
        }
    }

    /// Give the host its LAN1 address and a route into the lab
    pub fn add_interface_to_host(&self, failures: &mut StepFailures) {
        if failures
            .record("host interface", self.ovs.add_host_interface())
            .is_some()
        {
            info!("LAN1 interface added to host");
        }
    }

    /// Disks, descriptors, bridges and host interface, in that order
    pub fn create_environment(&self) -> StepFailures {
        let mut failures = StepFailures::new();
        self.create_qcow2_files(&mut failures);
        self.create_xml_files(&mut failures);
        self.configure_xml_env(&mut failures);
        self.create_bridges(&mut failures);
        self.add_interface_to_host(&mut failures);
        failures
    }

    /// Generated descriptors and disks present in the work directory.
    ///
    /// Any `lb`/`c<N>`/`s<N>` file counts, so a lab created with more servers
    /// than currently configured is still cleaned up. The base files never match.
    pub fn generated_files(&self) -> Result<Vec<Utf8PathBuf>> {
        let pattern = Regex::new(GENERATED_FILE_PATTERN)?;
        let bases: Vec<&str> = [self.qcow_base, self.xml_base]
            .iter()
            .filter_map(|p| p.file_name())
            .collect();

        let mut files = Vec::new();
        for entry in self
            .workdir
            .read_dir_utf8()
            .with_context(|| format!("Failed to read {}", self.workdir))?
        {
            let entry = entry?;
            let name = entry.file_name();
            if !pattern.is_match(name) || bases.contains(&name) {
                continue;
            }
            if entry.file_type()?.is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete every generated descriptor and disk
    pub fn destroy_files(&self, failures: &mut StepFailures) {
        let Some(files) = failures.record("listing generated files", self.generated_files())
        else {
            return;
        };
        for file in files {
            let r =
                std::fs::remove_file(&file).with_context(|| format!("Failed to delete {file}"));
            if failures.record(format_args!("delete {file}"), r).is_some() {
                debug!("Deleted {file}");
            }
        }
        info!("Generated XML and QCOW2 files deleted");
    }

    /// Remove generated files, then bridges
    pub fn clean_environment(&self) -> StepFailures {
        debug!("Starting environment clean-up");
        let mut failures = StepFailures::new();
        self.destroy_files(&mut failures);
        self.delete_bridges(&mut failures);
        info!("Environment clean-up completed");
        failures
    }
}
