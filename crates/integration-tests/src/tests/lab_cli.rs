//! Command line behaviour that needs no hypervisor: argument parsing,
//! configuration errors and the status report.

use camino::Utf8PathBuf;
use color_eyre::Result;
use indoc::formatdoc;
use integration_tests::integration_test;
use linkme::distributed_slice;
use vlab::topology::Topology;
use xshell::{cmd, Shell};

use crate::{get_vlab_command, run_vlab};

/// A config in a fresh work directory; virsh is pointed at a URI nothing
/// listens on so the tests never touch a real libvirt.
fn lab_config(extra: &str) -> Result<(tempfile::TempDir, Utf8PathBuf)> {
    let td = tempfile::tempdir()?;
    let dir = Utf8PathBuf::try_from(td.path().to_path_buf())?;
    let config = dir.join("vlab.json");
    std::fs::write(
        &config,
        format!(
            r#"{{"qcow_base": "base.qcow2", "xml_base": "base.xml", "sudo": false,
                "connect": "test:///nonexistent", "workdir": "{dir}"{extra}}}"#
        ),
    )?;
    Ok((td, config))
}

fn test_help_lists_subcommands() -> Result<()> {
    let sh = Shell::new()?;
    let vlab = get_vlab_command()?;
    let help = cmd!(sh, "{vlab} --help").read()?;
    for verb in ["create", "start", "stop", "destroy", "status", "console"] {
        assert!(help.contains(verb), "missing {verb}: {help}");
    }
    Ok(())
}
integration_test!(test_help_lists_subcommands);

fn test_missing_config_file() -> Result<()> {
    let td = tempfile::tempdir()?;
    let path = Utf8PathBuf::try_from(td.path().join("nope.json"))?;
    let output = run_vlab(&["--config", path.as_str(), "status"])?;
    output.assert_failure_with("status without config", "does not exist");
    Ok(())
}
integration_test!(test_missing_config_file);

fn test_too_many_servers_rejected() -> Result<()> {
    let (_td, config) = lab_config(r#", "number_of_servers": 6"#)?;
    let output = run_vlab(&["--config", config.as_str(), "status"])?;
    output.assert_failure_with("status with 6 servers", "Invalid config file");
    Ok(())
}
integration_test!(test_too_many_servers_rejected);

fn test_toml_config() -> Result<()> {
    let td = tempfile::tempdir()?;
    let dir = Utf8PathBuf::try_from(td.path().to_path_buf())?;
    let config = dir.join("vlab.toml");
    std::fs::write(
        &config,
        formatdoc! {r#"
            qcow_base = "base.qcow2"
            xml_base = "base.xml"
            number_of_servers = 5
            sudo = false
            connect = "test:///nonexistent"
            workdir = "{dir}"
        "#},
    )?;
    let output = run_vlab(&["--config", config.as_str(), "status", "--format", "json"])?;
    output.assert_success("status with TOML config");
    let rows: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(rows.as_array().map(|a| a.len()), Some(7));
    Ok(())
}
integration_test!(test_toml_config);

fn test_status_json_matches_topology() -> Result<()> {
    let (_td, config) = lab_config("")?;
    let output = run_vlab(&["--config", config.as_str(), "status", "--format", "json"])?;
    output.assert_success("status --format json");

    let rows: serde_json::Value = serde_json::from_str(&output.stdout)?;
    let rows = rows.as_array().cloned().unwrap_or_default();
    let topology = Topology::generate(2);
    assert_eq!(rows.len(), topology.devices().len());
    for (row, device) in rows.iter().zip(topology.devices()) {
        assert_eq!(row["name"], device.name.as_str());
        assert_eq!(row["disk"], false);
        let first = device.primary_ipv4().map(|a| a.to_string());
        assert_eq!(row["addresses"][0].as_str(), first.as_deref());
    }
    assert_eq!(rows[0]["bridges"], serde_json::json!(["LAN1", "LAN2"]));
    Ok(())
}
integration_test!(test_status_json_matches_topology);

fn test_status_table() -> Result<()> {
    let (_td, config) = lab_config("")?;
    let output = run_vlab(&["--config", config.as_str(), "status"])?;
    output.assert_success("status");
    for needle in ["NAME", "lb", "c1", "s2", "10.1.2.12", "Work directory"] {
        assert!(output.stdout.contains(needle), "missing {needle}: {}", output.stdout);
    }
    Ok(())
}
integration_test!(test_status_table);

fn test_unknown_vm_rejected() -> Result<()> {
    let (_td, config) = lab_config("")?;
    for verb in ["start", "stop", "console"] {
        let output = run_vlab(&["--config", config.as_str(), verb, "s9"])?;
        output.assert_failure_with(verb, "VM 's9' not found");
    }
    Ok(())
}
integration_test!(test_unknown_vm_rejected);
