//! Lab configuration file parsing.
//!
//! The file is JSON by default; a `.toml` extension selects TOML. Both carry
//! the same keys:
//!
//! ```json
//! { "debug": false, "qcow_base": "base.qcow2", "xml_base": "base.xml", "number_of_servers": 3 }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::{eyre::Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Default location of the configuration file, relative to the current directory
pub const DEFAULT_CONFIG_PATH: &str = "config/vlab.json";
/// Fewest backend servers a lab may have
pub const MIN_SERVERS: u32 = 2;
/// Most backend servers a lab may have
pub const MAX_SERVERS: u32 = 5;

/// Reasons a parsed configuration is rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `number_of_servers` below [`MIN_SERVERS`]
    #[error("the number of servers must be at least {MIN_SERVERS} (got {0})")]
    TooFewServers(u32),
    /// `number_of_servers` above [`MAX_SERVERS`]
    #[error("the maximum number of servers to create is {MAX_SERVERS} (got {0})")]
    TooManyServers(u32),
    /// A required base file name is empty
    #[error("`{0}` must name a base file")]
    MissingBase(&'static str),
}

/// Lab configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabConfig {
    /// Log at debug level unless RUST_LOG says otherwise
    #[serde(default)]
    pub debug: bool,

    /// Base qcow2 image that every device disk overlays
    #[serde(default)]
    pub qcow_base: String,

    /// Base libvirt domain XML copied for every device
    #[serde(default)]
    pub xml_base: String,

    /// Number of backend servers (`s1`..`sN`)
    #[serde(default = "default_number_of_servers")]
    pub number_of_servers: u32,

    /// Run privileged tools through sudo
    #[serde(default = "default_sudo")]
    pub sudo: bool,

    /// libvirt connection URI
    #[serde(default)]
    pub connect: Option<String>,

    /// Directory holding base and generated files
    #[serde(default)]
    pub workdir: Option<Utf8PathBuf>,
}

fn default_number_of_servers() -> u32 {
    MIN_SERVERS
}

fn default_sudo() -> bool {
    true
}

impl LabConfig {
    /// Read, parse and validate the configuration at `path`.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                color_eyre::eyre::bail!("The file {path} does not exist");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file: {path}"))
            }
        };

        let config = Self::parse(path, &content)?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    fn parse(path: &Utf8Path, content: &str) -> Result<Self> {
        if path.extension() == Some("toml") {
            toml::from_str(content)
                .with_context(|| format!("The file {path} does not contain valid TOML"))
        } else {
            serde_json::from_str(content)
                .with_context(|| format!("The file {path} does not contain valid JSON"))
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.number_of_servers < MIN_SERVERS {
            return Err(ConfigError::TooFewServers(self.number_of_servers));
        }
        if self.number_of_servers > MAX_SERVERS {
            return Err(ConfigError::TooManyServers(self.number_of_servers));
        }
        if self.qcow_base.trim().is_empty() {
            return Err(ConfigError::MissingBase("qcow_base"));
        }
        if self.xml_base.trim().is_empty() {
            return Err(ConfigError::MissingBase("xml_base"));
        }
        Ok(())
    }

    /// Directory the lab works in: `workdir` if set, else the current directory.
    pub fn resolve_workdir(&self) -> Result<Utf8PathBuf> {
        if let Some(dir) = &self.workdir {
            return Ok(dir.clone());
        }
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Utf8PathBuf::from_path_buf(cwd)
            .map_err(|p| color_eyre::eyre::eyre!("Path is not valid UTF-8: {}", p.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (tempfile::TempDir, Utf8PathBuf) {
        let td = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(td.path().join(name)).unwrap();
        fs::write(&path, content).unwrap();
        (td, path)
    }

    #[test]
    fn test_parse_minimal_json() {
        let (_td, path) = write_config(
            "lab.json",
            r#"{"qcow_base": "base.qcow2", "xml_base": "base.xml"}"#,
        );
        let config = LabConfig::load(&path).unwrap();
        assert!(!config.debug);
        assert_eq!(config.number_of_servers, 2);
        assert!(config.sudo);
        assert_eq!(config.connect, None);
        assert_eq!(config.workdir, None);
    }

    #[test]
    fn test_parse_full_json() {
        let (_td, path) = write_config(
            "lab.json",
            r#"{
                "debug": true,
                "qcow_base": "cdps-vm-base-pc1.qcow2",
                "xml_base": "plantilla-vm-pc1.xml",
                "number_of_servers": 5,
                "sudo": false,
                "connect": "qemu:///system",
                "workdir": "/srv/lab"
            }"#,
        );
        let config = LabConfig::load(&path).unwrap();
        assert!(config.debug);
        assert_eq!(config.qcow_base, "cdps-vm-base-pc1.qcow2");
        assert_eq!(config.xml_base, "plantilla-vm-pc1.xml");
        assert_eq!(config.number_of_servers, 5);
        assert!(!config.sudo);
        assert_eq!(config.connect.as_deref(), Some("qemu:///system"));
        assert_eq!(config.resolve_workdir().unwrap(), "/srv/lab");
    }

    #[test]
    fn test_parse_toml() {
        let (_td, path) = write_config(
            "lab.toml",
            indoc::indoc! {r#"
                qcow_base = "base.qcow2"
                xml_base = "base.xml"
                number_of_servers = 3
            "#},
        );
        let config = LabConfig::load(&path).unwrap();
        assert_eq!(config.number_of_servers, 3);
    }

    #[test]
    fn test_server_bounds() {
        for (n, expected) in [
            (1, Err(ConfigError::TooFewServers(1))),
            (2, Ok(())),
            (5, Ok(())),
            (6, Err(ConfigError::TooManyServers(6))),
        ] {
            let config = LabConfig {
                debug: false,
                qcow_base: "b.qcow2".into(),
                xml_base: "b.xml".into(),
                number_of_servers: n,
                sudo: true,
                connect: None,
                workdir: None,
            };
            assert_eq!(config.validate(), expected, "servers={n}");
        }
    }

    #[test]
    fn test_missing_base() {
        let (_td, path) = write_config("lab.json", r#"{"qcow_base": " ", "xml_base": "b.xml"}"#);
        let err = LabConfig::load(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingBase("qcow_base"))
        );
    }

    #[test]
    fn test_missing_and_malformed_file() {
        let td = tempfile::tempdir().unwrap();
        let missing = Utf8PathBuf::try_from(td.path().join("nope.json")).unwrap();
        let err = LabConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let (_td, path) = write_config("lab.json", "{ not json");
        let err = LabConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("valid JSON"));
    }
}
