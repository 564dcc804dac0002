//! YAML configuration
//!
//! Four files drive a run:
//! - device profile: what the device supports (`features.auxsupport`)
//! - test config: artifacts to push and the menu launch command
//! - test setup: per-test streams, artifacts and shell commands
//! - rack config: how to reach the device
//!
//! Profile, test config and test setup may nest their content under the
//! `rmfaudiocapture` module key; a file without that key is read from the
//! document root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::capture::protocol::SUITE_NAME;
use crate::error::{Result, RmfAudioError};
use crate::remote::ConnectionParams;

/// Top-level key of this module in shared YAML files
pub const MODULE_KEY: &str = "rmfaudiocapture";

/// Load a YAML file, descending into the module key when present
pub fn load_module_section<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| RmfAudioError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_module_section(&text).map_err(|e| RmfAudioError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parse YAML text, descending into the module key when present
pub fn parse_module_section<T: DeserializeOwned>(text: &str) -> Result<T> {
    let document: serde_yaml::Value = serde_yaml::from_str(text)?;
    let section = match document.get(MODULE_KEY) {
        Some(section) => section.clone(),
        None => document,
    };
    Ok(serde_yaml::from_value(section)?)
}

// ============================================================================
// Device profile
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFeatures {
    #[serde(default)]
    pub auxsupport: bool,
}

/// Device capability profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    #[serde(default)]
    pub features: DeviceFeatures,
}

impl DeviceProfile {
    pub fn with_aux_support(supported: bool) -> Self {
        Self {
            features: DeviceFeatures {
                auxsupport: supported,
            },
        }
    }

    pub fn aux_supported(&self) -> bool {
        self.features.auxsupport
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_module_section(path)
    }
}

// ============================================================================
// Test config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSection {
    /// Host paths pushed to the target workspace
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
    /// Menu launch command, relative to the target workspace
    pub execute: String,
    #[serde(default = "default_suite")]
    pub suite: String,
}

fn default_suite() -> String {
    SUITE_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub test: TestSection,
}

impl TestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: TestConfig = load_module_section(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for artifact in &mut config.test.artifacts {
            *artifact = resolve_relative(base, artifact);
        }
        Ok(config)
    }
}

// ============================================================================
// Test setup
// ============================================================================

/// A file or directory to stage, with an optional SHA-256 for files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRef {
    Path(PathBuf),
    Checked { path: PathBuf, sha256: Option<String> },
}

impl AssetRef {
    pub fn path(&self) -> &Path {
        match self {
            AssetRef::Path(path) => path,
            AssetRef::Checked { path, .. } => path,
        }
    }

    pub fn sha256(&self) -> Option<&str> {
        match self {
            AssetRef::Path(_) => None,
            AssetRef::Checked { sha256, .. } => sha256.as_deref(),
        }
    }

    fn resolved(&self, base: &Path) -> AssetRef {
        match self {
            AssetRef::Path(path) => AssetRef::Path(resolve_relative(base, path)),
            AssetRef::Checked { path, sha256 } => AssetRef::Checked {
                path: resolve_relative(base, path),
                sha256: sha256.clone(),
            },
        }
    }
}

/// Assets and commands of one test case
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAssets {
    #[serde(default)]
    pub artifacts: Vec<AssetRef>,
    #[serde(default)]
    pub streams: Vec<AssetRef>,
    /// Prerequisite shell commands run before the menu starts
    #[serde(default)]
    pub execute: Vec<String>,
    /// Shell commands written when the console opens
    #[serde(default)]
    pub postcmd: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssets {
    #[serde(default)]
    pub device: BTreeMap<String, TestAssets>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSetup {
    #[serde(default)]
    pub assets: DeviceAssets,
}

impl TestSetup {
    pub fn load(path: &Path) -> Result<Self> {
        let mut setup: TestSetup = load_module_section(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for assets in setup.assets.device.values_mut() {
            for asset in assets.artifacts.iter_mut().chain(assets.streams.iter_mut()) {
                *asset = asset.resolved(base);
            }
        }
        Ok(setup)
    }

    /// Assets of a test; a test without an entry has none
    pub fn for_test(&self, name: &str) -> TestAssets {
        self.assets.device.get(name).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Rack config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutConfig {
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_target_directory")]
    pub target_directory: String,
    /// Device profile file
    pub profile: PathBuf,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_target_directory() -> String {
    "/tmp".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackConfig {
    pub dut: DutConfig,
}

impl RackConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut rack: RackConfig = load_module_section(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        rack.dut.profile = resolve_relative(base, &rack.dut.profile);
        Ok(rack)
    }

    pub fn connection(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.dut.address.clone(),
            port: self.dut.port,
            username: self.dut.username.clone(),
            password: self.dut.password.clone(),
        }
    }

    /// Directory on the device where test artifacts are unpacked
    pub fn target_workspace(&self) -> String {
        join_device_path(&self.dut.target_directory, MODULE_KEY)
    }

    pub fn load_profile(&self) -> Result<DeviceProfile> {
        DeviceProfile::load(&self.dut.profile)
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Join device path segments with exactly one `/` between them
pub fn join_device_path(base: &str, tail: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), tail.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_profile_under_module_key() {
        let profile: DeviceProfile =
            parse_module_section("rmfaudiocapture:\n  features:\n    auxsupport: true\n").unwrap();
        assert!(profile.aux_supported());

        let bare: DeviceProfile = parse_module_section("features: {}\n").unwrap();
        assert!(!bare.aux_supported());
    }

    #[test]
    fn test_setup_streams_with_and_without_checksum() {
        let yaml = r#"
rmfaudiocapture:
  assets:
    device:
      test01_primaryDataCapture:
        streams:
          - streams/tone.wav
          - path: streams/chirp.wav
            sha256: abc123
        execute:
          - "echo prepare"
"#;
        let setup: TestSetup = parse_module_section(yaml).unwrap();
        let assets = setup.for_test("test01_primaryDataCapture");
        assert_eq!(assets.streams.len(), 2);
        assert_eq!(assets.streams[0].sha256(), None);
        assert_eq!(assets.streams[1].sha256(), Some("abc123"));
        assert_eq!(assets.execute, vec!["echo prepare".to_string()]);
        assert!(setup.for_test("test99").streams.is_empty());
    }

    #[test]
    fn test_rack_paths_resolve_relative_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rack.yml");
        std::fs::write(
            &path,
            "dut:\n  address: 10.0.0.5\n  username: root\n  target_directory: /tmp/\n  profile: profiles/device.yml\n",
        )
        .unwrap();

        let rack = RackConfig::load(&path).unwrap();
        assert_eq!(rack.dut.port, 22);
        assert_eq!(rack.dut.profile, dir.path().join("profiles/device.yml"));
        assert_eq!(rack.target_workspace(), "/tmp/rmfaudiocapture");
        assert_eq!(rack.connection().host, "10.0.0.5");
    }

    #[test]
    fn test_test_config_default_suite() {
        let config: TestConfig = parse_module_section("test:\n  execute: run.sh\n").unwrap();
        assert_eq!(config.test.suite, "L3 rmfAudioCapture");
        assert!(config.test.artifacts.is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = DeviceProfile::load(Path::new("/nonexistent/profile.yml")).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
