//! Engine configuration model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, VeilError};
use crate::types::DeviceEncoding;

/// Root configuration for a veilfs engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    /// Hard cap on registered sus mounts.
    pub max_sus_mounts: usize,
    /// Bound on hidden mount ids recorded per process.
    pub max_hidden_mount_ids: usize,
    /// Whether diagnostic logging starts enabled.
    pub log_enabled: bool,
    /// Apply the target-identity gate to mount visibility queries.
    pub gate_mount_visibility: bool,
    /// Apply the target-identity gate to memory-map spoofing.
    pub gate_maps: bool,
    /// Lowest uid selected by the default uid-threshold policy.
    pub target_uid_min: u32,
    /// Device number encoding used at the registration and stat boundaries.
    pub device_encoding: DeviceEncoding,
}

impl Default for VeilConfig {
    fn default() -> Self {
        Self {
            max_sus_mounts: constants::DEFAULT_MAX_SUS_MOUNTS,
            max_hidden_mount_ids: constants::DEFAULT_MAX_HIDDEN_MOUNT_IDS,
            log_enabled: true,
            gate_mount_visibility: false,
            gate_maps: false,
            target_uid_min: constants::FIRST_APPLICATION_UID,
            device_encoding: DeviceEncoding::native(),
        }
    }
}

impl VeilConfig {
    /// Parses a configuration from JSON, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a limit is zero.
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VeilError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_sus_mounts == 0 {
            return Err(VeilError::Config {
                message: "max_sus_mounts must be at least 1".into(),
            });
        }
        if self.max_hidden_mount_ids == 0 {
            return Err(VeilError::Config {
                message: "max_hidden_mount_ids must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = VeilConfig::from_json("{}").unwrap();
        assert_eq!(config, VeilConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config =
            VeilConfig::from_json(r#"{"max_sus_mounts": 8, "device_encoding": "old"}"#).unwrap();
        assert_eq!(config.max_sus_mounts, 8);
        assert_eq!(config.device_encoding, DeviceEncoding::Old);
        assert!(config.log_enabled);
    }

    #[test]
    fn zero_cap_is_rejected() {
        let err = VeilConfig::from_json(r#"{"max_sus_mounts": 0}"#).unwrap_err();
        assert!(err.to_string().contains("max_sus_mounts"), "got: {err}");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("veilfs.json");
        std::fs::write(&path, r#"{"gate_maps": true}"#).expect("write");
        let config = VeilConfig::load(&path).expect("load");
        assert!(config.gate_maps);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = VeilConfig::load(Path::new("/nonexistent/veilfs.json")).unwrap_err();
        assert!(matches!(err, VeilError::Io { .. }));
    }
}
