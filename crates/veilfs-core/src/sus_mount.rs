//! Mount visibility.

use serde::{Deserialize, Serialize};
use veilfs_common::error::Result;
use veilfs_common::types::Caller;

use crate::engine::VeilEngine;
use crate::logging::veil_info;
use crate::pathname::{escape_path, validate_pathname};
use crate::registry::RegistryRecord;

/// A mount point hidden from mount listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SusMount {
    /// Mount point as displayed relative to the process root, escaped.
    pub target_pathname: String,
}

impl SusMount {
    /// Creates a sus mount record.
    #[must_use]
    pub fn new(target_pathname: impl Into<String>) -> Self {
        Self {
            target_pathname: target_pathname.into(),
        }
    }
}

impl RegistryRecord for SusMount {
    const STORE: &'static str = "sus_mount";

    fn conflicts_with(&self, candidate: &Self) -> bool {
        self.target_pathname == candidate.target_pathname
    }

    fn describe(&self) -> String {
        format!("target_pathname '{}'", self.target_pathname)
    }
}

impl VeilEngine {
    /// Registers a mount point to hide.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` for an unusable path, `DuplicateEntry` if the
    /// path is already registered, and `StoreFull` once the configured cap
    /// is reached.
    pub fn add_sus_mount(&self, record: SusMount) -> Result<()> {
        validate_pathname(SusMount::STORE, "target_pathname", &record.target_pathname)
            .map_err(|e| self.rejected(e))?;
        self.register(&self.sus_mounts, record)
    }

    /// Returns whether the mount displayed at `mount_point` must be left out
    /// of `caller`'s mount listings.
    ///
    /// The identity gate only applies when `gate_mount_visibility` is set.
    pub fn is_sus_mount(&self, caller: &Caller, mount_point: &str) -> bool {
        if self.config.gate_mount_visibility && !self.is_target(caller) {
            return false;
        }
        let mount_point = escape_path(mount_point);
        self.sus_mounts
            .scan(|record| {
                (record.target_pathname == *mount_point).then(|| {
                    veil_info!(
                        self.log,
                        target_pathname = %record.target_pathname,
                        uid = %caller.uid,
                        "hiding mount"
                    );
                })
            })
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use veilfs_common::config::VeilConfig;
    use veilfs_common::error::VeilError;

    use super::*;

    const APP: Caller = Caller::new(4321, 10_100);
    const SYSTEM: Caller = Caller::new(1, 0);

    #[test]
    fn ungated_by_default() {
        let engine = VeilEngine::new(VeilConfig::default()).unwrap();
        engine.add_sus_mount(SusMount::new("/system/bin")).unwrap();
        assert!(engine.is_sus_mount(&APP, "/system/bin"));
        assert!(engine.is_sus_mount(&SYSTEM, "/system/bin"));
        assert!(!engine.is_sus_mount(&APP, "/system"));
    }

    #[test]
    fn gate_can_be_enabled() {
        let config = VeilConfig {
            gate_mount_visibility: true,
            ..VeilConfig::default()
        };
        let engine = VeilEngine::new(config).unwrap();
        engine.add_sus_mount(SusMount::new("/system/bin")).unwrap();
        assert!(engine.is_sus_mount(&APP, "/system/bin"));
        assert!(!engine.is_sus_mount(&SYSTEM, "/system/bin"));
    }

    #[test]
    fn cap_is_enforced() {
        let config = VeilConfig {
            max_sus_mounts: 3,
            ..VeilConfig::default()
        };
        let engine = VeilEngine::new(config).unwrap();
        for i in 0..3 {
            engine.add_sus_mount(SusMount::new(format!("/mnt/m{i}"))).unwrap();
        }
        let err = engine.add_sus_mount(SusMount::new("/mnt/m3")).unwrap_err();
        assert!(matches!(err, VeilError::StoreFull { limit: 3, .. }));
        assert_eq!(engine.stats().sus_mounts, 3);
    }
}
