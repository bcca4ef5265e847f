//! Forced unmounting of registered mount points.

use serde::{Deserialize, Serialize};
use veilfs_common::constants::OVERLAY_FS_TYPE;
use veilfs_common::error::Result;
use veilfs_common::types::{Caller, MountMode};

use crate::engine::VeilEngine;
use crate::logging::{veil_error, veil_info};
use crate::pathname::validate_pathname;
use crate::registry::RegistryRecord;

/// A mount point removed from a target's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryUmount {
    /// Mount point to remove.
    pub target_pathname: String,
    /// How to unmount it.
    pub mnt_mode: MountMode,
}

impl TryUmount {
    /// Creates a forced-unmount target.
    #[must_use]
    pub fn new(target_pathname: impl Into<String>, mnt_mode: MountMode) -> Self {
        Self {
            target_pathname: target_pathname.into(),
            mnt_mode,
        }
    }
}

impl RegistryRecord for TryUmount {
    const STORE: &'static str = "try_umount";

    fn conflicts_with(&self, candidate: &Self) -> bool {
        self.target_pathname == candidate.target_pathname
    }

    fn describe(&self) -> String {
        format!(
            "target_pathname '{}' mnt_mode '{}'",
            self.target_pathname, self.mnt_mode
        )
    }
}

/// Outcome of one [`VeilEngine::try_umount`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UmountReport {
    /// Mount points that were unmounted.
    pub unmounted: Vec<String>,
    /// Mount points left alone.
    pub skipped: Vec<String>,
    /// Mount points the kernel refused to unmount.
    pub failed: Vec<String>,
}

impl VeilEngine {
    /// Registers a mount point for forced unmounting.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` for an unusable path and `DuplicateEntry` if
    /// the path is already registered.
    pub fn add_try_umount(&self, record: TryUmount) -> Result<()> {
        validate_pathname(TryUmount::STORE, "target_pathname", &record.target_pathname)
            .map_err(|e| self.rejected(e))?;
        self.register(&self.try_umounts, record)
    }

    /// Unmounts every registered target from `caller`'s mount namespace.
    ///
    /// Targets are resolved and unmounted in the caller's namespace.
    /// Nothing is touched when the caller shares the initial namespace.
    /// Failures are logged and reported, never returned.
    pub fn try_umount(&self, caller: &Caller) -> UmountReport {
        let mut report = UmountReport::default();
        let targets = self.try_umounts.snapshot();
        if self.host.is_initial_mount_namespace(caller.pid) {
            veil_info!(
                self.log,
                pid = %caller.pid,
                "ignoring process in the initial mount namespace"
            );
            report.skipped = targets.into_iter().map(|t| t.target_pathname).collect();
            return report;
        }

        for target in targets {
            let path = target.target_pathname;
            let mount = match self.host.resolve_mount(caller.pid, &path) {
                Ok(mount) => mount,
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "umount target does not resolve");
                    report.skipped.push(path);
                    continue;
                }
            };
            if !mount.is_mount_root {
                report.skipped.push(path);
                continue;
            }
            if target.mnt_mode == MountMode::CheckedDetach && mount.fs_type != OVERLAY_FS_TYPE {
                report.skipped.push(path);
                continue;
            }
            match self.host.unmount(caller.pid, &path, target.mnt_mode) {
                Ok(()) => {
                    veil_info!(self.log, path = %path, mode = %target.mnt_mode, "unmounted");
                    report.unmounted.push(path);
                }
                Err(e) => {
                    veil_error!(self.log, path = %path, error = %e, "umount failed");
                    report.failed.push(path);
                }
            }
        }
        report
    }
}
