//! Path visibility.
//!
//! A sus path is hidden from target callers: lookups fail as if the entry
//! did not exist and directory listings skip its inode.

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use veilfs_common::error::Result;
use veilfs_common::types::{Caller, SyscallFamily};

use crate::engine::VeilEngine;
use crate::errno::change_error_code;
use crate::logging::veil_info;
use crate::pathname::{escape_path, validate_pathname};
use crate::registry::RegistryRecord;

/// A path hidden from target callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SusPath {
    /// Canonical path to hide, in escaped form.
    pub target_pathname: String,
    /// Inode of the path, used by directory enumeration.
    #[serde(default)]
    pub target_ino: u64,
}

impl SusPath {
    /// Creates a sus path record.
    #[must_use]
    pub fn new(target_pathname: impl Into<String>, target_ino: u64) -> Self {
        Self {
            target_pathname: target_pathname.into(),
            target_ino,
        }
    }
}

impl RegistryRecord for SusPath {
    const STORE: &'static str = "sus_path";

    fn conflicts_with(&self, candidate: &Self) -> bool {
        self.target_pathname == candidate.target_pathname
    }

    fn describe(&self) -> String {
        format!("target_pathname '{}'", self.target_pathname)
    }
}

impl VeilEngine {
    /// Registers a path to hide.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` for an unusable path and `DuplicateEntry` if
    /// the path is already registered.
    pub fn add_sus_path(&self, record: SusPath) -> Result<()> {
        validate_pathname(SusPath::STORE, "target_pathname", &record.target_pathname)
            .map_err(|e| self.rejected(e))?;
        self.register(&self.sus_paths, record)
    }

    /// Returns whether `path` must be hidden from `caller`.
    ///
    /// Non-target callers return immediately without touching the store.
    pub fn is_sus_path(&self, caller: &Caller, path: &str) -> bool {
        if !self.is_target(caller) {
            return false;
        }
        let path = escape_path(path);
        self.sus_paths
            .scan(|record| {
                (record.target_pathname == *path).then(|| {
                    veil_info!(
                        self.log,
                        target_pathname = %record.target_pathname,
                        target_ino = record.target_ino,
                        uid = %caller.uid,
                        "hiding path"
                    );
                })
            })
            .is_some()
    }

    /// Like [`is_sus_path`](Self::is_sus_path), additionally reporting the
    /// error code the hidden path should fail with for `family`.
    ///
    /// `on_errno` is only called when the path is hidden and its prefix
    /// class rewrites the error.
    pub fn is_sus_path_with_errno<F>(
        &self,
        caller: &Caller,
        path: &str,
        family: SyscallFamily,
        on_errno: F,
    ) -> bool
    where
        F: FnOnce(Errno),
    {
        if !self.is_sus_path(caller, path) {
            return false;
        }
        if let Some(errno) = change_error_code(path, family) {
            on_errno(errno);
        }
        true
    }

    /// Returns whether a directory entry with inode `ino` must be skipped.
    pub fn is_sus_inode(&self, caller: &Caller, ino: u64) -> bool {
        if ino == 0 || !self.is_target(caller) {
            return false;
        }
        self.sus_paths
            .scan(|record| {
                (record.target_ino == ino).then(|| {
                    veil_info!(
                        self.log,
                        target_pathname = %record.target_pathname,
                        target_ino = ino,
                        uid = %caller.uid,
                        "hiding inode"
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

    fn engine() -> VeilEngine {
        VeilEngine::new(VeilConfig::default()).unwrap()
    }

    #[test]
    fn hidden_only_from_targets() {
        let engine = engine();
        engine.add_sus_path(SusPath::new("/data/adb/ksu", 77)).unwrap();
        assert!(engine.is_sus_path(&APP, "/data/adb/ksu"));
        assert!(!engine.is_sus_path(&SYSTEM, "/data/adb/ksu"));
        assert!(!engine.is_sus_path(&APP, "/data/adb/ksud"));
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let engine = engine();
        engine.add_sus_path(SusPath::new("/data/adb", 1)).unwrap();
        let err = engine.add_sus_path(SusPath::new("/data/adb", 2)).unwrap_err();
        assert!(matches!(err, VeilError::DuplicateEntry { .. }));
        assert_eq!(engine.stats().sus_paths, 1);
    }

    #[test]
    fn inode_lookup() {
        let engine = engine();
        engine.add_sus_path(SusPath::new("/data/adb/modules", 555)).unwrap();
        assert!(engine.is_sus_inode(&APP, 555));
        assert!(!engine.is_sus_inode(&APP, 556));
        assert!(!engine.is_sus_inode(&SYSTEM, 555));
    }

    #[test]
    fn zero_inode_never_matches() {
        let engine = engine();
        engine.add_sus_path(SusPath::new("/debug_ramdisk", 0)).unwrap();
        assert!(!engine.is_sus_inode(&APP, 0));
    }

    #[test]
    fn paths_with_spaces_compare_escaped() {
        let engine = engine();
        engine
            .add_sus_path(SusPath::new("/data/local/tmp/a\\040b", 0))
            .unwrap();
        assert!(engine.is_sus_path(&APP, "/data/local/tmp/a b"));
    }

    #[test]
    fn errno_callback_reports_rewritten_code() {
        let engine = engine();
        engine.add_sus_path(SusPath::new("/system/bin/su", 3)).unwrap();
        let mut seen = None;
        let hidden = engine.is_sus_path_with_errno(
            &APP,
            "/system/bin/su",
            SyscallFamily::Mkdirat,
            |errno| seen = Some(errno),
        );
        assert!(hidden);
        assert_eq!(seen, Some(Errno::EROFS));
    }

    #[test]
    fn errno_callback_skipped_for_visible_path() {
        let engine = engine();
        let mut called = false;
        let hidden =
            engine.is_sus_path_with_errno(&APP, "/system/bin/sh", SyscallFamily::Mknod, |_| {
                called = true;
            });
        assert!(!hidden);
        assert!(!called);
    }

    #[test]
    fn empty_path_is_transfer_fault() {
        let err = engine().add_sus_path(SusPath::new("", 0)).unwrap_err();
        assert!(matches!(err, VeilError::TransferFault { .. }));
    }
}
