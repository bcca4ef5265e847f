//! Stat spoofing.
//!
//! A kstat rule replaces the identifying fields of a stat buffer (inode,
//! device, link count and the three timestamps) so that a modified file
//! reports the metadata of the original it replaced.

use serde::{Deserialize, Serialize};
use veilfs_common::error::{Result, VeilError};
use veilfs_common::types::{Caller, EncodedDev, RawDev, Timestamp};

use crate::engine::VeilEngine;
use crate::logging::veil_info;
use crate::pathname::validate_pathname;
use crate::registry::RegistryRecord;

/// Caller-visible stat buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatBuf {
    /// Inode number.
    pub ino: u64,
    /// Device number in user-visible encoding.
    pub dev: EncodedDev,
    /// File type and permission bits.
    pub mode: u32,
    /// Hard link count.
    pub nlink: u64,
    /// Owner uid.
    pub uid: u32,
    /// Owner gid.
    pub gid: u32,
    /// Size in bytes.
    pub size: i64,
    /// Last access time.
    pub atime: Timestamp,
    /// Last modification time.
    pub mtime: Timestamp,
    /// Last status change time.
    pub ctime: Timestamp,
}

/// Kstat rule as transferred by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KstatRequest {
    /// Inode whose stat is spoofed; 0 until the controller re-associates it.
    pub target_ino: u64,
    /// Path the rule was created for; key for [`VeilEngine::update_sus_kstat`].
    pub target_pathname: String,
    /// Path whose metadata is being impersonated, informational.
    pub spoofed_pathname: String,
    /// Inode reported instead.
    pub spoofed_ino: u64,
    /// Device reported instead, encoded.
    pub spoofed_dev: EncodedDev,
    /// Link count reported instead.
    pub spoofed_nlink: u32,
    /// Access time reported instead.
    pub spoofed_atime: Timestamp,
    /// Modification time reported instead.
    pub spoofed_mtime: Timestamp,
    /// Status change time reported instead.
    pub spoofed_ctime: Timestamp,
}

/// Stored kstat rule with its device already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KstatRule {
    /// Inode whose stat is spoofed.
    pub target_ino: u64,
    /// Path the rule was created for, if any.
    pub target_pathname: Option<String>,
    /// Path whose metadata is impersonated, if given.
    pub spoofed_pathname: Option<String>,
    /// Inode reported instead.
    pub spoofed_ino: u64,
    /// Device reported instead.
    pub spoofed_dev: RawDev,
    /// Link count reported instead.
    pub spoofed_nlink: u32,
    /// Access time reported instead.
    pub spoofed_atime: Timestamp,
    /// Modification time reported instead.
    pub spoofed_mtime: Timestamp,
    /// Status change time reported instead.
    pub spoofed_ctime: Timestamp,
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

impl RegistryRecord for KstatRule {
    const STORE: &'static str = "sus_kstat";

    fn conflicts_with(&self, candidate: &Self) -> bool {
        if candidate.target_ino != 0 {
            self.target_ino == candidate.target_ino
        } else {
            candidate.target_pathname.is_some() && self.target_pathname == candidate.target_pathname
        }
    }

    fn describe(&self) -> String {
        match &self.target_pathname {
            Some(path) if self.target_ino == 0 => format!("target_pathname '{path}'"),
            _ => format!("target_ino '{}'", self.target_ino),
        }
    }
}

impl VeilEngine {
    /// Registers a kstat rule, decoding its device number.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` if the rule has neither inode nor path, or a
    /// path is unusable, and `DuplicateEntry` on a key collision.
    pub fn add_sus_kstat(&self, request: KstatRequest) -> Result<()> {
        let rule = self.kstat_rule(request).map_err(|e| self.rejected(e))?;
        self.register(&self.kstats, rule)
    }

    fn kstat_rule(&self, request: KstatRequest) -> Result<KstatRule> {
        let target_pathname = non_empty(request.target_pathname);
        let spoofed_pathname = non_empty(request.spoofed_pathname);
        if request.target_ino == 0 && target_pathname.is_none() {
            return Err(VeilError::TransferFault {
                store: KstatRule::STORE,
                message: "rule needs a target_ino or a target_pathname".into(),
            });
        }
        for (field, path) in [
            ("target_pathname", &target_pathname),
            ("spoofed_pathname", &spoofed_pathname),
        ] {
            if let Some(path) = path {
                validate_pathname(KstatRule::STORE, field, path)?;
            }
        }
        Ok(KstatRule {
            target_ino: request.target_ino,
            target_pathname,
            spoofed_pathname,
            spoofed_ino: request.spoofed_ino,
            spoofed_dev: self.codec.decode(request.spoofed_dev),
            spoofed_nlink: request.spoofed_nlink,
            spoofed_atime: request.spoofed_atime,
            spoofed_mtime: request.spoofed_mtime,
            spoofed_ctime: request.spoofed_ctime,
        })
    }

    /// Re-associates the rule registered for `request.target_pathname` with
    /// `request.target_ino`. No other field changes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no rule was registered for that path.
    pub fn update_sus_kstat(&self, request: &KstatRequest) -> Result<()> {
        let path = request.target_pathname.as_str();
        let new_ino = request.target_ino;
        let mut old_ino = 0;
        self.kstats
            .update(
                path,
                |rule| !path.is_empty() && rule.target_pathname.as_deref() == Some(path),
                |rule| {
                    old_ino = rule.target_ino;
                    rule.target_ino = new_ino;
                },
            )
            .map_err(|e| self.rejected(e))?;
        veil_info!(
            self.log,
            target_pathname = path,
            old_ino,
            new_ino,
            "kstat target inode updated"
        );
        Ok(())
    }

    /// Overwrites the identifying fields of `stat` if `ino` has a rule.
    ///
    /// Returns whether the buffer was spoofed.
    pub fn spoof_stat(&self, caller: &Caller, ino: u64, stat: &mut StatBuf) -> bool {
        if ino == 0 || !self.is_target(caller) {
            return false;
        }
        self.kstats
            .scan(|rule| {
                if rule.target_ino != ino {
                    return None;
                }
                veil_info!(
                    self.log,
                    target_pathname = rule.target_pathname.as_deref().unwrap_or_default(),
                    uid = %caller.uid,
                    "spoofing kstat"
                );
                stat.ino = rule.spoofed_ino;
                stat.dev = self.codec.encode(rule.spoofed_dev);
                stat.nlink = u64::from(rule.spoofed_nlink);
                stat.atime = rule.spoofed_atime;
                stat.mtime = rule.spoofed_mtime;
                stat.ctime = rule.spoofed_ctime;
                Some(())
            })
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use veilfs_common::config::VeilConfig;

    use super::*;

    const APP: Caller = Caller::new(4321, 10_100);
    const SYSTEM: Caller = Caller::new(1, 0);

    fn engine() -> VeilEngine {
        VeilEngine::new(VeilConfig::default()).unwrap()
    }

    fn request(ino: u64, path: &str) -> KstatRequest {
        KstatRequest {
            target_ino: ino,
            target_pathname: path.into(),
            spoofed_ino: 1000,
            spoofed_dev: EncodedDev::new(0xfd01),
            spoofed_nlink: 1,
            spoofed_atime: Timestamp::new(1_230_768_000, 0),
            spoofed_mtime: Timestamp::new(1_230_768_000, 5),
            spoofed_ctime: Timestamp::new(1_230_768_000, 9),
            ..KstatRequest::default()
        }
    }

    #[test]
    fn spoofs_matching_inode_for_targets_only() {
        let engine = engine();
        engine.add_sus_kstat(request(42, "/system/bin/app_process64")).unwrap();

        let original = StatBuf {
            ino: 42,
            size: 4096,
            ..StatBuf::default()
        };
        let mut spoofed = original;
        assert!(engine.spoof_stat(&APP, 42, &mut spoofed));
        assert_eq!(spoofed.ino, 1000);
        assert_eq!(spoofed.dev, EncodedDev::new(0xfd01));
        assert_eq!(spoofed.nlink, 1);
        assert_eq!(spoofed.mtime, Timestamp::new(1_230_768_000, 5));
        assert_eq!(spoofed.size, 4096);

        let mut untouched = original;
        assert!(!engine.spoof_stat(&SYSTEM, 42, &mut untouched));
        assert_eq!(untouched, original);
    }

    #[test]
    fn duplicate_inode_is_rejected() {
        let engine = engine();
        engine.add_sus_kstat(request(42, "/a")).unwrap();
        assert!(engine.add_sus_kstat(request(42, "/b")).is_err());
    }

    #[test]
    fn pending_rules_are_keyed_by_path() {
        let engine = engine();
        engine.add_sus_kstat(request(0, "/a")).unwrap();
        engine.add_sus_kstat(request(0, "/b")).unwrap();
        assert!(engine.add_sus_kstat(request(0, "/a")).is_err());
        assert_eq!(engine.stats().kstat_rules, 2);
    }

    #[test]
    fn rule_without_key_is_transfer_fault() {
        let err = engine().add_sus_kstat(request(0, "")).unwrap_err();
        assert!(matches!(err, VeilError::TransferFault { .. }));
    }

    #[test]
    fn pending_rule_never_matches() {
        let engine = engine();
        engine.add_sus_kstat(request(0, "/a")).unwrap();
        let mut stat = StatBuf::default();
        assert!(!engine.spoof_stat(&APP, 0, &mut stat));
    }

    #[test]
    fn update_changes_only_target_inode() {
        let engine = engine();
        engine.add_sus_kstat(request(42, "/vendor/bin/x")).unwrap();
        let before = engine.kstats.snapshot();

        let mut update = KstatRequest::default();
        update.target_pathname = "/vendor/bin/x".into();
        update.target_ino = 43;
        engine.update_sus_kstat(&update).unwrap();

        let after = engine.kstats.snapshot();
        assert_eq!(after[0].target_ino, 43);
        assert_eq!(
            KstatRule {
                target_ino: 42,
                ..after[0].clone()
            },
            before[0]
        );

        let mut stat = StatBuf::default();
        assert!(!engine.spoof_stat(&APP, 42, &mut stat));
        assert!(engine.spoof_stat(&APP, 43, &mut stat));
    }

    #[test]
    fn update_unknown_path_is_not_found() {
        let engine = engine();
        let update = KstatRequest {
            target_pathname: "/nope".into(),
            target_ino: 1,
            ..KstatRequest::default()
        };
        let err = engine.update_sus_kstat(&update).unwrap_err();
        assert!(matches!(err, VeilError::NotFound { .. }));
    }
}
