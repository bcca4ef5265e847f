//! Mount-id renumbering.
//!
//! Hiding a mount leaves a hole in the sequence of mount ids a process can
//! observe. When a process is recorded, the ids of every sus mount in its
//! namespace are captured once; later queries shift each observed id down by
//! the number of hidden ids below it, closing the holes.

use veilfs_common::error::{Result, VeilError};
use veilfs_common::types::{Caller, Pid};

use crate::engine::VeilEngine;
use crate::logging::{veil_error, veil_info};
use crate::pathname::escape_path;
use crate::registry::RegistryRecord;

/// Hidden mount ids captured for one process, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountIdRecord {
    /// Process the ids were captured for.
    pub pid: Pid,
    hidden: Vec<i32>,
}

impl MountIdRecord {
    /// Creates a record, sorting `hidden`.
    #[must_use]
    pub fn new(pid: Pid, mut hidden: Vec<i32>) -> Self {
        hidden.sort_unstable();
        Self { pid, hidden }
    }

    /// Hidden ids in ascending order.
    #[must_use]
    pub fn hidden(&self) -> &[i32] {
        &self.hidden
    }

    /// Shifts `id` down by the number of hidden ids smaller than it.
    #[must_use]
    pub fn remap(&self, id: i32) -> i32 {
        let below = self.hidden.partition_point(|&h| h < id);
        // bounded by max_hidden_mount_ids
        id - i32::try_from(below).unwrap_or(i32::MAX)
    }
}

impl RegistryRecord for MountIdRecord {
    const STORE: &'static str = "mount_id_recorder";

    fn conflicts_with(&self, candidate: &Self) -> bool {
        self.pid == candidate.pid
    }

    fn describe(&self) -> String {
        format!("pid '{}'", self.pid)
    }
}

impl VeilEngine {
    /// Captures the ids of `caller`'s sus mounts. Recording the same process
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read, or
    /// `CapacityExceeded` when more mounts are hidden than a record holds.
    /// The process stays unrecorded in both cases.
    pub fn record_mount_ids(&self, caller: &Caller) -> Result<()> {
        let pid = caller.pid;
        if self.mount_ids.any(|record| record.pid == pid) {
            return Ok(());
        }

        let table = self.host.mount_table(pid).map_err(|e| {
            veil_error!(self.log, pid = %pid, error = %e, "cannot enumerate mounts");
            VeilError::from(e)
        })?;
        let hidden: Vec<i32> = self.sus_mounts.with_records(|sus_mounts| {
            table
                .iter()
                .filter(|entry| {
                    let display = escape_path(&entry.mount_point);
                    sus_mounts.iter().any(|m| m.target_pathname == *display)
                })
                .map(|entry| {
                    veil_info!(
                        self.log,
                        pid = %pid,
                        mount_id = entry.mount_id,
                        target_pathname = %entry.mount_point,
                        "found hidden mount id"
                    );
                    entry.mount_id
                })
                .collect()
        });

        let limit = self.config.max_hidden_mount_ids;
        if hidden.len() > limit {
            return Err(self.rejected(VeilError::CapacityExceeded { pid, limit }));
        }

        let count = hidden.len();
        match self.mount_ids.insert(MountIdRecord::new(pid, hidden)) {
            Ok(()) => {
                veil_info!(self.log, pid = %pid, count, "recorded mount ids");
                Ok(())
            }
            // recorded concurrently by another thread of the same process
            Err(VeilError::DuplicateEntry { .. }) => Ok(()),
            Err(e) => Err(self.rejected(e)),
        }
    }

    /// Returns the id `caller` should observe for mount `id`.
    #[must_use]
    pub fn remap_mount_id(&self, caller: &Caller, id: i32) -> i32 {
        self.mount_ids
            .scan(|record| (record.pid == caller.pid).then(|| record.remap(id)))
            .unwrap_or(id)
    }

    /// Drops `caller`'s record. Returns whether one existed.
    pub fn remove_mount_ids(&self, caller: &Caller) -> bool {
        let removed = self
            .mount_ids
            .remove_first(|record| record.pid == caller.pid)
            .is_some();
        if removed {
            veil_info!(self.log, pid = %caller.pid, "removed mount id record");
        }
        removed
    }

    /// Returns the hidden ids recorded for `pid`.
    #[must_use]
    pub fn hidden_mount_ids(&self, pid: Pid) -> Option<Vec<i32>> {
        self.mount_ids
            .scan(|record| (record.pid == pid).then(|| record.hidden.clone()))
    }
}
