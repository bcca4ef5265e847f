//! Linux host backed by procfs and `umount2(2)`.

use std::path::{Path, PathBuf};

use veilfs_common::types::{MountMode, Pid};

use super::{HostEnvironment, HostError, MountEntry, MountPoint};
use crate::pathname::unescape_path;

/// Default procfs mount point.
pub const PROC_ROOT: &str = "/proc";

/// Host that reads mount tables from procfs.
///
/// Paths are resolved through `/proc/<pid>/root` against that process's own
/// mount table. `umount2` only acts in this process's mount namespace, so
/// unmounting for a process in any other namespace is refused.
///
/// The procfs root is configurable so that mount tables can be served from
/// a fixture directory.
#[derive(Debug, Clone)]
pub struct LinuxHost {
    proc_root: PathBuf,
}

impl LinuxHost {
    /// Creates a host reading the real `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_proc_root(PROC_ROOT)
    }

    /// Creates a host reading procfs from `proc_root`.
    #[must_use]
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn read_mountinfo(&self, who: &str) -> Result<Vec<MountEntry>, HostError> {
        let path = self.proc_root.join(who).join("mountinfo");
        let content = std::fs::read_to_string(&path).map_err(|e| HostError::Read {
            path: path.clone(),
            source: e,
        })?;
        parse_mountinfo(&content)
    }

    fn mount_namespace(&self, who: &str) -> Option<(u64, u64)> {
        namespace_identity(&self.proc_root.join(who).join("ns/mnt"))
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEnvironment for LinuxHost {
    fn mount_table(&self, pid: Pid) -> Result<Vec<MountEntry>, HostError> {
        self.read_mountinfo(&pid.to_string())
    }

    fn resolve_mount(&self, pid: Pid, path: &str) -> Result<MountPoint, HostError> {
        let through_root = self
            .proc_root
            .join(pid.to_string())
            .join("root")
            .join(path.trim_start_matches('/'));
        let _ = std::fs::symlink_metadata(&through_root).map_err(|e| HostError::Resolve {
            path: path.to_owned(),
            source: e,
        })?;
        let table = self.read_mountinfo(&pid.to_string())?;
        Ok(containing_mount(&table, path).map_or_else(
            || MountPoint {
                is_mount_root: false,
                fs_type: String::new(),
            },
            |entry| MountPoint {
                is_mount_root: entry.mount_point == path,
                fs_type: entry.fs_type.clone(),
            },
        ))
    }

    fn is_initial_mount_namespace(&self, pid: Pid) -> bool {
        match (self.mount_namespace(&pid.to_string()), self.mount_namespace("1")) {
            (Some(own), Some(init)) => own == init,
            _ => {
                tracing::debug!(pid = %pid, "mount namespace identity unavailable");
                true
            }
        }
    }

    fn unmount(&self, pid: Pid, path: &str, mode: MountMode) -> Result<(), HostError> {
        let target = self.mount_namespace(&pid.to_string());
        if target.is_none() || target != self.mount_namespace("self") {
            return Err(HostError::ForeignNamespace { pid });
        }
        unmount_path(path, mode)
    }
}

/// Parses the contents of a `/proc/<pid>/mountinfo` file.
///
/// # Errors
///
/// Returns `HostError::Parse` for a line without an id, a mount point, or a
/// filesystem type after the `-` separator.
pub fn parse_mountinfo(content: &str) -> Result<Vec<MountEntry>, HostError> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_mountinfo_line)
        .collect()
}

fn parse_mountinfo_line(line: &str) -> Result<MountEntry, HostError> {
    let malformed = || HostError::Parse {
        line: line.to_owned(),
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let mount_id = fields
        .first()
        .and_then(|id| id.parse::<i32>().ok())
        .ok_or_else(malformed)?;
    let mount_point = fields.get(4).ok_or_else(malformed)?;
    let separator = fields
        .iter()
        .skip(6)
        .position(|f| *f == "-")
        .ok_or_else(malformed)?;
    let fs_type = fields.get(6 + separator + 1).ok_or_else(malformed)?;
    Ok(MountEntry {
        mount_id,
        mount_point: unescape_path(mount_point).into_owned(),
        fs_type: (*fs_type).to_owned(),
    })
}

/// Returns the mount that contains `path`; the topmost one wins when
/// several mounts are stacked on the same point.
fn containing_mount<'a>(table: &'a [MountEntry], path: &str) -> Option<&'a MountEntry> {
    table
        .iter()
        .filter(|entry| is_under(path, &entry.mount_point))
        .max_by_key(|entry| entry.mount_point.len())
}

fn is_under(path: &str, mount_point: &str) -> bool {
    if mount_point == "/" {
        return path.starts_with('/');
    }
    path.strip_prefix(mount_point)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[allow(clippy::useless_conversion)]
fn namespace_identity(path: &Path) -> Option<(u64, u64)> {
    let stat = nix::sys::stat::stat(path).ok()?;
    Some((u64::from(stat.st_dev), u64::from(stat.st_ino)))
}

#[cfg(target_os = "linux")]
fn unmount_path(path: &str, mode: MountMode) -> Result<(), HostError> {
    use nix::mount::{MntFlags, umount2};

    let flags = if mode.is_detach() {
        MntFlags::MNT_DETACH
    } else {
        MntFlags::empty()
    };
    umount2(path, flags).map_err(|e| HostError::Unmount {
        path: path.to_owned(),
        source: e,
    })
}

#[cfg(not(target_os = "linux"))]
fn unmount_path(_path: &str, _mode: MountMode) -> Result<(), HostError> {
    Err(HostError::Unsupported {
        operation: "umount2",
    })
}

/// Reads the stat buffer of `path` the way a `stat(2)` caller would see it.
///
/// # Errors
///
/// Returns `HostError::Resolve` if the path cannot be stat'ed.
#[cfg(target_os = "linux")]
#[allow(clippy::useless_conversion)]
pub fn stat_path(path: &Path) -> Result<crate::kstat::StatBuf, HostError> {
    use veilfs_common::types::{EncodedDev, Timestamp};

    let st = nix::sys::stat::stat(path).map_err(|e| HostError::Resolve {
        path: path.display().to_string(),
        source: std::io::Error::from(e),
    })?;
    Ok(crate::kstat::StatBuf {
        ino: u64::from(st.st_ino),
        dev: EncodedDev::new(u64::from(st.st_dev)),
        mode: st.st_mode,
        nlink: u64::from(st.st_nlink),
        uid: st.st_uid,
        gid: st.st_gid,
        size: i64::from(st.st_size),
        atime: Timestamp::new(i64::from(st.st_atime), i64::from(st.st_atime_nsec)),
        mtime: Timestamp::new(i64::from(st.st_mtime), i64::from(st.st_mtime_nsec)),
        ctime: Timestamp::new(i64::from(st.st_ctime), i64::from(st.st_ctime_nsec)),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: the stat shape is Linux specific.
#[cfg(not(target_os = "linux"))]
pub fn stat_path(_path: &Path) -> Result<crate::kstat::StatBuf, HostError> {
    Err(HostError::Unsupported { operation: "stat" })
}
