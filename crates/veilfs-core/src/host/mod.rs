//! Host environment abstraction.
//!
//! Mount-table enumeration, mount-point resolution, namespace identity and
//! the unmount primitive belong to the platform. The engine reaches them
//! only through [`HostEnvironment`], so tests can substitute a scripted host.

pub mod linux;

use std::path::PathBuf;

use thiserror::Error;
use veilfs_common::error::VeilError;
use veilfs_common::types::{MountMode, Pid};

/// One mount as listed in a process's mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Kernel mount identifier.
    pub mount_id: i32,
    /// Mount point as seen from the process's root, unescaped.
    pub mount_point: String,
    /// Filesystem type name.
    pub fs_type: String,
}

/// Result of resolving a path to the mount that contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// Whether the path is the root of its mount.
    pub is_mount_root: bool,
    /// Filesystem type of the containing mount.
    pub fs_type: String,
}

/// Failures of host primitives.
#[derive(Debug, Error)]
pub enum HostError {
    /// A procfs or sysfs file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A mount table line did not have the expected shape.
    #[error("malformed mountinfo line: {line}")]
    Parse {
        /// Offending line.
        line: String,
    },

    /// A path could not be resolved.
    #[error("cannot resolve {path}: {source}")]
    Resolve {
        /// Path that failed to resolve.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The unmount syscall failed.
    #[error("umount of {path} failed: {source}")]
    Unmount {
        /// Mount point that could not be removed.
        path: String,
        /// Errno returned by the kernel.
        source: nix::errno::Errno,
    },

    /// The target process lives in a mount namespace this host cannot act in.
    #[error("pid {pid} is in a different mount namespace")]
    ForeignNamespace {
        /// Process whose namespace was requested.
        pid: Pid,
    },

    /// The operation has no implementation on this platform.
    #[error("{operation} is not supported on this platform")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },
}

impl From<HostError> for VeilError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Read { path, source } => Self::Io { path, source },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

/// Platform primitives the engine depends on.
pub trait HostEnvironment: Send + Sync {
    /// Lists every mount in `pid`'s mount namespace, in table order.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read or parsed.
    fn mount_table(&self, pid: Pid) -> Result<Vec<MountEntry>, HostError>;

    /// Resolves `path` in `pid`'s mount namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve for `pid`.
    fn resolve_mount(&self, pid: Pid, path: &str) -> Result<MountPoint, HostError>;

    /// Returns whether `pid` lives in the initial mount namespace.
    ///
    /// Hosts that cannot tell must answer `true` so that nothing is
    /// unmounted from the global namespace.
    fn is_initial_mount_namespace(&self, pid: Pid) -> bool;

    /// Unmounts `path` from `pid`'s mount namespace, plainly or lazily
    /// according to `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot act in `pid`'s namespace or the
    /// kernel refuses the unmount.
    fn unmount(&self, pid: Pid, path: &str, mode: MountMode) -> Result<(), HostError>;
}
