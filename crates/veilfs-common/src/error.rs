//! Unified error types for the veilfs workspace.
//!
//! Registration failures are the only errors the engine produces; query
//! surfaces never fail and degrade to "no spoofing applied" instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Pid;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VeilError {
    /// A registration record could not be read or failed validation.
    #[error("malformed {store} record: {message}")]
    TransferFault {
        /// Store the record was destined for.
        store: &'static str,
        /// Description of what was wrong with the record.
        message: String,
    },

    /// A record with the same uniqueness key is already registered.
    #[error("{key} is already registered in {store}")]
    DuplicateEntry {
        /// Store that rejected the record.
        store: &'static str,
        /// Rendering of the conflicting key.
        key: String,
    },

    /// A bounded store has reached its hard cap.
    #[error("{store} has reached its limit of {limit} entries")]
    StoreFull {
        /// Store that is full.
        store: &'static str,
        /// Configured maximum entry count.
        limit: usize,
    },

    /// Allocating room for a new record failed.
    #[error("not enough memory to grow {store}")]
    OutOfMemory {
        /// Store that could not grow.
        store: &'static str,
    },

    /// An update targeted a key that is not registered.
    #[error("{key} is not found in {store}")]
    NotFound {
        /// Store that was searched.
        store: &'static str,
        /// Rendering of the missing key.
        key: String,
    },

    /// A per-process bounded sequence would exceed its capacity.
    #[error("pid {pid} has more than {limit} hidden mounts")]
    CapacityExceeded {
        /// Process whose record overflowed.
        pid: Pid,
        /// Maximum number of entries per record.
        limit: usize,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VeilError>;
