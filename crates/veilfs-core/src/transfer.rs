//! JSON transfer surface for registration requests.
//!
//! A controller hands the engine one request at a time, or a whole rule set
//! loaded from a file. Each request carries a `kind` tag naming the
//! registration it performs:
//!
//! ```json
//! {"kind": "add_sus_path", "target_pathname": "/data/adb", "target_ino": 77}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use veilfs_common::error::{Result, VeilError};

use crate::engine::VeilEngine;
use crate::fd_link::FdLinkRule;
use crate::kstat::KstatRequest;
use crate::maps::MapsRequest;
use crate::sus_mount::SusMount;
use crate::sus_path::SusPath;
use crate::umount::TryUmount;
use crate::uname::UnameRequest;

/// One registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleRequest {
    /// Hide a path.
    AddSusPath(SusPath),
    /// Hide a mount point.
    AddSusMount(SusMount),
    /// Spoof the stat of an inode.
    AddSusKstat(KstatRequest),
    /// Re-associate a kstat rule with a new inode.
    UpdateSusKstat(KstatRequest),
    /// Spoof mapping listings.
    AddSusMaps(MapsRequest),
    /// Re-associate a dynamic maps rule with a new inode.
    UpdateSusMaps(MapsRequest),
    /// Rewrite a proc fd link.
    AddSusProcFdLink(FdLinkRule),
    /// Unmount a mount point from target namespaces.
    AddTryUmount(TryUmount),
    /// Override the kernel identity.
    SetUname(UnameRequest),
    /// Toggle diagnostic logging.
    EnableLog {
        /// New switch state.
        enabled: bool,
    },
}

impl RuleRequest {
    /// Returns the request's `kind` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddSusPath(_) => "add_sus_path",
            Self::AddSusMount(_) => "add_sus_mount",
            Self::AddSusKstat(_) => "add_sus_kstat",
            Self::UpdateSusKstat(_) => "update_sus_kstat",
            Self::AddSusMaps(_) => "add_sus_maps",
            Self::UpdateSusMaps(_) => "update_sus_maps",
            Self::AddSusProcFdLink(_) => "add_sus_proc_fd_link",
            Self::AddTryUmount(_) => "add_try_umount",
            Self::SetUname(_) => "set_uname",
            Self::EnableLog { .. } => "enable_log",
        }
    }
}

/// An ordered list of requests, as stored in a rules file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Requests in application order.
    pub rules: Vec<RuleRequest>,
}

impl RuleSet {
    /// Parses a rule set from JSON.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the JSON is malformed.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Loads a rule set from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VeilError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }
}

/// A request of a rule set that the engine refused.
#[derive(Debug)]
pub struct RejectedRule {
    /// Position in the rule set.
    pub index: usize,
    /// The request's `kind` tag.
    pub kind: &'static str,
    /// Why it was refused.
    pub error: VeilError,
}

/// Collapses a registration result to the controller's status code:
/// `0` on success, `1` on failure.
#[must_use]
pub const fn status_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

impl VeilEngine {
    /// Performs one registration request.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying registration.
    pub fn apply_request(&self, request: RuleRequest) -> Result<()> {
        match request {
            RuleRequest::AddSusPath(record) => self.add_sus_path(record),
            RuleRequest::AddSusMount(record) => self.add_sus_mount(record),
            RuleRequest::AddSusKstat(request) => self.add_sus_kstat(request),
            RuleRequest::UpdateSusKstat(request) => self.update_sus_kstat(&request),
            RuleRequest::AddSusMaps(request) => self.add_sus_maps(request),
            RuleRequest::UpdateSusMaps(request) => self.update_sus_maps(&request),
            RuleRequest::AddSusProcFdLink(rule) => self.add_sus_proc_fd_link(rule),
            RuleRequest::AddTryUmount(record) => self.add_try_umount(record),
            RuleRequest::SetUname(request) => {
                self.set_uname(&request);
                Ok(())
            }
            RuleRequest::EnableLog { enabled } => {
                self.set_log(enabled);
                Ok(())
            }
        }
    }

    /// Decodes and performs one JSON request.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` if the request cannot be decoded, otherwise
    /// the error of the underlying registration.
    pub fn apply_json(&self, input: &str) -> Result<()> {
        let request: RuleRequest = serde_json::from_str(input).map_err(|e| {
            self.rejected(VeilError::TransferFault {
                store: "transfer",
                message: e.to_string(),
            })
        })?;
        self.apply_request(request)
    }

    /// Applies every request of `rules` in order and returns the refused
    /// ones. A refusal does not stop the remaining requests.
    pub fn apply_rule_set(&self, rules: RuleSet) -> Vec<RejectedRule> {
        rules
            .rules
            .into_iter()
            .enumerate()
            .filter_map(|(index, request)| {
                let kind = request.kind();
                self.apply_request(request)
                    .err()
                    .map(|error| RejectedRule { index, kind, error })
            })
            .collect()
    }
}
