//! Proc fd-link spoofing.

use serde::{Deserialize, Serialize};
use veilfs_common::error::Result;
use veilfs_common::types::Caller;

use crate::engine::VeilEngine;
use crate::logging::{veil_error, veil_info};
use crate::pathname::validate_pathname;
use crate::registry::RegistryRecord;

/// Rewrites the target of a `/proc/<pid>/fd/<n>` link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdLinkRule {
    /// Link text to replace.
    pub target_link_name: String,
    /// Link text reported instead.
    pub spoofed_link_name: String,
}

impl FdLinkRule {
    /// Creates a fd-link rule.
    #[must_use]
    pub fn new(target_link_name: impl Into<String>, spoofed_link_name: impl Into<String>) -> Self {
        Self {
            target_link_name: target_link_name.into(),
            spoofed_link_name: spoofed_link_name.into(),
        }
    }
}

impl RegistryRecord for FdLinkRule {
    const STORE: &'static str = "sus_proc_fd_link";

    fn conflicts_with(&self, candidate: &Self) -> bool {
        self.target_link_name == candidate.target_link_name
    }

    fn describe(&self) -> String {
        format!("target_link_name '{}'", self.target_link_name)
    }
}

impl VeilEngine {
    /// Registers a fd-link rewrite.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` for unusable link text and `DuplicateEntry`
    /// if the target link is already registered.
    pub fn add_sus_proc_fd_link(&self, rule: FdLinkRule) -> Result<()> {
        validate_pathname(FdLinkRule::STORE, "target_link_name", &rule.target_link_name)
            .and_then(|()| {
                validate_pathname(
                    FdLinkRule::STORE,
                    "spoofed_link_name",
                    &rule.spoofed_link_name,
                )
            })
            .map_err(|e| self.rejected(e))?;
        self.register(&self.fd_links, rule)
    }

    /// Replaces `link` with its spoofed text if a rule matches.
    ///
    /// `max_len` is the capacity of the caller's buffer including the
    /// terminating NUL. A replacement that would not fit leaves `link`
    /// untouched and returns `false`.
    pub fn spoof_fd_link(&self, caller: &Caller, link: &mut String, max_len: usize) -> bool {
        if !self.is_target(caller) {
            return false;
        }
        self.fd_links
            .scan(|rule| {
                if rule.target_link_name != *link {
                    return None;
                }
                if rule.spoofed_link_name.len() + 1 > max_len {
                    veil_error!(
                        self.log,
                        uid = %caller.uid,
                        target_link_name = %rule.target_link_name,
                        spoofed_link_name = %rule.spoofed_link_name,
                        max_len,
                        "spoofed link does not fit the caller's buffer"
                    );
                    return Some(false);
                }
                veil_info!(
                    self.log,
                    uid = %caller.uid,
                    target_link_name = %rule.target_link_name,
                    spoofed_link_name = %rule.spoofed_link_name,
                    "spoofing fd link"
                );
                rule.spoofed_link_name.clone_into(link);
                Some(true)
            })
            .unwrap_or(false)
    }
}
