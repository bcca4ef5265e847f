//! Kernel identity override.

use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use veilfs_common::constants::{UNAME_UNSET, UTS_FIELD_LEN};

use crate::engine::VeilEngine;
use crate::logging::veil_info;

fn unset() -> String {
    UNAME_UNSET.to_owned()
}

/// Identity override as transferred by the controller.
///
/// A field left at `"default"` keeps the kernel's own value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnameRequest {
    /// Operating system name.
    pub sysname: String,
    /// Network node name.
    pub nodename: String,
    /// Kernel release.
    pub release: String,
    /// Kernel build version.
    pub version: String,
    /// Hardware identifier.
    pub machine: String,
}

impl Default for UnameRequest {
    fn default() -> Self {
        Self {
            sysname: unset(),
            nodename: unset(),
            release: unset(),
            version: unset(),
            machine: unset(),
        }
    }
}

/// Active identity override; `None` fields are not overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnameOverride {
    /// Operating system name.
    pub sysname: Option<String>,
    /// Network node name.
    pub nodename: Option<String>,
    /// Kernel release.
    pub release: Option<String>,
    /// Kernel build version.
    pub version: Option<String>,
    /// Hardware identifier.
    pub machine: Option<String>,
}

/// The caller-visible `utsname` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Utsname {
    /// Operating system name.
    pub sysname: String,
    /// Network node name.
    pub nodename: String,
    /// Kernel release.
    pub release: String,
    /// Kernel build version.
    pub version: String,
    /// Hardware identifier.
    pub machine: String,
}

/// Truncates `value` to the utsname field width on a char boundary.
fn bounded(value: &str) -> Option<String> {
    if value == UNAME_UNSET {
        return None;
    }
    let mut end = value.len().min(UTS_FIELD_LEN);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    Some(value[..end].to_owned())
}

impl From<&UnameRequest> for UnameOverride {
    fn from(request: &UnameRequest) -> Self {
        Self {
            sysname: bounded(&request.sysname),
            nodename: bounded(&request.nodename),
            release: bounded(&request.release),
            version: bounded(&request.version),
            machine: bounded(&request.machine),
        }
    }
}

impl VeilEngine {
    /// Replaces the identity override.
    pub fn set_uname(&self, request: &UnameRequest) {
        let next = UnameOverride::from(request);
        veil_info!(
            self.log,
            sysname = next.sysname.as_deref().unwrap_or(UNAME_UNSET),
            nodename = next.nodename.as_deref().unwrap_or(UNAME_UNSET),
            release = next.release.as_deref().unwrap_or(UNAME_UNSET),
            version = next.version.as_deref().unwrap_or(UNAME_UNSET),
            machine = next.machine.as_deref().unwrap_or(UNAME_UNSET),
            "uname override set"
        );
        *self.uname.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Returns the active override.
    #[must_use]
    pub fn uname_override(&self) -> UnameOverride {
        self.uname
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Overwrites every field of `uts` the override sets.
    pub fn spoof_uname(&self, uts: &mut Utsname) {
        let guard = self.uname.read().unwrap_or_else(PoisonError::into_inner);
        let fields = [
            (&guard.sysname, &mut uts.sysname),
            (&guard.nodename, &mut uts.nodename),
            (&guard.release, &mut uts.release),
            (&guard.version, &mut uts.version),
            (&guard.machine, &mut uts.machine),
        ];
        for (spoofed, field) in fields {
            if let Some(spoofed) = spoofed {
                spoofed.clone_into(field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use veilfs_common::config::VeilConfig;

    use super::*;

    fn kernel() -> Utsname {
        Utsname {
            sysname: "Linux".into(),
            nodename: "localhost".into(),
            release: "5.10.198-android12-9-ksu".into(),
            version: "#1 SMP PREEMPT".into(),
            machine: "aarch64".into(),
        }
    }

    #[test]
    fn unset_fields_keep_kernel_values() {
        let engine = VeilEngine::new(VeilConfig::default()).unwrap();
        engine.set_uname(&UnameRequest {
            release: "5.10.198-android12-9-g1234".into(),
            ..UnameRequest::default()
        });
        let mut uts = kernel();
        engine.spoof_uname(&mut uts);
        assert_eq!(uts.release, "5.10.198-android12-9-g1234");
        assert_eq!(uts.sysname, "Linux");
        assert_eq!(uts.machine, "aarch64");
    }

    #[test]
    fn set_uname_overwrites_previous_override() {
        let engine = VeilEngine::new(VeilConfig::default()).unwrap();
        engine.set_uname(&UnameRequest {
            version: "#2".into(),
            ..UnameRequest::default()
        });
        engine.set_uname(&UnameRequest::default());
        assert_eq!(engine.uname_override(), UnameOverride::default());
    }

    #[test]
    fn long_values_are_truncated_on_char_boundary() {
        let long = format!("{}é", "a".repeat(63));
        let truncated = bounded(&long).unwrap();
        assert_eq!(truncated.len(), 63);
        assert!(bounded(&"b".repeat(100)).is_some_and(|v| v.len() == UTS_FIELD_LEN));
    }

    #[test]
    fn missing_json_fields_default_to_unset() {
        let request: UnameRequest = serde_json::from_str(r#"{"release":"6.1"}"#).unwrap();
        assert_eq!(request.sysname, "default");
        let applied = UnameOverride::from(&request);
        assert_eq!(applied.release.as_deref(), Some("6.1"));
        assert!(applied.sysname.is_none());
    }
}
