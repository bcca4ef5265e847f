//! Target-identity selection.
//!
//! Which callers get the spoofed view is decided outside the engine. The
//! engine only asks a [`TargetPolicy`] and short-circuits every gated
//! surface for callers it rejects.

use veilfs_common::types::{Caller, Uid};

/// Decides whether a caller is subject to spoofing.
pub trait TargetPolicy: Send + Sync {
    /// Returns whether `caller` should observe the spoofed view.
    fn is_target(&self, caller: &Caller) -> bool;
}

impl<F> TargetPolicy for F
where
    F: Fn(&Caller) -> bool + Send + Sync,
{
    fn is_target(&self, caller: &Caller) -> bool {
        self(caller)
    }
}

/// Selects every caller whose uid is at or above a threshold.
///
/// With the default threshold this targets ordinary applications and leaves
/// system services alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UidThreshold {
    min_uid: Uid,
}

impl UidThreshold {
    /// Creates a policy selecting uids `>= min_uid`.
    #[must_use]
    pub const fn new(min_uid: u32) -> Self {
        Self {
            min_uid: Uid::new(min_uid),
        }
    }
}

impl TargetPolicy for UidThreshold {
    fn is_target(&self, caller: &Caller) -> bool {
        caller.uid >= self.min_uid
    }
}
