//! Switchable diagnostic logging.
//!
//! The controller can silence the engine at runtime. The switch gates only
//! whether `tracing` events are emitted; spoofing decisions never read it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Runtime on/off switch for engine diagnostics.
#[derive(Debug)]
pub struct LogSwitch(AtomicBool);

impl LogSwitch {
    /// Creates a switch in the given state.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    /// Returns whether diagnostics are currently emitted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Turns diagnostics on or off.
    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

impl Default for LogSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Emits an info-level event when the switch is on.
macro_rules! veil_info {
    ($switch:expr, $($arg:tt)+) => {
        if $switch.is_enabled() {
            ::tracing::info!(target: "veilfs", $($arg)+);
        }
    };
}

/// Emits an error-level event when the switch is on.
macro_rules! veil_error {
    ($switch:expr, $($arg:tt)+) => {
        if $switch.is_enabled() {
            ::tracing::error!(target: "veilfs", $($arg)+);
        }
    };
}

pub(crate) use veil_error;
pub(crate) use veil_info;
