//! The spoofing engine: every registry plus the collaborators the decision
//! procedures consult.
//!
//! Each surface adds its own `impl VeilEngine` block in its module
//! (`sus_path`, `kstat`, `maps`, ...). This module only wires the state
//! together.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use veilfs_common::config::VeilConfig;
use veilfs_common::error::{Result, VeilError};
use veilfs_common::types::Caller;

use crate::device::DeviceCodec;
use crate::fd_link::FdLinkRule;
use crate::host::HostEnvironment;
use crate::host::linux::LinuxHost;
use crate::kstat::KstatRule;
use crate::logging::{LogSwitch, veil_error, veil_info};
use crate::maps::MapsRule;
use crate::mount_id::MountIdRecord;
use crate::policy::{TargetPolicy, UidThreshold};
use crate::registry::{Registry, RegistryRecord};
use crate::sus_mount::SusMount;
use crate::sus_path::SusPath;
use crate::umount::TryUmount;
use crate::uname::UnameOverride;

/// Number of records held by each store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Registered sus paths.
    pub sus_paths: usize,
    /// Registered sus mounts.
    pub sus_mounts: usize,
    /// Registered kstat rules.
    pub kstat_rules: usize,
    /// Registered maps rules.
    pub maps_rules: usize,
    /// Registered fd-link rules.
    pub fd_link_rules: usize,
    /// Registered forced-unmount targets.
    pub try_umounts: usize,
    /// Processes with a recorded hidden mount-id list.
    pub recorded_processes: usize,
}

/// Shared spoofing engine.
///
/// One instance lives for the whole lifetime of the host and is shared
/// between threads behind an `Arc`.
pub struct VeilEngine {
    pub(crate) config: VeilConfig,
    pub(crate) log: LogSwitch,
    policy: Box<dyn TargetPolicy>,
    pub(crate) codec: Box<dyn DeviceCodec>,
    pub(crate) host: Arc<dyn HostEnvironment>,
    pub(crate) sus_paths: Registry<SusPath>,
    pub(crate) sus_mounts: Registry<SusMount>,
    pub(crate) kstats: Registry<KstatRule>,
    pub(crate) maps: Registry<MapsRule>,
    pub(crate) fd_links: Registry<FdLinkRule>,
    pub(crate) try_umounts: Registry<TryUmount>,
    pub(crate) mount_ids: Registry<MountIdRecord>,
    pub(crate) uname: RwLock<UnameOverride>,
}

impl VeilEngine {
    /// Creates an engine targeting uids at or above `config.target_uid_min`
    /// and using the procfs host.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: VeilConfig) -> Result<Self> {
        let policy = UidThreshold::new(config.target_uid_min);
        Self::with_policy(config, policy)
    }

    /// Creates an engine with a custom target-identity policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_policy(config: VeilConfig, policy: impl TargetPolicy + 'static) -> Result<Self> {
        config.validate()?;
        tracing::debug!(config = ?config, "initializing veilfs engine");
        Ok(Self {
            log: LogSwitch::new(config.log_enabled),
            policy: Box::new(policy),
            codec: Box::new(config.device_encoding),
            host: Arc::new(LinuxHost::new()),
            sus_paths: Registry::new(),
            sus_mounts: Registry::with_limit(config.max_sus_mounts),
            kstats: Registry::new(),
            maps: Registry::new(),
            fd_links: Registry::new(),
            try_umounts: Registry::new(),
            mount_ids: Registry::new(),
            uname: RwLock::new(UnameOverride::default()),
            config,
        })
    }

    /// Replaces the device codec.
    #[must_use]
    pub fn with_codec(mut self, codec: impl DeviceCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replaces the host environment.
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
        self.host = host;
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &VeilConfig {
        &self.config
    }

    /// Enables or disables diagnostic logging.
    pub fn set_log(&self, enabled: bool) {
        self.log.set(enabled);
        tracing::info!(target: "veilfs", enabled, "diagnostic logging toggled");
    }

    /// Returns whether diagnostic logging is enabled.
    #[must_use]
    pub fn log_enabled(&self) -> bool {
        self.log.is_enabled()
    }

    /// Returns the record count of every store.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            sus_paths: self.sus_paths.len(),
            sus_mounts: self.sus_mounts.len(),
            kstat_rules: self.kstats.len(),
            maps_rules: self.maps.len(),
            fd_link_rules: self.fd_links.len(),
            try_umounts: self.try_umounts.len(),
            recorded_processes: self.mount_ids.len(),
        }
    }

    pub(crate) fn is_target(&self, caller: &Caller) -> bool {
        self.policy.is_target(caller)
    }

    /// Inserts `record` into `registry`, logging the outcome.
    pub(crate) fn register<T: RegistryRecord>(
        &self,
        registry: &Registry<T>,
        record: T,
    ) -> Result<()> {
        let key = record.describe();
        match registry.insert(record) {
            Ok(()) => {
                veil_info!(self.log, store = T::STORE, %key, "record added");
                Ok(())
            }
            Err(err) => Err(self.rejected(err)),
        }
    }

    /// Logs a rejected registration and hands the error back.
    pub(crate) fn rejected(&self, err: VeilError) -> VeilError {
        veil_error!(self.log, error = %err, "registration rejected");
        err
    }
}

impl std::fmt::Debug for VeilEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeilEngine")
            .field("config", &self.config)
            .field("log", &self.log)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
