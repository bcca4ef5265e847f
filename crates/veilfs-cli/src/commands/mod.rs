//! CLI command definitions and dispatch.

pub mod check;
pub mod errno;
pub mod mounts;
pub mod stat;
pub mod umount;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use veilfs_common::config::VeilConfig;
use veilfs_common::types::Caller;
use veilfs_core::engine::VeilEngine;
use veilfs_core::transfer::{RejectedRule, RuleSet};

/// veilctl: inspect and exercise veilfs rule sets.
#[derive(Parser, Debug)]
#[command(name = "veilctl", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Engine configuration file (JSON).
    #[arg(long, global = true, env = "VEILFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable engine diagnostics.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit diagnostics as JSON lines.
    #[arg(long, global = true, env = "VEILFS_LOG_JSON")]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a rule set to a fresh engine and report what was refused.
    Check(check::CheckArgs),
    /// Show the stat a target identity would observe for a path.
    Stat(stat::StatArgs),
    /// Show this process's mount table as a target identity would see it.
    Mounts(mounts::MountsArgs),
    /// Run the forced-unmount driver for this process.
    Umount(umount::UmountArgs),
    /// Print the error code a hidden path reports for a syscall family.
    Errno(errno::ErrnoArgs),
}

/// Options every engine-backed command shares.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions<'a> {
    /// Configuration file, defaults when absent.
    pub config: Option<&'a Path>,
    /// Start with diagnostics disabled.
    pub quiet: bool,
}

impl EngineOptions<'_> {
    /// Loads the configuration, honoring `--quiet`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is unreadable or invalid.
    pub fn load_config(&self) -> anyhow::Result<VeilConfig> {
        let mut config = match self.config {
            Some(path) => VeilConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => VeilConfig::default(),
        };
        if self.quiet {
            config.log_enabled = false;
        }
        Ok(config)
    }

    /// Builds an engine and applies the rule set at `rules`.
    ///
    /// Refused rules are logged and returned alongside the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the rules file cannot be
    /// loaded.
    pub fn engine_with_rules(
        &self,
        rules: &Path,
    ) -> anyhow::Result<(VeilEngine, Vec<RejectedRule>)> {
        let engine = VeilEngine::new(self.load_config()?)?;
        let rule_set =
            RuleSet::load(rules).with_context(|| format!("loading rules {}", rules.display()))?;
        let rejected = engine.apply_rule_set(rule_set);
        for r in &rejected {
            tracing::warn!(index = r.index, kind = r.kind, error = %r.error, "rule refused");
        }
        Ok((engine, rejected))
    }
}

/// The current process, seen as the identity `uid`.
#[must_use]
pub fn current_caller(uid: u32) -> Caller {
    Caller::new(nix::unistd::getpid().as_raw(), uid)
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let options = EngineOptions {
        config: cli.config.as_deref(),
        quiet: cli.quiet,
    };
    match cli.command {
        Command::Check(args) => check::execute(args, options),
        Command::Stat(args) => stat::execute(args, options),
        Command::Mounts(args) => mounts::execute(args, options),
        Command::Umount(args) => umount::execute(args, options),
        Command::Errno(args) => errno::execute(&args),
    }
}
