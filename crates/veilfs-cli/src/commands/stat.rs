//! `veilctl stat`: Show the spoofed stat of a path.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use veilfs_core::host::linux::stat_path;

use super::{EngineOptions, current_caller};
use crate::output;

/// Arguments for the `stat` command.
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Path to stat.
    pub path: PathBuf,

    /// Rules file (JSON).
    #[arg(long)]
    pub rules: PathBuf,

    /// Identity to evaluate as; defaults to the first targeted uid.
    #[arg(long)]
    pub uid: Option<u32>,
}

/// Executes the `stat` command.
///
/// Stats the path, then runs the stat spoofing a target identity would get
/// and prints both views side by side.
///
/// # Errors
///
/// Returns an error if the files cannot be loaded or the path cannot be
/// stat'ed.
pub fn execute(args: StatArgs, options: EngineOptions<'_>) -> anyhow::Result<()> {
    let (engine, _) = options.engine_with_rules(&args.rules)?;
    let uid = args.uid.unwrap_or(engine.config().target_uid_min);
    let caller = current_caller(uid);

    let path = canonical_path(&args.path)?;
    let real = stat_path(&path)?;
    let mut spoofed = real;
    let applied = engine.spoof_stat(&caller, real.ino, &mut spoofed);

    if engine.is_sus_path(&caller, &path.to_string_lossy()) {
        println!("{}: hidden from uid {uid}", args.path.display());
    }
    print!(
        "{}",
        output::stat_table(&real, &spoofed, &engine.config().device_encoding)
    );
    if !applied {
        println!("no kstat rule for inode {}", real.ino);
    }
    Ok(())
}

/// Resolves `path` to the absolute, symlink-free form rules are keyed by.
fn canonical_path(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("resolving {}", path.display()))
}
