//! `veilctl mounts`: Show the renumbered mount table.

use std::path::PathBuf;

use clap::Args;
use veilfs_common::types::Pid;
use veilfs_core::host::HostEnvironment;
use veilfs_core::host::linux::LinuxHost;

use super::{EngineOptions, current_caller};

/// Arguments for the `mounts` command.
#[derive(Args, Debug)]
pub struct MountsArgs {
    /// Rules file (JSON).
    #[arg(long)]
    pub rules: PathBuf,

    /// Identity to evaluate as; defaults to the first targeted uid.
    #[arg(long)]
    pub uid: Option<u32>,

    /// Also list hidden mounts, marked with `*`.
    #[arg(short, long)]
    pub all: bool,
}

/// Executes the `mounts` command.
///
/// Records this process's hidden mount ids and prints its mount table the
/// way a target identity would read it.
///
/// # Errors
///
/// Returns an error if the files cannot be loaded or the mount table cannot
/// be read.
pub fn execute(args: MountsArgs, options: EngineOptions<'_>) -> anyhow::Result<()> {
    let (engine, _) = options.engine_with_rules(&args.rules)?;
    let uid = args.uid.unwrap_or(engine.config().target_uid_min);
    let caller = current_caller(uid);

    engine.record_mount_ids(&caller)?;
    let table = LinuxHost::new().mount_table(caller.pid)?;

    println!("{:<8} {:<8} {:<12} MOUNT POINT", "ID", "REAL", "TYPE");
    for entry in &table {
        let hidden = engine.is_sus_mount(&caller, &entry.mount_point);
        if hidden && !args.all {
            continue;
        }
        let shown = if hidden {
            "*".to_owned()
        } else {
            engine.remap_mount_id(&caller, entry.mount_id).to_string()
        };
        println!(
            "{:<8} {:<8} {:<12} {}",
            shown, entry.mount_id, entry.fs_type, entry.mount_point
        );
    }

    if let Some(line) = release_note(engine.remove_mount_ids(&caller), caller.pid) {
        println!("{line}");
    }
    Ok(())
}

fn release_note(removed: bool, pid: Pid) -> Option<String> {
    (!removed).then(|| format!("no mount-id record for pid {pid}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_is_reported() {
        assert_eq!(release_note(true, Pid::new(42)), None);
        assert_eq!(
            release_note(false, Pid::new(42)).as_deref(),
            Some("no mount-id record for pid 42")
        );
    }
}
