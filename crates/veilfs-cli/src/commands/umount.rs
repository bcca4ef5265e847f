//! `veilctl umount`: Run the forced-unmount driver.

use std::path::PathBuf;

use clap::Args;

use super::{EngineOptions, current_caller};

/// Arguments for the `umount` command.
#[derive(Args, Debug)]
pub struct UmountArgs {
    /// Rules file (JSON).
    #[arg(long)]
    pub rules: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `umount` command.
///
/// Unmounts every `add_try_umount` target from this process's mount
/// namespace. Nothing happens in the initial namespace.
///
/// # Errors
///
/// Returns an error if the files cannot be loaded.
pub fn execute(args: UmountArgs, options: EngineOptions<'_>) -> anyhow::Result<()> {
    let (engine, _) = options.engine_with_rules(&args.rules)?;
    let caller = current_caller(nix::unistd::getuid().as_raw());
    let report = engine.try_umount(&caller);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for (label, paths) in [
        ("unmounted", &report.unmounted),
        ("skipped", &report.skipped),
        ("failed", &report.failed),
    ] {
        for path in paths {
            println!("{label:<10} {path}");
        }
    }
    Ok(())
}
