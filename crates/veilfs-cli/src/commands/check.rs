//! `veilctl check`: Validate a rule set.

use std::path::PathBuf;

use clap::Args;

use super::EngineOptions;
use crate::output;

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Rules file (JSON).
    pub rules: PathBuf,

    /// Print store counts as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `check` command.
///
/// Applies every rule to a fresh engine, prints the resulting store sizes
/// and lists the refused rules.
///
/// # Errors
///
/// Returns an error if the files cannot be loaded or any rule is refused.
pub fn execute(args: CheckArgs, options: EngineOptions<'_>) -> anyhow::Result<()> {
    let (engine, rejected) = options.engine_with_rules(&args.rules)?;
    let stats = engine.stats();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", output::stats_table(&stats));
    }

    if rejected.is_empty() {
        return Ok(());
    }
    println!();
    println!("{:<6} {:<22} REASON", "INDEX", "KIND");
    for r in &rejected {
        println!("{:<6} {:<22} {}", r.index, r.kind, r.error);
    }
    anyhow::bail!("{} of the rules were refused", rejected.len())
}
