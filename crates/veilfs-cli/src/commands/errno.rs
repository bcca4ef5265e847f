//! `veilctl errno`: Show the error code a hidden path reports.

use clap::Args;
use veilfs_common::types::SyscallFamily;
use veilfs_core::errno::change_error_code;

/// Arguments for the `errno` command.
#[derive(Args, Debug)]
pub struct ErrnoArgs {
    /// Hidden path.
    pub path: String,

    /// Syscall family, e.g. `mkdirat` or `renameat2_oldname`.
    pub family: SyscallFamily,
}

/// Executes the `errno` command.
///
/// # Errors
///
/// This command does not fail.
#[allow(clippy::unnecessary_wraps)]
pub fn execute(args: &ErrnoArgs) -> anyhow::Result<()> {
    match change_error_code(&args.path, args.family) {
        Some(errno) => println!("{errno:?}: {}", errno.desc()),
        None => println!("unchanged"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    #[test]
    fn family_is_parsed_by_name() {
        let cli = Cli::try_parse_from(["veilctl", "errno", "/data/adb", "mkdirat"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Errno(ref args) if args.family == SyscallFamily::Mkdirat
        ));
    }

    #[test]
    fn unknown_family_is_rejected() {
        assert!(Cli::try_parse_from(["veilctl", "errno", "/data/adb", "chmod"]).is_err());
    }
}
