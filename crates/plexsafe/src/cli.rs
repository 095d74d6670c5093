//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

pub use crate::commands::backup::BackupArgs;
pub use crate::commands::restore::RestoreArgs;

/// plexsafe - backup and restore for Plex Media Server
#[derive(Parser, Debug)]
#[command(name = "plexsafe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config.yaml (default: next to the executable)
    #[arg(short, long, global = true, env = "PLEXSAFE_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stop the server, archive its data directory, start it again
    Backup(BackupArgs),

    /// Stop the server, extract a backup over its data directory, start it again
    Restore(RestoreArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_restore_with_archive() {
        let cli = Cli::try_parse_from([
            "plexsafe",
            "-vv",
            "--config",
            "/etc/plexsafe.yaml",
            "restore",
            "--archive",
            "/srv/plex_backup_20240101000000.zip",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref().map(|p| p.as_str()), Some("/etc/plexsafe.yaml"));
        match cli.command {
            Commands::Restore(args) => assert_eq!(
                args.archive.as_deref().map(|p| p.as_str()),
                Some("/srv/plex_backup_20240101000000.zip")
            ),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_backup_quiet_after_subcommand() {
        let cli = Cli::try_parse_from(["plexsafe", "backup", "--quiet"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Backup(_)));
    }
}
