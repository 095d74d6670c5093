//! plexsafe CLI - backup and restore for Plex Media Server
//!
//! This is the main entry point for the plexsafe command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use plexsafe_core::{ErrorKind, PlexsafeConfig};
use std::fs::{self, File};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The log directory comes from configuration, so load it before tracing
    let config = PlexsafeConfig::load(cli.config.as_deref());
    let log_dir = match &config {
        Ok(c) => c.log_dir(),
        Err(_) => PlexsafeConfig::default_log_dir(),
    };
    let log_file = init_tracing(cli.verbose, cli.quiet, Some(log_dir.as_path()));

    let result = match config {
        Ok(config) => {
            if let Some(path) = &config.config_path {
                tracing::info!("Using configuration from {}", path);
            }
            if let Some(path) = &log_file {
                tracing::debug!("Logging to {}", path);
            }
            run(cli.command, &config, cli.quiet).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            output::error(&format!("{:#}", e));
            if let Some(hint) = recovery_hint(&e) {
                output::info(hint);
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(command: Commands, config: &PlexsafeConfig, quiet: bool) -> Result<()> {
    config.validate()?;
    match command {
        Commands::Backup(args) => commands::backup::run(args, config, quiet).await,
        Commands::Restore(args) => commands::restore::run(args, config, quiet).await,
    }
}

/// Process exit status for a failed command
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<plexsafe_core::Error>()
        .map(|e| e.kind().exit_code())
        .unwrap_or(1)
}

/// Advice for failures the user can fix before rerunning
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    let kind = err.downcast_ref::<plexsafe_core::Error>()?.kind();
    if !kind.is_recoverable() {
        return None;
    }
    Some(match kind {
        ErrorKind::SourcePath => "Check the data, backup and archive paths, then run again",
        _ => "Fix the configuration or command-line options, then run again",
    })
}

/// Initialize tracing with appropriate verbosity.
///
/// The console gets the verbosity chosen on the command line; a fresh file in
/// `log_dir` gets everything at debug and above. Returns the log file path.
fn init_tracing(verbose: u8, quiet: bool, log_dir: Option<&Utf8Path>) -> Option<Utf8PathBuf> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let log_file = log_dir.and_then(|dir| match open_log_file(dir) {
        Ok(opened) => Some(opened),
        Err(e) => {
            output::warning(&format!("Cannot write log file in {}: {}", dir, e));
            None
        }
    });
    let (log_path, file_layer) = match log_file {
        Some((path, file)) => (
            Some(path),
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            ),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .with(file_layer)
        .init();

    log_path
}

/// Create a log file no earlier run has written to
fn open_log_file(dir: &Utf8Path) -> std::io::Result<(Utf8PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => format!("plexsafe_{}.log", stamp),
            n => format!("plexsafe_{}_{}.log", stamp, n),
        };
        let path = dir.join(name);
        match File::options().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 1000 => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
