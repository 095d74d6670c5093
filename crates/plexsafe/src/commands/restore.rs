//! Restore command

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Args;
use plexsafe_archive::{find_latest_backup, ArchiveJob, JobOutcome};
use plexsafe_core::{ArchiveFormat, PlexsafeConfig};
use std::path::PathBuf;

use super::build_engine;
use crate::output;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Archive to restore (default: the latest backup in the backup directory)
    #[arg(short, long)]
    pub archive: Option<Utf8PathBuf>,
}

/// The archive to restore and its container format.
///
/// An explicit archive's format comes from its extension when recognised.
fn select_archive(
    args: &RestoreArgs,
    config: &PlexsafeConfig,
) -> plexsafe_core::Result<(PathBuf, ArchiveFormat)> {
    let configured = config.archive_format();
    match &args.archive {
        Some(path) => {
            let path = path.as_std_path().to_path_buf();
            let format = ArchiveFormat::from_path(&path).unwrap_or(configured);
            Ok((path, format))
        }
        None => Ok((
            find_latest_backup(config.backup_dir().as_std_path(), configured)?,
            configured,
        )),
    }
}

pub async fn run(args: RestoreArgs, config: &PlexsafeConfig, quiet: bool) -> Result<()> {
    output::header("Restore Plex Media Server");

    let data_dir = config.data_dir()?;
    let (archive, format) = select_archive(&args, config)?;

    output::kv("Archive", &archive.display().to_string());
    output::kv("Format", &format.to_string());
    output::kv("Data directory", data_dir.as_str());
    output::kv("Service", config.service().build().name());
    output::warning("Existing files at restored paths will be overwritten");

    let job = ArchiveJob::restore(&archive, data_dir.as_std_path(), format);
    let engine = build_engine(config, quiet);
    let JobOutcome { result, restart } = engine.run_restore(&job).await?;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Err(restart_err) = restart {
                output::error(&format!("Service is down: {}", restart_err));
            }
            return Err(e.into());
        }
    };

    output::success("Restore complete");
    output::kv("Files", &report.files.to_string());
    output::kv("Directories", &report.dirs.to_string());
    output::kv("Data size", &output::bytes(report.bytes));
    output::kv("Replaced entries", &report.replaced.to_string());
    if report.settings_imported {
        output::kv("Settings", "imported");
    }
    output::kv("Duration", &output::duration(report.duration));

    if let Err(e) = restart {
        output::error(&format!(
            "Restore succeeded but the service could not be restarted, service is down: {}",
            e
        ));
        return Err(e.into());
    }
    Ok(())
}
