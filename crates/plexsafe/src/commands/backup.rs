//! Backup command

use anyhow::Result;
use clap::Args;
use plexsafe_archive::{ArchiveJob, ExclusionSet, JobOutcome};
use plexsafe_core::PlexsafeConfig;

use super::build_engine;
use crate::output;

#[derive(Args, Debug)]
pub struct BackupArgs {}

pub async fn run(_args: BackupArgs, config: &PlexsafeConfig, quiet: bool) -> Result<()> {
    output::header("Backup Plex Media Server");

    let data_dir = config.data_dir()?;
    let level = config.compression_level()?;
    let format = config.archive_format();
    let exclusions = ExclusionSet::new(config.exclude_folders());

    output::kv("Data directory", data_dir.as_str());
    output::kv("Backup directory", config.backup_dir().as_str());
    output::kv("Format", &format.to_string());
    output::kv("Compression level", &level.to_string());
    output::kv(
        "Excluded folders",
        &if config.exclude_folders().is_empty() {
            "(none)".to_string()
        } else {
            config.exclude_folders().join(", ")
        },
    );
    output::kv("Service", config.service().build().name());

    let job = ArchiveJob::backup(
        data_dir.as_std_path(),
        config.backup_dir().as_std_path(),
        format,
        level.get() as i64,
        exclusions,
    );
    let engine = build_engine(config, quiet);
    let JobOutcome { result, restart } = engine.run_backup(&job).await?;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Err(restart_err) = restart {
                output::error(&format!("Service is down: {}", restart_err));
            }
            return Err(e.into());
        }
    };

    output::success("Backup complete");
    output::kv("Archive", &report.archive_path.display().to_string());
    output::kv("Files", &report.files.to_string());
    output::kv("Directories", &report.dirs.to_string());
    output::kv("Data size", &output::bytes(report.bytes));
    output::kv("Archive size", &output::bytes(report.archive_size));
    if report.settings_included {
        output::kv("Settings", "included");
    }
    output::kv("Duration", &output::duration(report.duration));

    if let Err(e) = restart {
        output::error(&format!(
            "Backup succeeded but the service could not be restarted, service is down: {}",
            e
        ));
        return Err(e.into());
    }
    Ok(())
}
