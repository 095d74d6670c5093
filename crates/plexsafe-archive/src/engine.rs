//! Backup and restore orchestration.
//!
//! A job is validated completely before the service is touched. The backend
//! then runs on a blocking worker inside a [`ServiceGuard`], writing to
//! staged output that is only moved into place on success.

use crate::backend::{ArchiveBackend, BackendRegistry, CompressRequest};
use crate::filters::{ExclusionSet, PathFilter};
use crate::guard::{join_error, JobOutcome, ServiceGuard};
use crate::progress::{NullProgress, ProgressReporter};
use crate::staging::{
    backup_file_name, restore_incomplete, RestoreStaging, StagedArchive, BACKUP_PREFIX,
};
use chrono::Local;
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::service::{NoServices, ServiceControl};
use plexsafe_core::settings::{NoSettings, SettingsStore, SETTINGS_ENTRY_NAME};
use plexsafe_core::{ArchiveFormat, CompressionLevel};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One backup or restore.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    /// Data directory for a backup, archive file for a restore
    pub source_root: PathBuf,
    /// Backup directory for a backup, data directory for a restore
    pub destination: PathBuf,
    pub format: ArchiveFormat,
    /// Configured level, checked before anything else happens
    pub level: i64,
    /// Applied while archiving; restores extract every entry
    pub exclusions: ExclusionSet,
}

impl ArchiveJob {
    pub fn backup(
        data_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        format: ArchiveFormat,
        level: i64,
        exclusions: ExclusionSet,
    ) -> Self {
        Self {
            source_root: data_dir.into(),
            destination: backup_dir.into(),
            format,
            level,
            exclusions,
        }
    }

    pub fn restore(
        archive: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        format: ArchiveFormat,
    ) -> Self {
        Self {
            source_root: archive.into(),
            destination: data_dir.into(),
            format,
            level: CompressionLevel::default().get() as i64,
            exclusions: ExclusionSet::empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupReport {
    pub archive_path: PathBuf,
    pub format: ArchiveFormat,
    pub level: CompressionLevel,
    pub files: u64,
    pub dirs: u64,
    /// Uncompressed bytes archived
    pub bytes: u64,
    pub archive_size: u64,
    pub settings_included: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub archive_path: PathBuf,
    pub destination: PathBuf,
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
    /// Destination entries replaced by restored ones
    pub replaced: u64,
    pub settings_imported: bool,
    pub duration: Duration,
}

/// Source-relative paths of backup output that lives inside the source
/// tree: the whole backup directory when it is nested, or the staged
/// archive and earlier backups when it is the source root itself.
fn own_output(source_root: &Path, destination: &Path, staged: &Path) -> Result<Vec<String>> {
    let source = fs::canonicalize(source_root).at(source_root)?;
    let target = fs::canonicalize(destination).at(destination)?;
    let rel = match target.strip_prefix(&source) {
        Ok(rel) => rel,
        Err(_) => return Ok(Vec::new()),
    };
    if !rel.as_os_str().is_empty() {
        return Ok(vec![rel.to_string_lossy().into_owned()]);
    }

    let mut skipped: Vec<String> = staged
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .into_iter()
        .collect();
    for entry in fs::read_dir(&target).at(&target)? {
        let entry = entry.at(&target)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(BACKUP_PREFIX) && entry.path().is_file() {
            skipped.push(name);
        }
    }
    Ok(skipped)
}

/// Runs backup and restore jobs.
pub struct ArchiveEngine {
    service: Arc<dyn ServiceControl>,
    settings: Arc<dyn SettingsStore>,
    progress: Arc<dyn ProgressReporter>,
    backends: BackendRegistry,
}

impl Default for ArchiveEngine {
    fn default() -> Self {
        Self::new(Arc::new(NoServices))
    }
}

impl ArchiveEngine {
    pub fn new(service: Arc<dyn ServiceControl>) -> Self {
        Self {
            service,
            settings: Arc::new(NoSettings),
            progress: Arc::new(NullProgress),
            backends: BackendRegistry::standard(),
        }
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    fn guard(&self) -> ServiceGuard {
        ServiceGuard::new(self.service.clone(), self.progress.clone())
    }

    /// Level and backend checks shared by both directions
    fn resolve_backend(&self, job: &ArchiveJob) -> Result<(CompressionLevel, Arc<dyn ArchiveBackend>)> {
        let level = CompressionLevel::new(job.level)?;
        if job.destination.as_os_str().is_empty() {
            return Err(Error::configuration("destination directory must be given"));
        }
        let backend = self.backends.get(job.format)?;
        backend.check_available()?;
        Ok((level, backend))
    }

    /// Archive `job.source_root` into a new timestamped archive in
    /// `job.destination`.
    ///
    /// The outer error is a validation failure; the service was not touched.
    pub async fn run_backup(&self, job: &ArchiveJob) -> Result<JobOutcome<BackupReport>> {
        let (level, backend) = self.resolve_backend(job)?;
        let meta = fs::metadata(&job.source_root)
            .map_err(|e| Error::source_path(&job.source_root, format!("cannot be read: {}", e)))?;
        if !meta.is_dir() {
            return Err(Error::source_path(&job.source_root, "is not a directory"));
        }

        info!(
            "Backing up {} to {} as {} (level {})",
            job.source_root.display(),
            job.destination.display(),
            job.format,
            level
        );
        let outcome = self
            .guard()
            .run(|| self.backup(job, level, backend))
            .await;
        Ok(outcome)
    }

    async fn backup(
        &self,
        job: &ArchiveJob,
        level: CompressionLevel,
        backend: Arc<dyn ArchiveBackend>,
    ) -> Result<BackupReport> {
        let started = Instant::now();
        let name = backup_file_name(job.format, &Local::now());
        let staged = StagedArchive::create(&job.destination, &name)?;

        let mut exclusions = job.exclusions.clone();
        for skipped in own_output(&job.source_root, &job.destination, staged.path())? {
            debug!("Backup output {} lies inside the source; skipping it", skipped);
            exclusions = exclusions.with_anchored(&skipped);
        }
        let mut request = CompressRequest::new(&job.source_root, PathFilter::new(exclusions), level);

        // kept alive until the backend has read the export
        let settings_dir = if self.settings.is_enabled() {
            let dir = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
            let file = dir.path().join(SETTINGS_ENTRY_NAME);
            self.settings.export(&file).await?;
            request = request.with_extra(SETTINGS_ENTRY_NAME, &file);
            Some(dir)
        } else {
            None
        };
        let settings_included = settings_dir.is_some();

        let output = staged.path().to_path_buf();
        let progress = self.progress.clone();
        let summary = tokio::task::spawn_blocking(move || {
            backend.compress(&request, &output, progress.as_ref())
        })
        .await
        .map_err(|e| join_error(staged.final_path(), e))??;
        drop(settings_dir);

        let archive_path = staged.commit()?;
        let archive_size = fs::metadata(&archive_path).at(&archive_path)?.len();

        let report = BackupReport {
            archive_path,
            format: job.format,
            level,
            files: summary.files,
            dirs: summary.dirs,
            bytes: summary.bytes,
            archive_size,
            settings_included,
            duration: started.elapsed(),
        };
        info!(
            "Backup complete: {} ({} files, {} bytes -> {} bytes)",
            report.archive_path.display(),
            report.files,
            report.bytes,
            report.archive_size
        );
        Ok(report)
    }

    /// Extract the archive `job.source_root` over `job.destination`.
    ///
    /// The outer error is a validation failure; the service was not touched.
    pub async fn run_restore(&self, job: &ArchiveJob) -> Result<JobOutcome<RestoreReport>> {
        let (_, backend) = self.resolve_backend(job)?;
        let meta = fs::metadata(&job.source_root)
            .map_err(|e| Error::source_path(&job.source_root, format!("cannot be read: {}", e)))?;
        if !meta.is_file() {
            return Err(Error::source_path(&job.source_root, "is not a file"));
        }

        info!(
            "Restoring {} into {}",
            job.source_root.display(),
            job.destination.display()
        );
        let outcome = self.guard().run(|| self.restore(job, backend)).await;
        Ok(outcome)
    }

    async fn restore(&self, job: &ArchiveJob, backend: Arc<dyn ArchiveBackend>) -> Result<RestoreReport> {
        let started = Instant::now();
        if restore_incomplete(&job.destination) {
            warn!(
                "{} is marked as an interrupted restore; it will be overwritten",
                job.destination.display()
            );
        }

        let staging = RestoreStaging::create(&job.destination)?;
        let staged_dir = staging.path().to_path_buf();
        let archive = job.source_root.clone();
        let progress = self.progress.clone();
        let summary = tokio::task::spawn_blocking(move || {
            backend.extract(&archive, &staged_dir, progress.as_ref())
        })
        .await
        .map_err(|e| join_error(&job.source_root, e))??;

        let promoted = staging.promote()?;
        let settings_imported = self.import_settings(&job.destination).await?;

        let report = RestoreReport {
            archive_path: job.source_root.clone(),
            destination: job.destination.clone(),
            files: summary.files,
            dirs: summary.dirs,
            bytes: summary.bytes,
            replaced: promoted.replaced,
            settings_imported,
            duration: started.elapsed(),
        };
        info!(
            "Restore complete: {} files, {} bytes into {}",
            report.files,
            report.bytes,
            report.destination.display()
        );
        Ok(report)
    }

    /// Import and remove a restored settings snapshot, if there is one and
    /// a store is configured to take it
    async fn import_settings(&self, destination: &Path) -> Result<bool> {
        let file = destination.join(SETTINGS_ENTRY_NAME);
        if !file.is_file() {
            return Ok(false);
        }

        if !self.settings.is_enabled() {
            debug!(
                "No settings store configured; leaving {} in place",
                file.display()
            );
            return Ok(false);
        }

        let imported = self.settings.import(&file).await;
        fs::remove_file(&file).at(&file)?;
        imported?;
        debug!("Settings snapshot imported and removed");
        Ok(true)
    }
}
