//! Rename-on-success staging for backup archives and restored trees.
//!
//! A backup is written to a hidden temporary file next to its final name and
//! renamed into place only after the backend finished. A restore is
//! extracted into a hidden sibling directory of the destination and promoted
//! with renames; while promotion runs the destination carries
//! [`INCOMPLETE_MARKER`].

use chrono::{DateTime, Local};
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::ArchiveFormat;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::{TempDir, TempPath};
use tracing::{debug, info, warn};

/// Prefix of every backup archive name
pub const BACKUP_PREFIX: &str = "plex_backup_";

/// Present in a destination while a restore is being promoted into it
pub const INCOMPLETE_MARKER: &str = ".plexsafe-restore-incomplete";

/// `plex_backup_<YYYYmmddHHMMSS>.<ext>`
pub fn backup_file_name(format: ArchiveFormat, timestamp: &DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        BACKUP_PREFIX,
        timestamp.format("%Y%m%d%H%M%S"),
        format.extension()
    )
}

/// The lexicographically greatest backup of `format` in `dir`.
pub fn find_latest_backup(dir: &Path, format: ArchiveFormat) -> Result<PathBuf> {
    let suffix = format!(".{}", format.extension());
    let read = fs::read_dir(dir)
        .map_err(|e| Error::source_path(dir, format!("backup directory unreadable: {}", e)))?;

    let mut latest: Option<String> = None;
    for entry in read {
        let entry = entry.at(dir)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(&suffix) {
            continue;
        }
        if !entry.file_type().at(&entry.path())?.is_file() {
            continue;
        }
        match &latest {
            Some(current) if *current >= name => {}
            _ => latest = Some(name),
        }
    }

    latest.map(|name| dir.join(name)).ok_or_else(|| {
        Error::source_path(dir, format!("no {}*{} backups found", BACKUP_PREFIX, suffix))
    })
}

/// A backup archive being written.
///
/// Dropping it without [`StagedArchive::commit`] deletes the partial file.
#[derive(Debug)]
pub struct StagedArchive {
    temp: TempPath,
    final_path: PathBuf,
}

impl StagedArchive {
    /// Reserve `<dir>/<file_name>` and create the temporary file beside it.
    ///
    /// Fails with an `AlreadyExists` IO error if the final name is taken.
    pub fn create(dir: &Path, file_name: &str) -> Result<Self> {
        fs::create_dir_all(dir).at(dir)?;
        let final_path = dir.join(file_name);
        if final_path.exists() {
            return Err(Error::io(
                &final_path,
                std::io::Error::new(IoErrorKind::AlreadyExists, "backup archive already exists"),
            ));
        }

        // keep the real extension last; the rar tool appends one otherwise
        let suffix = match file_name.find('.') {
            Some(idx) => format!(".partial{}", &file_name[idx..]),
            None => ".partial".to_string(),
        };
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}", BACKUP_PREFIX))
            .suffix(&suffix)
            .tempfile_in(dir)
            .at(dir)?
            .into_temp_path();

        debug!("Staging backup at {}", temp.display());
        Ok(Self { temp, final_path })
    }

    /// Where the backend writes
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Move the finished archive to its final name without overwriting.
    pub fn commit(self) -> Result<PathBuf> {
        let Self { temp, final_path } = self;
        temp.persist_noclobber(&final_path)
            .map_err(|e| Error::io(&final_path, e.error))?;
        info!("Archive written to {}", final_path.display());
        Ok(final_path)
    }
}

/// Counts from promoting a staged restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromoteSummary {
    /// Staged entries moved into place
    pub moved: u64,
    /// Existing destination entries removed to make room
    pub replaced: u64,
}

/// A restore being extracted.
///
/// Dropping it removes anything still staged.
#[derive(Debug)]
pub struct RestoreStaging {
    dir: TempDir,
    destination: PathBuf,
}

impl RestoreStaging {
    /// Create the destination if needed and a staging directory beside it.
    pub fn create(destination: &Path) -> Result<Self> {
        fs::create_dir_all(destination).at(destination)?;
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(destination);

        let dir = tempfile::Builder::new()
            .prefix(".plexsafe-restore-")
            .tempdir_in(parent)
            .at(parent)?;
        debug!("Staging restore at {}", dir.path().display());
        Ok(Self {
            dir,
            destination: destination.to_path_buf(),
        })
    }

    /// Where the backend extracts
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Move every staged entry into the destination.
    ///
    /// Directories present on both sides are merged; any other existing
    /// entry at a staged path is replaced. Destination entries with no staged
    /// counterpart are left alone. The incomplete marker is removed only when
    /// every entry was promoted.
    pub fn promote(self) -> Result<PromoteSummary> {
        let marker = self.destination.join(INCOMPLETE_MARKER);
        fs::write(&marker, b"restore promotion in progress\n").at(&marker)?;

        let mut summary = PromoteSummary::default();
        merge_dir(self.dir.path(), &self.destination, &mut summary)?;

        fs::remove_file(&marker).at(&marker)?;
        info!(
            "Restored {} entries into {} ({} replaced)",
            summary.moved,
            self.destination.display(),
            summary.replaced
        );
        Ok(summary)
    }
}

fn merge_dir(staged: &Path, target: &Path, summary: &mut PromoteSummary) -> Result<()> {
    let mut entries = fs::read_dir(staged)
        .at(staged)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .at(staged)?;
    entries.sort();

    for from in entries {
        let Some(name) = from.file_name() else {
            continue;
        };
        let to = target.join(name);
        let from_is_dir = fs::symlink_metadata(&from).at(&from)?.is_dir();

        match fs::symlink_metadata(&to) {
            Ok(existing) if existing.is_dir() && from_is_dir => {
                let mtime = dir_mtime(&from)?;
                merge_dir(&from, &to, summary)?;
                if let Some(mtime) = mtime {
                    crate::backend::set_mtime(&to, mtime)?;
                }
                continue;
            }
            Ok(existing) => {
                if existing.is_dir() {
                    fs::remove_dir_all(&to).at(&to)?;
                } else {
                    fs::remove_file(&to).at(&to)?;
                }
                summary.replaced += 1;
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&to, e)),
        }

        if let Err(e) = fs::rename(&from, &to) {
            warn!("Failed to move {} into place: {}", from.display(), e);
            return Err(Error::io(&to, e));
        }
        summary.moved += 1;
    }
    Ok(())
}

fn dir_mtime(path: &Path) -> Result<Option<SystemTime>> {
    Ok(fs::metadata(path).at(path)?.modified().ok())
}

/// Whether a previous restore into `destination` was interrupted
pub fn restore_incomplete(destination: &Path) -> bool {
    destination.join(INCOMPLETE_MARKER).exists()
}
