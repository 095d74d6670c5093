//! zip container: Stored at level 0, Deflate at 1-9.
//!
//! Modification times are stored as DOS local time (2-second resolution,
//! 1980 onwards). Unix permission bits are stored and restored on Unix.

use super::{
    create_parent, safe_join, set_mode, set_mtime, ArchiveBackend, ArchiveSummary,
    CompressRequest, DeferredDirs,
};
use crate::progress::{Phase, ProgressReporter, ProgressTracker};
use crate::walk::{walk_source, EntryKind};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::{ArchiveFormat, CompressionLevel};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Entries of at least this size need zip64 headers
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipBackend;

impl ZipBackend {
    fn options(level: CompressionLevel) -> SimpleFileOptions {
        if level.is_store() {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(level.get() as i64))
        }
    }
}

fn to_zip_time(time: SystemTime) -> ::zip::DateTime {
    let local: DateTime<Local> = time.into();
    ::zip::DateTime::from_date_and_time(
        local.year().clamp(1980, 2107) as u16,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .unwrap_or_default()
}

fn from_zip_time(time: ::zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?
        .and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(SystemTime::from)
}

impl ArchiveBackend for ZipBackend {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn compress(
        &self,
        request: &CompressRequest,
        output: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let plan = walk_source(&request.source_root, &request.filter)?;
        let base = Self::options(request.level);
        let zip_err = |e: ::zip::result::ZipError| Error::archive(output, e);

        let file = File::create(output).at(output)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let mut tracker = ProgressTracker::start(
            progress,
            Phase::Archiving,
            Some(plan.total_files + request.extras.len() as u64),
            Some(plan.total_bytes),
        );
        let mut summary = ArchiveSummary::default();

        for entry in &plan.entries {
            let mut options = base.last_modified_time(to_zip_time(entry.mtime));
            if let Some(mode) = entry.mode {
                options = options.unix_permissions(mode);
            }

            match entry.kind {
                EntryKind::Dir => {
                    zip.add_directory(entry.rel_path.as_str(), options)
                        .map_err(zip_err)?;
                    summary.dirs += 1;
                }
                EntryKind::File => {
                    let options = options.large_file(entry.size >= ZIP64_THRESHOLD);
                    zip.start_file(entry.rel_path.as_str(), options)
                        .map_err(zip_err)?;
                    let mut reader =
                        BufReader::new(File::open(&entry.abs_path).at(&entry.abs_path)?);
                    let copied = io::copy(&mut reader, &mut zip).at(&entry.abs_path)?;
                    summary.files += 1;
                    summary.bytes += copied;
                    tracker.file_done(copied);
                }
            }
        }

        for extra in &request.extras {
            let meta = fs::metadata(&extra.path).at(&extra.path)?;
            let options = base
                .last_modified_time(to_zip_time(meta.modified().at(&extra.path)?))
                .large_file(meta.len() >= ZIP64_THRESHOLD);
            zip.start_file(extra.name.as_str(), options).map_err(zip_err)?;
            let mut reader = BufReader::new(File::open(&extra.path).at(&extra.path)?);
            let copied = io::copy(&mut reader, &mut zip).at(&extra.path)?;
            summary.files += 1;
            summary.bytes += copied;
            tracker.file_done(copied);
        }

        let mut writer = zip.finish().map_err(zip_err)?;
        writer.flush().at(output)?;
        writer
            .into_inner()
            .map_err(|e| Error::io(output, e.into_error()))?
            .sync_all()
            .at(output)?;

        tracker.complete();
        debug!("zip: wrote {} files to {}", summary.files, output.display());
        Ok(summary)
    }

    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let zip_err = |e: ::zip::result::ZipError| Error::archive(archive, e);
        let file = File::open(archive).at(archive)?;
        let mut zip = ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

        let file_count = zip.file_names().filter(|n| !n.ends_with('/')).count() as u64;
        let mut tracker = ProgressTracker::start(progress, Phase::Extracting, Some(file_count), None);
        let mut deferred = DeferredDirs::default();
        let mut summary = ArchiveSummary::default();

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(zip_err)?;
            let name = entry
                .enclosed_name()
                .ok_or_else(|| {
                    Error::archive(archive, format!("unsafe entry path '{}'", entry.name()))
                })?
                .to_string_lossy()
                .into_owned();
            let target = safe_join(destination, &name)?;
            let modified: Option<::zip::DateTime> = entry.last_modified().into();
            let mtime = modified.and_then(from_zip_time);
            let mode = entry.unix_mode();

            if entry.is_dir() {
                fs::create_dir_all(&target).at(&target)?;
                deferred.push(target, mtime, mode);
                summary.dirs += 1;
                continue;
            }

            create_parent(&target)?;
            let mut out = BufWriter::new(File::create(&target).at(&target)?);
            let copied = io::copy(&mut entry, &mut out).at(&target)?;
            out.flush().at(&target)?;
            drop(out);

            if let Some(mtime) = mtime {
                set_mtime(&target, mtime)?;
            }
            if let Some(mode) = mode {
                set_mode(&target, mode)?;
            }

            summary.files += 1;
            summary.bytes += copied;
            tracker.file_done(copied);
        }

        deferred.apply()?;
        tracker.complete();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zip_time_round_trip_within_two_seconds() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let back = from_zip_time(to_zip_time(t)).unwrap();
        let diff = match back.duration_since(t) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };
        assert!(diff <= Duration::from_secs(2));
    }

    #[test]
    fn test_pre_1980_clamps() {
        let dt = to_zip_time(SystemTime::UNIX_EPOCH);
        assert_eq!(dt.year(), 1980);
    }
}
