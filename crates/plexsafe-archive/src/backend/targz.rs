//! tar wrapped in gzip, gzip level equal to the compression level.

use super::{safe_join, ArchiveBackend, ArchiveSummary, CompressRequest, DeferredDirs};
use crate::progress::{Phase, ProgressReporter, ProgressTracker};
use crate::walk::{walk_source, EntryKind};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::ArchiveFormat;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tar::{Archive, Builder as TarBuilder};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzBackend;

impl ArchiveBackend for TarGzBackend {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    fn compress(
        &self,
        request: &CompressRequest,
        output: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let plan = walk_source(&request.source_root, &request.filter)?;

        let file = File::create(output).at(output)?;
        let encoder = GzEncoder::new(
            BufWriter::new(file),
            Compression::new(request.level.get()),
        );
        let mut tar = TarBuilder::new(encoder);
        tar.follow_symlinks(false);

        let mut tracker = ProgressTracker::start(
            progress,
            Phase::Archiving,
            Some(plan.total_files + request.extras.len() as u64),
            Some(plan.total_bytes),
        );
        let mut summary = ArchiveSummary::default();

        for entry in &plan.entries {
            match entry.kind {
                EntryKind::Dir => {
                    tar.append_dir(&entry.rel_path, &entry.abs_path)
                        .at(&entry.abs_path)?;
                    summary.dirs += 1;
                }
                EntryKind::File => {
                    tar.append_path_with_name(&entry.abs_path, &entry.rel_path)
                        .at(&entry.abs_path)?;
                    summary.files += 1;
                    summary.bytes += entry.size;
                    tracker.file_done(entry.size);
                }
            }
        }

        for extra in &request.extras {
            tar.append_path_with_name(&extra.path, &extra.name)
                .at(&extra.path)?;
            let size = std::fs::metadata(&extra.path).at(&extra.path)?.len();
            summary.files += 1;
            summary.bytes += size;
            tracker.file_done(size);
        }

        let encoder = tar.into_inner().at(output)?;
        let mut writer = encoder.finish().at(output)?;
        writer.flush().at(output)?;
        writer
            .into_inner()
            .map_err(|e| Error::io(output, e.into_error()))?
            .sync_all()
            .at(output)?;

        tracker.complete();
        debug!("tar.gz: wrote {} files to {}", summary.files, output.display());
        Ok(summary)
    }

    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let file = File::open(archive).at(archive)?;
        let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_preserve_mtime(true);
        tar.set_preserve_permissions(true);
        tar.set_overwrite(true);

        // gzip streams have no index, so the file total is unknown up front
        let mut tracker = ProgressTracker::start(progress, Phase::Extracting, None, None);
        let mut deferred = DeferredDirs::default();
        let mut summary = ArchiveSummary::default();

        for entry in tar.entries().map_err(|e| Error::archive(archive, e))? {
            let mut entry = entry.map_err(|e| Error::archive(archive, e))?;
            let name = entry
                .path()
                .map_err(|e| Error::archive(archive, e))?
                .to_string_lossy()
                .into_owned();
            let target = safe_join(destination, &name)?;

            let header = entry.header();
            let entry_type = header.entry_type();
            let mtime = header
                .mtime()
                .ok()
                .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
            let mode = header.mode().ok();
            let size = header.size().unwrap_or(0);

            // directory modes wait for DeferredDirs so read-only parents
            // still accept their children
            if entry_type.is_dir() {
                fs::create_dir_all(&target).at(&target)?;
                deferred.push(target, mtime, mode);
                summary.dirs += 1;
                continue;
            }

            let unpacked = entry.unpack_in(destination).at(&target)?;
            if !unpacked {
                return Err(Error::archive(
                    archive,
                    format!("unsafe entry path '{}'", name),
                ));
            }

            if entry_type.is_file() {
                summary.files += 1;
                summary.bytes += size;
                tracker.file_done(size);
            }
        }

        deferred.apply()?;
        tracker.complete();
        Ok(summary)
    }
}
