//! 7z container: Copy at level 0, LZMA2 preset 1-9.
//!
//! Modification times are stored and restored for files and directories.
//! Permissions are not recorded by the format.

use super::{
    create_parent, safe_join, set_mtime, ArchiveBackend, ArchiveSummary, CompressRequest,
    DeferredDirs,
};
use crate::progress::{Phase, ProgressReporter, ProgressTracker};
use crate::walk::{walk_source, EntryKind};
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::{ArchiveFormat, CompressionLevel};
use sevenz_rust2::encoder_options::Lzma2Options;
use sevenz_rust2::{
    ArchiveEntry, ArchiveReader, ArchiveWriter, EncoderConfiguration, EncoderMethod, Password,
};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct SevenZipBackend;

impl SevenZipBackend {
    fn method(level: CompressionLevel) -> EncoderConfiguration {
        if level.is_store() {
            EncoderConfiguration::new(EncoderMethod::COPY)
        } else {
            EncoderConfiguration::new(EncoderMethod::LZMA2)
                .with_options(Lzma2Options::from_level(level.get()).into())
        }
    }
}

/// Empty files go in as empty-stream entries; the Copy coder cannot
/// write a zero-length packed stream.
fn push_file(
    writer: &mut ArchiveWriter<File>,
    entry: ArchiveEntry,
    path: &Path,
    size: u64,
    output: &Path,
) -> Result<()> {
    if size == 0 {
        writer
            .push_archive_entry::<File>(entry, None)
            .map_err(|e| Error::archive(output, e))?;
        return Ok(());
    }
    let source = File::open(path).at(path)?;
    writer
        .push_archive_entry(entry, Some(BufReader::new(source)))
        .map_err(|e| Error::archive(output, e))?;
    Ok(())
}

impl ArchiveBackend for SevenZipBackend {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn compress(
        &self,
        request: &CompressRequest,
        output: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let plan = walk_source(&request.source_root, &request.filter)?;

        let file = File::create(output).at(output)?;
        let mut writer = ArchiveWriter::new(file).map_err(|e| Error::archive(output, e))?;
        writer.set_content_methods(vec![Self::method(request.level)]);

        let mut tracker = ProgressTracker::start(
            progress,
            Phase::Archiving,
            Some(plan.total_files + request.extras.len() as u64),
            Some(plan.total_bytes),
        );
        let mut summary = ArchiveSummary::default();

        for entry in &plan.entries {
            let archive_entry = ArchiveEntry::from_path(&entry.abs_path, entry.rel_path.clone());
            match entry.kind {
                EntryKind::Dir => {
                    writer
                        .push_archive_entry::<File>(archive_entry, None)
                        .map_err(|e| Error::archive(output, e))?;
                    summary.dirs += 1;
                }
                EntryKind::File => {
                    push_file(&mut writer, archive_entry, &entry.abs_path, entry.size, output)?;
                    summary.files += 1;
                    summary.bytes += entry.size;
                    tracker.file_done(entry.size);
                }
            }
        }

        for extra in &request.extras {
            let size = fs::metadata(&extra.path).at(&extra.path)?.len();
            let archive_entry = ArchiveEntry::from_path(&extra.path, extra.name.clone());
            push_file(&mut writer, archive_entry, &extra.path, size, output)?;
            summary.files += 1;
            summary.bytes += size;
            tracker.file_done(size);
        }

        writer
            .finish()
            .map_err(|e| Error::archive(output, e))?
            .sync_all()
            .at(output)?;

        tracker.complete();
        debug!("7z: wrote {} files to {}", summary.files, output.display());
        Ok(summary)
    }

    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let file = File::open(archive).at(archive)?;
        let mut reader =
            ArchiveReader::new(file, Password::empty()).map_err(|e| Error::archive(archive, e))?;

        let file_count = reader
            .archive()
            .files
            .iter()
            .filter(|f| !f.is_directory())
            .count() as u64;
        let mut tracker =
            ProgressTracker::start(progress, Phase::Extracting, Some(file_count), None);
        let mut deferred = DeferredDirs::default();
        let mut summary = ArchiveSummary::default();
        let mut failure: Option<Error> = None;

        let mut write_entry = |entry: &ArchiveEntry, data: &mut dyn io::Read| -> Result<()> {
            let target = safe_join(destination, entry.name())?;
            let mtime = entry
                .has_last_modified_date
                .then(|| SystemTime::from(entry.last_modified_date));

            if entry.is_directory() {
                fs::create_dir_all(&target).at(&target)?;
                deferred.push(target, mtime, None);
                summary.dirs += 1;
                return Ok(());
            }

            create_parent(&target)?;
            let mut out = BufWriter::new(File::create(&target).at(&target)?);
            let copied = io::copy(data, &mut out).at(&target)?;
            out.flush().at(&target)?;
            drop(out);

            if let Some(mtime) = mtime {
                set_mtime(&target, mtime)?;
            }
            summary.files += 1;
            summary.bytes += copied;
            tracker.file_done(copied);
            Ok(())
        };

        let walked = reader.for_each_entries(|entry, data| match write_entry(entry, data) {
            Ok(()) => Ok(true),
            Err(e) => {
                failure = Some(e);
                Ok(false)
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        walked.map_err(|e| Error::archive(archive, e))?;

        deferred.apply()?;
        tracker.complete();
        Ok(summary)
    }
}
