//! rar container through the external `rar` tool.
//!
//! rar is a proprietary format with no writer library, so the tool does the
//! traversal. Excluded paths and symbolic links found by the walk are handed
//! to it as an exclusion list, so it archives the same entries as the other
//! backends. Entry order and timestamp fidelity are whatever the tool
//! produces; nothing is post-processed.

use super::{ArchiveBackend, ArchiveSummary, CompressRequest};
use crate::progress::{Phase, ProgressReporter, ProgressTracker};
use crate::walk::{walk_source, EntryKind};
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::utils::command_text;
use plexsafe_core::ArchiveFormat;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Binaries able to create rar archives
const COMPRESSORS: &[&str] = &["rar"];
/// Binaries able to extract rar archives
const EXTRACTORS: &[&str] = &["rar", "unrar"];

#[derive(Debug, Clone)]
pub struct RarBackend {
    compressors: Vec<String>,
    extractors: Vec<String>,
}

impl RarBackend {
    pub fn new() -> Self {
        Self::with_binaries(
            COMPRESSORS.iter().map(|s| s.to_string()).collect(),
            EXTRACTORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Use specific binary names, searched on PATH in order
    pub fn with_binaries(compressors: Vec<String>, extractors: Vec<String>) -> Self {
        Self {
            compressors,
            extractors,
        }
    }

    fn find(candidates: &[String], purpose: &str) -> Result<PathBuf> {
        candidates
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                Error::backend_unavailable(
                    ArchiveFormat::Rar,
                    format!(
                        "no {} found on PATH (looked for: {})",
                        purpose,
                        candidates.join(", ")
                    ),
                )
            })
    }

    fn run(binary: &Path, args: &[&str], cwd: Option<&Path>, archive: &Path) -> Result<()> {
        debug!("Running: {} {}", binary.display(), args.join(" "));
        let mut command = Command::new(binary);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::backend_unavailable(ArchiveFormat::Rar, e.to_string())
            } else {
                Error::io(binary, e)
            }
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::archive(
                archive,
                format!(
                    "{} exited with {:?}: {}",
                    binary.display(),
                    output.status.code(),
                    command_text(&output)
                ),
            ))
        }
    }
}

impl Default for RarBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// rar exclusion masks for each excluded path: the path itself and, for
/// directories, everything below it
fn exclusion_masks(excluded: &[(String, EntryKind)]) -> Vec<String> {
    let sep = std::path::MAIN_SEPARATOR;
    let mut masks = Vec::new();
    for (path, kind) in excluded {
        let native = path.replace('/', &sep.to_string());
        if *kind == EntryKind::Dir {
            masks.push(format!("{}{}*", native, sep));
        }
        masks.push(native);
    }
    masks
}

impl ArchiveBackend for RarBackend {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    fn check_available(&self) -> Result<()> {
        Self::find(&self.compressors, "rar compressor").map(|_| ())
    }

    fn compress(
        &self,
        request: &CompressRequest,
        output: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let binary = Self::find(&self.compressors, "rar compressor")?;
        let plan = walk_source(&request.source_root, &request.filter)?;
        let mut tracker = ProgressTracker::start(
            progress,
            Phase::Archiving,
            Some(plan.total_files + request.extras.len() as u64),
            Some(plan.total_bytes),
        );

        // rar refuses to update a file that is not yet a rar archive
        if output.exists() {
            fs::remove_file(output).at(output)?;
        }

        let scratch = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let list_path = scratch.path().join("exclude.lst");
        let mut list = fs::File::create(&list_path).at(&list_path)?;
        for mask in exclusion_masks(&plan.excluded) {
            writeln!(list, "{}", mask).at(&list_path)?;
        }
        drop(list);

        let method = format!("-m{}", request.level.rar_method());
        let exclude = format!("-x@{}", list_path.display());
        let output_arg = output.to_string_lossy();

        if !plan.entries.is_empty() {
            Self::run(
                &binary,
                &["a", "-r", &method, "-idq", "-y", &exclude, "--", &output_arg, "*"],
                Some(&request.source_root),
                output,
            )?;
        }

        for extra in &request.extras {
            let staged = scratch.path().join(&extra.name);
            fs::copy(&extra.path, &staged).at(&extra.path)?;
            let staged_arg = staged.to_string_lossy();
            Self::run(
                &binary,
                &["a", "-ep1", &method, "-idq", "-y", "--", &output_arg, &staged_arg],
                None,
                output,
            )?;
        }

        if !output.exists() {
            return Err(Error::archive(output, "nothing to archive"));
        }

        let summary = ArchiveSummary {
            files: plan.total_files + request.extras.len() as u64,
            dirs: plan.dir_count(),
            bytes: plan.total_bytes,
        };
        for entry in plan.files() {
            tracker.file_done(entry.size);
        }
        tracker.complete();
        info!("rar: archived {} files into {}", summary.files, output.display());
        Ok(summary)
    }

    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        let binary = Self::find(&self.extractors, "rar extractor")?;
        let mut tracker = ProgressTracker::start(progress, Phase::Extracting, None, None);

        fs::create_dir_all(destination).at(destination)?;
        let archive_arg = archive.to_string_lossy();
        let dest_arg = format!(
            "{}{}",
            destination.display(),
            std::path::MAIN_SEPARATOR
        );
        Self::run(
            &binary,
            &["x", "-o+", "-idq", "-y", "--", &archive_arg, &dest_arg],
            None,
            archive,
        )?;

        let mut summary = ArchiveSummary::default();
        for entry in WalkDir::new(destination).min_depth(1) {
            let entry = entry.map_err(|e| Error::archive(destination, e))?;
            if entry.file_type().is_dir() {
                summary.dirs += 1;
            } else {
                let size = entry
                    .metadata()
                    .map_err(|e| Error::archive(entry.path(), e))?
                    .len();
                summary.files += 1;
                summary.bytes += size;
                tracker.file_done(size);
            }
        }
        tracker.complete();
        Ok(summary)
    }
}
