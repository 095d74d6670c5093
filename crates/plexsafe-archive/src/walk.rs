//! Deterministic traversal of a backup source tree.

use crate::filters::PathFilter;
use plexsafe_core::error::{Error, IoContext, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// One included filesystem entry.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Path relative to the source root, `/`-separated
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub kind: EntryKind,
    /// Byte length (0 for directories)
    pub size: u64,
    pub mtime: SystemTime,
    /// Unix permission bits, where the platform has them
    pub mode: Option<u32>,
}

impl SourceEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Result of walking a source tree through a filter.
#[derive(Debug, Clone, Default)]
pub struct WalkPlan {
    /// Included entries, parents before children, siblings by file name
    pub entries: Vec<SourceEntry>,
    /// Excluded entries at the point they were cut off (a pruned directory
    /// is listed once, its contents are not), followed by skipped symbolic
    /// links
    pub excluded: Vec<(String, EntryKind)>,
    pub total_files: u64,
    pub total_bytes: u64,
}

impl WalkPlan {
    pub fn files(&self) -> impl Iterator<Item = &SourceEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn dir_count(&self) -> u64 {
        self.entries.iter().filter(|e| e.is_dir()).count() as u64
    }
}

/// Walk `root` depth-first in lexicographic order, pruning excluded
/// directories without descending into them.
///
/// Symbolic links are not followed and not archived; they are recorded in
/// `excluded` after the filtered entries, as directories when they point
/// at one.
pub fn walk_source(root: &Path, filter: &PathFilter) -> Result<WalkPlan> {
    let root_meta = std::fs::metadata(root)
        .map_err(|e| Error::source_path(root, format!("cannot be read: {}", e)))?;
    if !root_meta.is_dir() {
        return Err(Error::source_path(root, "is not a directory"));
    }

    let mut plan = WalkPlan::default();
    let mut excluded = Vec::new();
    let mut links = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if filter.should_include_path(rel) {
                return true;
            }
            let kind = if entry.file_type().is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            excluded.push((relative_name(rel), kind));
            false
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(io) => Error::io(path, io),
                None => Error::archive(path, "filesystem loop detected"),
            }
        })?;

        if entry.depth() == 0 {
            continue;
        }

        let file_type = entry.file_type();
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::archive(entry.path(), e))?;

        if file_type.is_symlink() {
            warn!("Skipping symbolic link {}", entry.path().display());
            let kind = if entry.path().is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            links.push((relative_name(rel), kind));
            continue;
        }
        let rel_path = rel
            .to_str()
            .map(|s| s.replace('\\', "/"))
            .ok_or_else(|| Error::archive(entry.path(), "file name is not valid UTF-8"))?;

        let meta = entry.metadata().map_err(|e| {
            let path = entry.path().to_path_buf();
            match e.into_io_error() {
                Some(io) => Error::io(path, io),
                None => Error::archive(path, "metadata unavailable"),
            }
        })?;
        let mtime = meta.modified().at(entry.path())?;

        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        let size = if kind == EntryKind::File { meta.len() } else { 0 };

        if kind == EntryKind::File {
            plan.total_files += 1;
            plan.total_bytes += size;
        }

        plan.entries.push(SourceEntry {
            rel_path,
            abs_path: entry.path().to_path_buf(),
            kind,
            size,
            mtime,
            mode: unix_mode(&meta),
        });
    }

    excluded.extend(links);
    plan.excluded = excluded;
    debug!(
        "Walked {}: {} files, {} bytes, {} excluded",
        root.display(),
        plan.total_files,
        plan.total_bytes,
        plan.excluded.len()
    );
    Ok(plan)
}

fn relative_name(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(unix)]
fn unix_mode(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}
