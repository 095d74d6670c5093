//! Archive container backends.
//!
//! Each [`ArchiveFormat`] has exactly one [`ArchiveBackend`]. Backends are
//! synchronous; the engine runs them on a blocking worker.

mod rar;
mod sevenz;
mod targz;
mod zip;

pub use self::rar::RarBackend;
pub use self::sevenz::SevenZipBackend;
pub use self::targz::TarGzBackend;
pub use self::zip::ZipBackend;

use crate::filters::PathFilter;
use crate::progress::ProgressReporter;
use plexsafe_core::error::{Error, IoContext, Result};
use plexsafe_core::{ArchiveFormat, CompressionLevel};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// A file added at the archive root after the tree, never filtered.
#[derive(Debug, Clone)]
pub struct ExtraEntry {
    /// Entry name inside the archive
    pub name: String,
    /// File supplying the content
    pub path: PathBuf,
}

/// Inputs of one compress call.
#[derive(Debug, Clone)]
pub struct CompressRequest {
    pub source_root: PathBuf,
    pub filter: PathFilter,
    pub level: CompressionLevel,
    pub extras: Vec<ExtraEntry>,
}

impl CompressRequest {
    pub fn new(source_root: impl Into<PathBuf>, filter: PathFilter, level: CompressionLevel) -> Self {
        Self {
            source_root: source_root.into(),
            filter,
            level,
            extras: Vec::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.extras.push(ExtraEntry {
            name: name.into(),
            path: path.into(),
        });
        self
    }
}

/// Counts reported by a backend after it finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

/// One archive container format.
pub trait ArchiveBackend: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    /// Fails with `BackendUnavailable` when an external tool is missing
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Walk `request.source_root` through its filter and write every
    /// included entry, then the extras, into `output`.
    ///
    /// `output` may already exist as an empty placeholder and is overwritten.
    fn compress(
        &self,
        request: &CompressRequest,
        output: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary>;

    /// Recreate every entry of `archive` under `destination`.
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary>;
}

/// Format to backend lookup.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<ArchiveFormat, Arc<dyn ArchiveBackend>>,
}

impl BackendRegistry {
    /// All four built-in backends
    pub fn standard() -> Self {
        Self::empty()
            .with_backend(Arc::new(ZipBackend))
            .with_backend(Arc::new(SevenZipBackend))
            .with_backend(Arc::new(RarBackend::new()))
            .with_backend(Arc::new(TarGzBackend))
    }

    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register `backend` for its format, replacing any previous one
    pub fn with_backend(mut self, backend: Arc<dyn ArchiveBackend>) -> Self {
        self.backends.insert(backend.format(), backend);
        self
    }

    pub fn get(&self, format: ArchiveFormat) -> Result<Arc<dyn ArchiveBackend>> {
        self.backends
            .get(&format)
            .cloned()
            .ok_or_else(|| Error::backend_unavailable(format, "no backend registered"))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolve an archive entry name under `destination`, rejecting absolute
/// names and `..` segments.
pub(crate) fn safe_join(destination: &Path, name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    let unsafe_name = || Error::archive(destination, format!("unsafe entry path '{}'", name));

    if normalized.starts_with('/') || normalized.contains(':') {
        return Err(unsafe_name());
    }

    let mut path = destination.to_path_buf();
    let mut depth = 0;
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(unsafe_name()),
            s => {
                path.push(s);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(unsafe_name());
    }
    Ok(path)
}

/// Directory metadata applied after all children are written, since writing
/// a child updates its parent's modification time.
#[derive(Debug, Default)]
pub(crate) struct DeferredDirs {
    dirs: Vec<(PathBuf, Option<SystemTime>, Option<u32>)>,
}

impl DeferredDirs {
    pub(crate) fn push(&mut self, path: PathBuf, mtime: Option<SystemTime>, mode: Option<u32>) {
        self.dirs.push((path, mtime, mode));
    }

    /// Deepest directories first
    pub(crate) fn apply(mut self) -> Result<()> {
        self.dirs
            .sort_by(|a, b| b.0.components().count().cmp(&a.0.components().count()));
        for (path, mtime, mode) in self.dirs {
            if let Some(mtime) = mtime {
                set_mtime(&path, mtime)?;
            }
            if let Some(mode) = mode {
                set_mode(&path, mode)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn set_mtime(path: &Path, mtime: SystemTime) -> Result<()> {
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(mtime)).at(path)
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).at(path)
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).at(parent),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join_accepts_relative() {
        let dest = Path::new("/restore");
        assert_eq!(
            safe_join(dest, "a/b/c.txt").unwrap(),
            PathBuf::from("/restore/a/b/c.txt")
        );
        assert_eq!(
            safe_join(dest, r"a\b\").unwrap(),
            PathBuf::from("/restore/a/b")
        );
        assert_eq!(safe_join(dest, "./x").unwrap(), PathBuf::from("/restore/x"));
    }

    #[test]
    fn test_safe_join_rejects_escape() {
        let dest = Path::new("/restore");
        assert!(safe_join(dest, "../etc/passwd").is_err());
        assert!(safe_join(dest, "a/../../b").is_err());
        assert!(safe_join(dest, "/etc/passwd").is_err());
        assert!(safe_join(dest, "C:/Windows").is_err());
        assert!(safe_join(dest, "").is_err());
    }

    #[test]
    fn test_registry_lookup_and_override() {
        let registry = BackendRegistry::standard();
        for format in ArchiveFormat::ALL {
            assert_eq!(registry.get(format).unwrap().format(), format);
        }

        let err = BackendRegistry::empty()
            .get(ArchiveFormat::Zip)
            .err()
            .unwrap();
        assert_eq!(err.kind(), plexsafe_core::ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_deferred_dirs_restore_mtime() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("d");
        fs::create_dir(&dir).unwrap();
        let old = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);

        let mut deferred = DeferredDirs::default();
        deferred.push(dir.clone(), Some(old), None);
        fs::write(dir.join("child"), "x").unwrap();
        deferred.apply().unwrap();

        assert_eq!(fs::metadata(&dir).unwrap().modified().unwrap(), old);
    }
}
