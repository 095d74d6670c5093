//! Mock service controllers, settings stores and backends

use async_trait::async_trait;
use plexsafe_archive::backend::{ArchiveBackend, ArchiveSummary, CompressRequest};
use plexsafe_archive::progress::{ProgressEvent, ProgressReporter};
use plexsafe_core::error::{Error, Result, ServiceAction};
use plexsafe_core::settings::SettingsStore;
use plexsafe_core::ArchiveFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Service controller that counts calls and fails on request
#[derive(Debug, Default)]
pub struct CountingService {
    stops: AtomicUsize,
    starts: AtomicUsize,
    fail_stop: bool,
    fail_start: bool,
}

impl CountingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl plexsafe_core::service::ServiceControl for CountingService {
    fn name(&self) -> &str {
        "counting"
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(Error::service_control("counting", ServiceAction::Stop, "access denied"));
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(Error::service_control("counting", ServiceAction::Start, "timed out"));
        }
        Ok(())
    }
}

/// Settings store backed by an in-memory string
#[derive(Debug)]
pub struct MemorySettings {
    pub exported: String,
    pub imported: Mutex<Vec<String>>,
}

impl MemorySettings {
    pub fn new(exported: &str) -> Self {
        Self {
            exported: exported.to_string(),
            imported: Mutex::new(Vec::new()),
        }
    }

    pub fn imports(&self) -> Vec<String> {
        self.imported.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn export(&self, file: &Path) -> Result<()> {
        fs::write(file, &self.exported).map_err(|e| Error::io(file, e))
    }

    async fn import(&self, file: &Path) -> Result<()> {
        let content = fs::read_to_string(file).map_err(|e| Error::io(file, e))?;
        self.imported.lock().unwrap().push(content);
        Ok(())
    }
}

/// Backend that writes some bytes, then fails
#[derive(Debug)]
pub struct FailingBackend {
    pub format: ArchiveFormat,
}

impl ArchiveBackend for FailingBackend {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn compress(
        &self,
        _request: &CompressRequest,
        output: &Path,
        _progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        fs::write(output, b"half an archive").map_err(|e| Error::io(output, e))?;
        Err(Error::archive(output, "disk full"))
    }

    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        _progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        fs::write(destination.join("partial.txt"), b"partial").map_err(|e| Error::io(destination, e))?;
        Err(Error::archive(archive, "corrupt header"))
    }
}

/// Backend that is never available
#[derive(Debug)]
pub struct UnavailableBackend {
    pub format: ArchiveFormat,
}

impl ArchiveBackend for UnavailableBackend {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn check_available(&self) -> Result<()> {
        Err(Error::backend_unavailable(self.format, "tool missing"))
    }

    fn compress(
        &self,
        _request: &CompressRequest,
        output: &Path,
        _progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        Err(Error::archive(output, "unreachable"))
    }

    fn extract(
        &self,
        archive: &Path,
        _destination: &Path,
        _progress: &dyn ProgressReporter,
    ) -> Result<ArchiveSummary> {
        Err(Error::archive(archive, "unreachable"))
    }
}

/// Records every progress event
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ProgressEvent>>,
    pub finished: AtomicUsize,
}

impl RecordingProgress {
    pub fn phases(&self) -> Vec<plexsafe_archive::Phase> {
        let mut phases: Vec<_> = self.events.lock().unwrap().iter().map(|e| e.phase).collect();
        phases.dedup();
        phases
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listing of a directory, for asserting nothing was left behind
pub fn dir_names(dir: &Path) -> Vec<PathBuf> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .map(|r| r.map(|e| e.unwrap().file_name().into()).collect())
        .unwrap_or_default();
    names.sort();
    names
}
