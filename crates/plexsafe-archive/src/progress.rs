//! Progress reporting for backup and restore jobs.
//!
//! Backends and the engine emit [`ProgressEvent`]s; a [`ProgressReporter`]
//! decides how to present them.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Stage of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    StoppingService,
    Archiving,
    Extracting,
    RestartingService,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::StoppingService => "stopping service",
            Phase::Archiving => "archiving",
            Phase::Extracting => "extracting",
            Phase::RestartingService => "restarting service",
        };
        f.write_str(s)
    }
}

/// Snapshot of a job's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub files_done: u64,
    pub bytes_done: u64,
    /// Known only when the backend walked the tree itself
    pub total_files: Option<u64>,
    pub total_bytes: Option<u64>,
}

impl ProgressEvent {
    /// Event marking the start of a phase with nothing done yet
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase,
            files_done: 0,
            bytes_done: 0,
            total_files: None,
            total_bytes: None,
        }
    }
}

/// Receiver of progress events. Called from blocking worker threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);

    /// Called once when the job is over, successful or not
    fn finish(&self) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Writes progress to the log.
///
/// Phase changes and completion are logged at info, intermediate updates at
/// debug every `every` files.
#[derive(Debug)]
pub struct LogProgress {
    every: u64,
    last_phase: Mutex<Option<Phase>>,
}

impl LogProgress {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            last_phase: Mutex::new(None),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(500)
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        let changed = match self.last_phase.lock() {
            Ok(mut last) => last.replace(event.phase) != Some(event.phase),
            Err(_) => false,
        };

        if changed {
            info!(phase = %event.phase, total_files = ?event.total_files, "Phase started");
        } else if event.total_files == Some(event.files_done) {
            info!(
                phase = %event.phase,
                files = event.files_done,
                bytes = event.bytes_done,
                "Phase complete"
            );
        } else if event.files_done % self.every == 0 {
            debug!(
                phase = %event.phase,
                files = event.files_done,
                bytes = event.bytes_done,
                "Progress"
            );
        }
    }
}

/// Terminal progress: a bar while archiving or extracting, a spinner for
/// service phases and for archives of unknown size.
#[derive(Debug, Default)]
pub struct BarProgress {
    current: Mutex<Option<(Phase, ProgressBar)>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar_for(event: &ProgressEvent) -> ProgressBar {
        match (event.phase, event.total_files) {
            (Phase::Archiving | Phase::Extracting, Some(total)) => {
                let bar = ProgressBar::new(total);
                let template = if event.phase == Phase::Archiving {
                    "{msg} [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%)"
                } else {
                    "{msg} [{bar:40.green/blue}] {pos}/{len} files ({percent}%)"
                };
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(template)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar
            }
            _ => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        }
    }

    fn message(event: &ProgressEvent) -> String {
        match event.phase {
            Phase::StoppingService => "Stopping service...".to_string(),
            Phase::RestartingService => "Restarting service...".to_string(),
            Phase::Archiving => "Creating archive".to_string(),
            Phase::Extracting => "Extracting archive".to_string(),
        }
    }
}

impl ProgressReporter for BarProgress {
    fn report(&self, event: &ProgressEvent) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };

        let same_phase = matches!(&*current, Some((phase, _)) if *phase == event.phase);
        if !same_phase {
            if let Some((_, bar)) = current.take() {
                bar.finish_and_clear();
            }
            let bar = Self::bar_for(event);
            bar.set_message(Self::message(event));
            *current = Some((event.phase, bar));
        }

        if let Some((_, bar)) = current.as_ref() {
            if bar.length().is_some() {
                bar.set_position(event.files_done);
            } else if event.files_done > 0 {
                bar.set_message(format!(
                    "{} ({} files)",
                    Self::message(event),
                    event.files_done
                ));
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some((_, bar)) = current.take() {
                bar.finish_and_clear();
            }
        }
    }
}

/// Accumulates counts for one phase and forwards each update.
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    event: ProgressEvent,
}

impl<'a> ProgressTracker<'a> {
    /// Starts a phase and reports it
    pub fn start(
        reporter: &'a dyn ProgressReporter,
        phase: Phase,
        total_files: Option<u64>,
        total_bytes: Option<u64>,
    ) -> Self {
        let event = ProgressEvent {
            total_files,
            total_bytes,
            ..ProgressEvent::phase(phase)
        };
        reporter.report(&event);
        Self { reporter, event }
    }

    /// Records one finished file of `bytes` length
    pub fn file_done(&mut self, bytes: u64) {
        self.event.files_done += 1;
        self.event.bytes_done += bytes;
        self.reporter.report(&self.event);
    }

    pub fn files_done(&self) -> u64 {
        self.event.files_done
    }

    pub fn bytes_done(&self) -> u64 {
        self.event.bytes_done
    }

    /// Reports final counts, fixing unknown totals to the observed values
    pub fn complete(mut self) -> ProgressEvent {
        self.event.total_files = Some(self.event.files_done);
        self.event.total_bytes = Some(self.event.bytes_done);
        self.reporter.report(&self.event);
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_tracker_counts() {
        let recorder = Recorder::default();
        let mut tracker = ProgressTracker::start(&recorder, Phase::Archiving, Some(2), Some(30));
        tracker.file_done(10);
        tracker.file_done(20);
        let last = tracker.complete();

        assert_eq!(last.files_done, 2);
        assert_eq!(last.bytes_done, 30);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].files_done, 0);
        assert_eq!(events[0].total_files, Some(2));
        assert!(events.iter().all(|e| e.phase == Phase::Archiving));
    }

    #[test]
    fn test_unknown_totals_resolved_on_complete() {
        let mut tracker = ProgressTracker::start(&NullProgress, Phase::Extracting, None, None);
        tracker.file_done(5);
        let last = tracker.complete();
        assert_eq!(last.total_files, Some(1));
        assert_eq!(last.total_bytes, Some(5));
    }

    #[test]
    fn test_bar_progress_lifecycle() {
        let progress = BarProgress::new();
        progress.report(&ProgressEvent::phase(Phase::StoppingService));
        let mut tracker = ProgressTracker::start(&progress, Phase::Archiving, Some(3), None);
        tracker.file_done(1);
        tracker.complete();
        progress.report(&ProgressEvent::phase(Phase::RestartingService));
        progress.finish();
        assert!(progress.current.lock().unwrap().is_none());
    }

    #[test]
    fn test_log_progress_accepts_all_phases() {
        let progress = LogProgress::new(1);
        for phase in [
            Phase::StoppingService,
            Phase::Archiving,
            Phase::Extracting,
            Phase::RestartingService,
        ] {
            progress.report(&ProgressEvent::phase(phase));
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::RestartingService.to_string(), "restarting service");
    }
}
