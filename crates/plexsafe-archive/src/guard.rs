//! Scoped stop/start of the host service around a job.

use crate::progress::{Phase, ProgressEvent, ProgressReporter};
use plexsafe_core::error::{Error, Result};
use plexsafe_core::service::ServiceControl;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Result of work run under a [`ServiceGuard`].
///
/// The job's own result and the restart result are independent: data can be
/// safely archived while the service failed to come back, and vice versa.
#[derive(Debug)]
pub struct JobOutcome<T> {
    /// Stop failure or the job's result
    pub result: Result<T>,
    /// Outcome of the restart, attempted on every path
    pub restart: Result<()>,
}

impl<T> JobOutcome<T> {
    /// Whether the service may have been left stopped
    pub fn service_down(&self) -> bool {
        self.restart.is_err()
    }

    /// Collapse into one result; a job error wins over a restart error.
    pub fn into_result(self) -> Result<T> {
        let value = self.result?;
        self.restart?;
        Ok(value)
    }
}

/// Pairs `stop()` with exactly one `start()`.
pub struct ServiceGuard {
    service: Arc<dyn ServiceControl>,
    progress: Arc<dyn ProgressReporter>,
}

impl ServiceGuard {
    pub fn new(service: Arc<dyn ServiceControl>, progress: Arc<dyn ProgressReporter>) -> Self {
        Self { service, progress }
    }

    /// Stop the service, run `work` if the stop succeeded, then start the
    /// service again whatever happened.
    ///
    /// `start()` is also attempted after a failed stop, because a stop that
    /// fails part-way may have stopped some services already.
    pub async fn run<T, F, Fut>(&self, work: F) -> JobOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.progress
            .report(&ProgressEvent::phase(Phase::StoppingService));
        info!("Stopping service ({})", self.service.name());

        let result = match self.service.stop().await {
            Ok(()) => work().await,
            Err(e) => {
                error!("Service stop failed, no files were touched: {}", e);
                Err(e)
            }
        };

        if let Err(e) = &result {
            error!("Job failed ({:?}): {}", e.kind(), e);
        }

        self.progress
            .report(&ProgressEvent::phase(Phase::RestartingService));
        info!("Starting service ({})", self.service.name());
        let restart = self.service.start().await;
        if let Err(e) = &restart {
            error!("Service restart failed, service is down: {}", e);
        }

        self.progress.finish();
        JobOutcome { result, restart }
    }
}

/// Convert a panicked or cancelled blocking task into a job error
pub(crate) fn join_error(context: &std::path::Path, e: tokio::task::JoinError) -> Error {
    Error::archive(context, format!("archive worker failed: {}", e))
}
