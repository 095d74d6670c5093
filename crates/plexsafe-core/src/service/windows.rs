//! Windows service control through `sc` and `taskkill`

use super::ServiceControl;
use crate::error::{Error, Result, ServiceAction};
use crate::utils::{command_text, run_command_async};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// ERROR_SERVICE_DOES_NOT_EXIST
const SC_NO_SUCH_SERVICE: i32 = 1060;
/// ERROR_SERVICE_NOT_ACTIVE
const SC_NOT_ACTIVE: i32 = 1062;
/// ERROR_SERVICE_ALREADY_RUNNING
const SC_ALREADY_RUNNING: i32 = 1056;
/// taskkill: no process matched the image name
const TASKKILL_NOT_FOUND: i32 = 128;

#[derive(Debug, PartialEq, Eq)]
enum ScOutcome {
    Done,
    AlreadyInState,
    Missing,
    Failed,
}

fn classify_sc(code: Option<i32>) -> ScOutcome {
    match code {
        Some(0) => ScOutcome::Done,
        Some(SC_NOT_ACTIVE) | Some(SC_ALREADY_RUNNING) => ScOutcome::AlreadyInState,
        Some(SC_NO_SUCH_SERVICE) => ScOutcome::Missing,
        _ => ScOutcome::Failed,
    }
}

/// Named Windows services, plus a process image killed after they stop
pub struct WindowsServices {
    services: Vec<String>,
    process: Option<String>,
    label: String,
}

impl WindowsServices {
    pub fn new(services: Vec<String>, process: Option<String>) -> Self {
        let label = format!("windows: {}", services.join(", "));
        Self {
            services,
            process,
            label,
        }
    }

    async fn sc(&self, action: ServiceAction, service: &str) -> Result<()> {
        let verb = action.to_string();
        debug!("Attempting to {} service: {}", verb, service);

        let output = run_command_async("sc", &[&verb, service])
            .await
            .map_err(|e| Error::service_control(service, action, e.to_string()))?;

        match classify_sc(output.status.code()) {
            ScOutcome::Done => {
                info!("Service {} {}: ok", service, verb);
                Ok(())
            }
            ScOutcome::AlreadyInState => {
                info!("Service {} already in requested state", service);
                Ok(())
            }
            ScOutcome::Missing => {
                info!("Service {} does not exist, skipping", service);
                Ok(())
            }
            ScOutcome::Failed => Err(Error::service_control(
                service,
                action,
                command_text(&output),
            )),
        }
    }

    async fn kill_process(&self, image: &str) -> Result<()> {
        let output = run_command_async("taskkill", &["/F", "/IM", image])
            .await
            .map_err(|e| Error::service_control(image, ServiceAction::Stop, e.to_string()))?;

        match output.status.code() {
            Some(0) => {
                info!("Killed process {}", image);
                Ok(())
            }
            Some(TASKKILL_NOT_FOUND) => {
                debug!("Process {} not running", image);
                Ok(())
            }
            _ => Err(Error::service_control(
                image,
                ServiceAction::Stop,
                command_text(&output),
            )),
        }
    }
}

#[async_trait]
impl ServiceControl for WindowsServices {
    fn name(&self) -> &str {
        &self.label
    }

    async fn stop(&self) -> Result<()> {
        for service in &self.services {
            self.sc(ServiceAction::Stop, service).await?;
        }
        if let Some(image) = &self.process {
            self.kill_process(image).await?;
        }
        Ok(())
    }

    /// Attempts every service even if an earlier one fails; the first
    /// failure is returned.
    async fn start(&self) -> Result<()> {
        let mut first_error = None;
        for service in &self.services {
            if let Err(e) = self.sc(ServiceAction::Start, service).await {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
