//! systemd unit control through `systemctl`

use super::ServiceControl;
use crate::error::{Error, Result, ServiceAction};
use crate::utils::{command_text, run_command_async};
use async_trait::async_trait;
use tracing::{info, warn};

/// systemctl's "unit not loaded" status
const SYSTEMCTL_NO_SUCH_UNIT: i32 = 5;

pub struct SystemdServices {
    units: Vec<String>,
    label: String,
}

impl SystemdServices {
    pub fn new(units: Vec<String>) -> Self {
        let label = format!("systemd: {}", units.join(", "));
        Self { units, label }
    }

    async fn systemctl(&self, action: ServiceAction, unit: &str) -> Result<()> {
        let verb = action.to_string();
        let output = run_command_async("systemctl", &[&verb, unit])
            .await
            .map_err(|e| Error::service_control(unit, action, e.to_string()))?;

        match output.status.code() {
            Some(0) => {
                info!("Unit {} {}: ok", unit, verb);
                Ok(())
            }
            Some(SYSTEMCTL_NO_SUCH_UNIT) => {
                info!("Unit {} is not installed, skipping", unit);
                Ok(())
            }
            _ => Err(Error::service_control(unit, action, command_text(&output))),
        }
    }
}

#[async_trait]
impl ServiceControl for SystemdServices {
    fn name(&self) -> &str {
        &self.label
    }

    async fn stop(&self) -> Result<()> {
        for unit in &self.units {
            self.systemctl(ServiceAction::Stop, unit).await?;
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let mut first_error = None;
        for unit in &self.units {
            if let Err(e) = self.systemctl(ServiceAction::Start, unit).await {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
