//! Control of the media server's host service
//!
//! Backup and restore need the server stopped so its database files are
//! quiescent. Implementations here stop and start whatever the host uses to
//! manage the server process.

mod systemd;
mod windows;

pub use systemd::SystemdServices;
pub use windows::WindowsServices;

use crate::config::{ServiceKind, ServiceSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A stoppable, restartable host service.
///
/// Both operations are idempotent: stopping a stopped service or starting a
/// running one succeeds.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Human-readable description of the controlled service(s)
    fn name(&self) -> &str;

    /// Stop the service and wait until it no longer runs
    async fn stop(&self) -> Result<()>;

    /// Start the service
    async fn start(&self) -> Result<()>;
}

/// Host without a manageable service
#[derive(Debug, Default, Clone, Copy)]
pub struct NoServices;

#[async_trait]
impl ServiceControl for NoServices {
    fn name(&self) -> &str {
        "none"
    }

    async fn stop(&self) -> Result<()> {
        debug!("No service configured, nothing to stop");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        debug!("No service configured, nothing to start");
        Ok(())
    }
}

impl ServiceSettings {
    /// Build the service controller this configuration describes
    pub fn build(&self) -> Arc<dyn ServiceControl> {
        let names = self.service_names();
        match self.resolved_kind() {
            ServiceKind::Windows => Arc::new(WindowsServices::new(names, self.process_name())),
            ServiceKind::Systemd => Arc::new(SystemdServices::new(names)),
            ServiceKind::None | ServiceKind::Auto => Arc::new(NoServices),
        }
    }
}
