//! Export and import of server settings kept outside the data directory

use crate::error::{Error, Result};
use crate::utils::{command_text, run_command_async};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Archive entry name of the exported settings snapshot
pub const SETTINGS_ENTRY_NAME: &str = "plex_registry_backup.reg";

/// Snapshot store for settings that live outside the data directory
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Write the current settings to `file`
    async fn export(&self, file: &Path) -> Result<()>;

    /// Apply settings previously written by `export`
    async fn import(&self, file: &Path) -> Result<()>;

    /// Whether this store produces anything worth archiving
    fn is_enabled(&self) -> bool {
        true
    }
}

/// No external settings
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSettings;

#[async_trait]
impl SettingsStore for NoSettings {
    async fn export(&self, _file: &Path) -> Result<()> {
        Ok(())
    }

    async fn import(&self, _file: &Path) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// A Windows registry key, exported and imported with `reg`
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    key: String,
}

impl RegistrySettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

async fn reg(args: &[&str], file: &Path) -> Result<()> {
    let output = run_command_async("reg", args)
        .await
        .map_err(|e| Error::io(file, e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::archive(
            file,
            format!("reg {} failed: {}", args[0], command_text(&output)),
        ))
    }
}

#[async_trait]
impl SettingsStore for RegistrySettings {
    async fn export(&self, file: &Path) -> Result<()> {
        let target = file.to_string_lossy();
        debug!("Exporting registry key {} to {}", self.key, target);
        reg(&["export", &self.key, &target, "/y"], file).await?;
        info!("Registry key exported to {}", target);
        Ok(())
    }

    async fn import(&self, file: &Path) -> Result<()> {
        let source = file.to_string_lossy();
        reg(&["import", &source], file).await?;
        info!("Registry settings imported from {}", source);
        Ok(())
    }
}

/// Settings store for an optional registry key
pub fn settings_store(registry_key: Option<&str>) -> Arc<dyn SettingsStore> {
    match registry_key {
        Some(key) if !key.trim().is_empty() => Arc::new(RegistrySettings::new(key)),
        _ => Arc::new(NoSettings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_selection() {
        assert!(!settings_store(None).is_enabled());
        assert!(!settings_store(Some("  ")).is_enabled());
        assert!(settings_store(Some(r"HKEY_CURRENT_USER\SOFTWARE\X")).is_enabled());
    }

    #[tokio::test]
    async fn test_no_settings_writes_nothing() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join(SETTINGS_ENTRY_NAME);
        NoSettings.export(&file).await.unwrap();
        assert!(!file.exists());
    }
}
