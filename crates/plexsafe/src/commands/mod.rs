//! Command implementations

pub mod backup;
pub mod restore;

use plexsafe_core::settings::{settings_store, SettingsStore};
use plexsafe_core::PlexsafeConfig;
use plexsafe_archive::ArchiveEngine;
use std::sync::Arc;

use crate::output;

/// Engine wired to the configured service, settings store and a progress
/// reporter suited to the terminal
pub(crate) fn build_engine(config: &PlexsafeConfig, quiet: bool) -> ArchiveEngine {
    let settings: Arc<dyn SettingsStore> = settings_store(config.registry_key());
    ArchiveEngine::new(config.service().build())
        .with_settings(settings)
        .with_progress(output::progress_reporter(quiet))
}
