//! Configuration loading and management

mod file;
mod loader;

pub use file::{PlexsafeConfigFile, ServiceKind, ServiceSettings};
pub use loader::{PlexsafeConfig, DEFAULT_CONFIG_FILE_NAME};
