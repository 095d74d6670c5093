//! # plexsafe-core
//!
//! Core library for the plexsafe CLI providing:
//! - Configuration file parsing (config.yaml) and environment overrides
//! - The error taxonomy shared by every crate
//! - Archive format and compression level types
//! - Host service control and settings export

pub mod config;
pub mod error;
pub mod service;
pub mod settings;
pub mod types;
pub mod utils;

pub use config::PlexsafeConfig;
pub use error::{Error, ErrorKind, Result};
pub use types::{ArchiveFormat, CompressionLevel};
pub use utils::get_home_dir;
