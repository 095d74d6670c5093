//! Error types for plexsafe-core

use crate::types::ArchiveFormat;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using plexsafe-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of the service acquisition failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Stop,
    Start,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceAction::Stop => write!(f, "stop"),
            ServiceAction::Start => write!(f, "start"),
        }
    }
}

/// Core error types for plexsafe
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Malformed or out-of-range configuration value
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Backup source tree or restore archive is missing or unreadable
    #[error("Source path {}: {reason}", path.display())]
    SourcePath { path: PathBuf, reason: String },

    /// External compressor required by a format is not installed
    #[error("Archive backend for {format} is unavailable: {reason}")]
    BackendUnavailable {
        format: ArchiveFormat,
        reason: String,
    },

    /// Service failed to stop or to start
    #[error("Failed to {action} service {service}: {message}")]
    ServiceControl {
        service: String,
        action: ServiceAction,
        message: String,
    },

    /// IO error, always tagged with the offending path
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container-level failure reported by an archive codec
    #[error("Archive error on {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },
}

/// The five failure categories a caller has to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    SourcePath,
    BackendUnavailable,
    ServiceControl,
    Io,
}

impl ErrorKind {
    /// Process exit status for this category.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::SourcePath => 3,
            ErrorKind::BackendUnavailable => 4,
            ErrorKind::ServiceControl => 5,
            ErrorKind::Io => 6,
        }
    }

    /// Whether fixing the input and rerunning is enough to recover.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::Configuration | ErrorKind::SourcePath)
    }
}

impl Error {
    /// Classify this error into its failure category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigNotFound { .. } | Error::Configuration { .. } | Error::Yaml(_) => {
                ErrorKind::Configuration
            }
            Error::SourcePath { .. } => ErrorKind::SourcePath,
            Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Error::ServiceControl { .. } => ErrorKind::ServiceControl,
            Error::Io { .. } | Error::Archive { .. } => ErrorKind::Io,
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a source path error
    pub fn source_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourcePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(format: ArchiveFormat, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            format,
            reason: reason.into(),
        }
    }

    /// Create a service control error
    pub fn service_control(
        service: impl Into<String>,
        action: ServiceAction,
        message: impl Into<String>,
    ) -> Self {
        Self::ServiceControl {
            service: service.into(),
            action,
            message: message.into(),
        }
    }

    /// Create an IO error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an archive codec error for a path
    pub fn archive(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Attach a path to a bare `std::io::Result`.
pub trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::configuration("bad level").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::config_not_found("x.yaml").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::source_path("/nope", "does not exist").kind(),
            ErrorKind::SourcePath
        );
        assert_eq!(
            Error::backend_unavailable(ArchiveFormat::Rar, "rar not found").kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(
            Error::service_control("PlexService", ServiceAction::Stop, "denied").kind(),
            ErrorKind::ServiceControl
        );
        assert_eq!(
            Error::archive("/tmp/a.zip", "bad header").kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let kinds = [
            ErrorKind::Configuration,
            ErrorKind::SourcePath,
            ErrorKind::BackendUnavailable,
            ErrorKind::ServiceControl,
            ErrorKind::Io,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_recoverable_categories() {
        assert!(ErrorKind::Configuration.is_recoverable());
        assert!(ErrorKind::SourcePath.is_recoverable());
        assert!(!ErrorKind::ServiceControl.is_recoverable());
        assert!(!ErrorKind::Io.is_recoverable());
        assert!(!ErrorKind::BackendUnavailable.is_recoverable());
    }

    #[test]
    fn test_io_context_keeps_path() {
        let path = Path::new("/definitely/missing/file.bin");
        let err = std::fs::read(path).at(path).unwrap_err();
        assert!(err.to_string().contains("/definitely/missing/file.bin"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_service_error_message() {
        let err = Error::service_control("PlexService", ServiceAction::Start, "timed out");
        assert_eq!(
            err.to_string(),
            "Failed to start service PlexService: timed out"
        );
    }
}
