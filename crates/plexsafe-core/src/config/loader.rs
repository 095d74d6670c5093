//! Configuration file loading and validation

use super::file::{default_data_dir, PlexsafeConfigFile, ServiceSettings};
use crate::error::{Error, Result};
use crate::types::{ArchiveFormat, CompressionLevel};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::{debug, info};

/// Name of the configuration file looked up next to the executable
pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.yaml";

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct PlexsafeConfig {
    /// The parsed configuration
    pub config: PlexsafeConfigFile,

    /// File the configuration came from (None when built-in defaults are used)
    pub config_path: Option<Utf8PathBuf>,
}

impl PlexsafeConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicitly named file must exist. When no path is given and the
    /// default file is absent, built-in defaults are used. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let (config, config_path) = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::config_not_found(p.as_str())
                    } else {
                        Error::io(p.as_std_path(), e)
                    }
                })?;
                (Self::from_yaml(&content)?, Some(p.to_owned()))
            }
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    let content = fs::read_to_string(&default_path)
                        .map_err(|e| Error::io(default_path.as_std_path(), e))?;
                    (Self::from_yaml(&content)?, Some(default_path))
                } else {
                    info!(
                        "No configuration file at {}, using built-in defaults",
                        default_path
                    );
                    (PlexsafeConfigFile::default(), None)
                }
            }
        };

        let config = Self::apply_env_overrides(config)?;
        debug!("Loaded configuration: {:?}", config);

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Wrap an already parsed configuration
    pub fn from_file(config: PlexsafeConfigFile) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Parse YAML configuration content
    pub fn from_yaml(content: &str) -> Result<PlexsafeConfigFile> {
        if content.trim().is_empty() {
            return Ok(PlexsafeConfigFile::default());
        }
        serde_yaml_ng::from_str(content).map_err(Error::from)
    }

    /// `config.yaml` in the executable's directory
    pub fn default_config_path() -> Utf8PathBuf {
        executable_dir()
            .map(|dir| dir.join(DEFAULT_CONFIG_FILE_NAME))
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CONFIG_FILE_NAME))
    }

    fn apply_env_overrides(mut config: PlexsafeConfigFile) -> Result<PlexsafeConfigFile> {
        if let Ok(val) = env::var("PLEXSAFE_BACKUP_DIR") {
            config.backup_dir = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("PLEXSAFE_DATA_DIR") {
            config.data_dir = Some(Utf8PathBuf::from(val));
        }

        if let Ok(val) = env::var("PLEXSAFE_ARCHIVE_FORMAT") {
            config.archive_format = val.parse()?;
        }

        if let Ok(val) = env::var("PLEXSAFE_COMPRESSION_LEVEL") {
            config.compression_level = val.trim().parse().map_err(|_| {
                Error::configuration("PLEXSAFE_COMPRESSION_LEVEL must be a valid number")
            })?;
        }

        Ok(config)
    }

    /// Check every value the engine relies on before any service interaction.
    pub fn validate(&self) -> Result<()> {
        self.compression_level()?;
        self.data_dir()?;

        if self.config.backup_dir.as_str().trim().is_empty() {
            return Err(Error::configuration("backup_dir must not be empty"));
        }

        if let Some(bad) = self
            .config
            .exclude_folders
            .iter()
            .find(|f| f.trim().trim_matches(['/', '\\']).is_empty())
        {
            return Err(Error::configuration(format!(
                "exclude_folders contains an empty entry: '{}'",
                bad
            )));
        }

        Ok(())
    }

    /// Validated compression level
    pub fn compression_level(&self) -> Result<CompressionLevel> {
        CompressionLevel::new(self.config.compression_level)
    }

    pub fn archive_format(&self) -> ArchiveFormat {
        self.config.archive_format
    }

    pub fn backup_dir(&self) -> &Utf8Path {
        &self.config.backup_dir
    }

    /// Configured data directory, or the platform default
    pub fn data_dir(&self) -> Result<Utf8PathBuf> {
        self.config
            .data_dir
            .clone()
            .or_else(default_data_dir)
            .ok_or_else(|| {
                Error::configuration("data_dir is not set and no platform default is known")
            })
    }

    pub fn exclude_folders(&self) -> &[String] {
        &self.config.exclude_folders
    }

    pub fn service(&self) -> &ServiceSettings {
        &self.config.service
    }

    pub fn registry_key(&self) -> Option<&str> {
        self.config.registry_key.as_deref()
    }

    /// Directory for per-run log files
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.config.log_dir.clone().unwrap_or_else(Self::default_log_dir)
    }

    /// `logs/` next to the executable, used when no configuration applies
    pub fn default_log_dir() -> Utf8PathBuf {
        executable_dir()
            .map(|dir| dir.join("logs"))
            .unwrap_or_else(|| Utf8PathBuf::from("logs"))
    }
}

fn executable_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?.to_path_buf();
    Utf8PathBuf::from_path_buf(dir).ok()
}
