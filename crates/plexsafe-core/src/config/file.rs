//! On-disk configuration schema and its defaults

use crate::types::ArchiveFormat;
use crate::utils::command_exists;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Registry key holding the media server's settings on Windows
pub const WINDOWS_REGISTRY_KEY: &str = r"HKEY_CURRENT_USER\SOFTWARE\Plex, Inc.\Plex Media Server";

/// Linux package install location of the media server's data
const LINUX_DATA_DIR: &str = "/var/lib/plexmediaserver/Library/Application Support/Plex Media Server";

/// Parsed `config.yaml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexsafeConfigFile {
    /// Directory backups are written to and restored from
    #[serde(default = "default_backup_dir")]
    pub backup_dir: Utf8PathBuf,

    /// Media server data directory (platform default when absent)
    #[serde(default)]
    pub data_dir: Option<Utf8PathBuf>,

    /// Folder names pruned from the backup, matched case-insensitively
    #[serde(default = "default_exclude_folders")]
    pub exclude_folders: Vec<String>,

    /// Archive container format
    #[serde(default = "default_archive_format")]
    pub archive_format: ArchiveFormat,

    /// Raw compression level; validated into `CompressionLevel`
    #[serde(default = "default_compression_level")]
    pub compression_level: i64,

    /// Host service control
    #[serde(default)]
    pub service: ServiceSettings,

    /// Settings key exported alongside the data directory
    #[serde(default = "default_registry_key")]
    pub registry_key: Option<String>,

    /// Directory for per-run log files (next to the executable when absent)
    #[serde(default)]
    pub log_dir: Option<Utf8PathBuf>,
}

impl Default for PlexsafeConfigFile {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            data_dir: None,
            exclude_folders: default_exclude_folders(),
            archive_format: default_archive_format(),
            compression_level: default_compression_level(),
            service: ServiceSettings::default(),
            registry_key: default_registry_key(),
            log_dir: None,
        }
    }
}

/// How the media server process is managed on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Windows services on Windows, systemd on Linux, nothing elsewhere
    #[default]
    Auto,
    Windows,
    Systemd,
    None,
}

/// Service control configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default)]
    pub kind: ServiceKind,

    /// Service or unit names; platform defaults when absent
    #[serde(default)]
    pub names: Option<Vec<String>>,

    /// Process image force-killed after the services stop (Windows only)
    #[serde(default)]
    pub process: Option<String>,
}

impl ServiceSettings {
    /// Resolve `Auto` against the running host
    pub fn resolved_kind(&self) -> ServiceKind {
        match self.kind {
            ServiceKind::Auto if cfg!(windows) => ServiceKind::Windows,
            ServiceKind::Auto if cfg!(target_os = "linux") && command_exists("systemctl") => {
                ServiceKind::Systemd
            }
            ServiceKind::Auto => ServiceKind::None,
            other => other,
        }
    }

    /// Service names for the resolved kind
    pub fn service_names(&self) -> Vec<String> {
        if let Some(names) = &self.names {
            return names.clone();
        }
        match self.resolved_kind() {
            ServiceKind::Windows => vec!["PlexUpdateService".into(), "PlexService".into()],
            ServiceKind::Systemd => vec!["plexmediaserver".into()],
            _ => Vec::new(),
        }
    }

    /// Process image to force-kill, if any
    pub fn process_name(&self) -> Option<String> {
        match (&self.process, self.resolved_kind()) {
            (Some(process), _) => Some(process.clone()),
            (None, ServiceKind::Windows) => Some("Plex Media Server.exe".into()),
            _ => None,
        }
    }
}

fn default_backup_dir() -> Utf8PathBuf {
    if cfg!(windows) {
        return Utf8PathBuf::from("C:/Backups");
    }
    crate::utils::get_home_dir()
        .ok()
        .and_then(|home| Utf8PathBuf::from_path_buf(home).ok())
        .map(|home| home.join("plexsafe-backups"))
        .unwrap_or_else(|| Utf8PathBuf::from("plexsafe-backups"))
}

fn default_exclude_folders() -> Vec<String> {
    ["Diagnostics", "Crash Reports", "Updates", "Logs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_archive_format() -> ArchiveFormat {
    ArchiveFormat::Zip
}

fn default_compression_level() -> i64 {
    5
}

fn default_registry_key() -> Option<String> {
    cfg!(windows).then(|| WINDOWS_REGISTRY_KEY.to_string())
}

/// Platform location of the media server's data directory
pub(crate) fn default_data_dir() -> Option<Utf8PathBuf> {
    let base = if cfg!(windows) {
        dirs::data_local_dir()?
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()?
    } else {
        return Some(Utf8PathBuf::from(LINUX_DATA_DIR));
    };
    Utf8PathBuf::from_path_buf(base.join("Plex Media Server")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_exclusions() {
        let cfg = PlexsafeConfigFile::default();
        assert_eq!(
            cfg.exclude_folders,
            vec!["Diagnostics", "Crash Reports", "Updates", "Logs"]
        );
        assert_eq!(cfg.archive_format, ArchiveFormat::Zip);
        assert_eq!(cfg.compression_level, 5);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let cfg: PlexsafeConfigFile = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(cfg.compression_level, 5);
        assert_eq!(cfg.service.kind, ServiceKind::Auto);
    }

    #[test]
    fn test_explicit_service_names_win() {
        let settings = ServiceSettings {
            kind: ServiceKind::Systemd,
            names: Some(vec!["plex".into()]),
            process: None,
        };
        assert_eq!(settings.service_names(), vec!["plex".to_string()]);
        assert_eq!(settings.process_name(), None);
    }

    #[test]
    fn test_windows_defaults() {
        let settings = ServiceSettings {
            kind: ServiceKind::Windows,
            names: None,
            process: None,
        };
        assert_eq!(
            settings.service_names(),
            vec!["PlexUpdateService".to_string(), "PlexService".to_string()]
        );
        assert_eq!(
            settings.process_name().as_deref(),
            Some("Plex Media Server.exe")
        );
    }

    #[test]
    fn test_auto_kind_follows_host() {
        let resolved = ServiceSettings::default().resolved_kind();
        if cfg!(windows) {
            assert_eq!(resolved, ServiceKind::Windows);
        } else if cfg!(target_os = "linux") && command_exists("systemctl") {
            assert_eq!(resolved, ServiceKind::Systemd);
        } else {
            assert_eq!(resolved, ServiceKind::None);
        }
    }

    #[test]
    fn test_none_kind_has_no_services() {
        let settings = ServiceSettings {
            kind: ServiceKind::None,
            ..Default::default()
        };
        assert!(settings.service_names().is_empty());
    }
}
