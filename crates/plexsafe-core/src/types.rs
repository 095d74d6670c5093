//! Value types shared by configuration and the archive engine

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Archive container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Plain zip, deflate compressed
    #[serde(rename = "zip")]
    Zip,

    /// 7z with LZMA2
    #[serde(rename = "7z", alias = "sevenzip")]
    SevenZip,

    /// rar, produced by the external `rar` tool
    #[serde(rename = "rar")]
    Rar,

    /// tar wrapped in gzip
    #[serde(rename = "targz", alias = "tar.gz", alias = "tgz")]
    TarGz,
}

impl ArchiveFormat {
    /// All supported formats
    pub const ALL: [ArchiveFormat; 4] = [
        ArchiveFormat::Zip,
        ArchiveFormat::SevenZip,
        ArchiveFormat::Rar,
        ArchiveFormat::TarGz,
    ];

    /// File extension used for archives of this format (without leading dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Detect the format from an archive file name
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".7z") {
            Some(ArchiveFormat::SevenZip)
        } else if name.ends_with(".rar") {
            Some(ArchiveFormat::Rar)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::TarGz => "targz",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "7z" | "sevenzip" => Ok(ArchiveFormat::SevenZip),
            "rar" => Ok(ArchiveFormat::Rar),
            "targz" | "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(Error::configuration(format!(
                "Unknown archive format '{}'. Valid formats: zip, 7z, rar, targz",
                other
            ))),
        }
    }
}

/// Compression effort on the normalized 0-9 scale.
///
/// 0 stores without compression, 9 is maximum effort. Each backend maps the
/// value onto its own codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub const MIN: u32 = 0;
    pub const MAX: u32 = 9;

    /// Validate a raw configured level.
    pub fn new(raw: i64) -> Result<Self> {
        if raw < Self::MIN as i64 || raw > Self::MAX as i64 {
            return Err(Error::configuration(format!(
                "Compression level must be {}-{}, got {}",
                Self::MIN,
                Self::MAX,
                raw
            )));
        }
        Ok(Self(raw as u32))
    }

    /// Store-only level
    pub fn store() -> Self {
        Self(0)
    }

    /// Maximum effort level
    pub fn best() -> Self {
        Self(Self::MAX)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_store(self) -> bool {
        self.0 == 0
    }

    /// rar's `-m0`..`-m5` method switch for this level
    pub fn rar_method(self) -> u32 {
        (self.0 * 5).div_ceil(9)
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(5)
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
