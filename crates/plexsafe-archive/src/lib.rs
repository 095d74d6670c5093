//! Archive engine for Plex Media Server data.
//!
//! Builds a timestamped archive of the data directory while the service is
//! stopped, and restores one back over it. Four container formats are
//! supported behind [`ArchiveBackend`]: zip, 7z, tar.gz and rar (through the
//! external tool).
//!
//! # Example
//!
//! ```no_run
//! use plexsafe_archive::{ArchiveEngine, ArchiveJob, ExclusionSet};
//! use plexsafe_core::service::NoServices;
//! use plexsafe_core::ArchiveFormat;
//! use std::sync::Arc;
//!
//! # async fn run() -> plexsafe_core::Result<()> {
//! let engine = ArchiveEngine::new(Arc::new(NoServices));
//! let job = ArchiveJob::backup(
//!     "/var/lib/plexmediaserver",
//!     "/srv/backups",
//!     ArchiveFormat::Zip,
//!     5,
//!     ExclusionSet::new(["Cache", "Logs"]),
//! );
//! let report = engine.run_backup(&job).await?.into_result()?;
//! println!("wrote {}", report.archive_path.display());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod engine;
pub mod filters;
pub mod guard;
pub mod progress;
pub mod staging;
pub mod walk;

pub use backend::{ArchiveBackend, ArchiveSummary, BackendRegistry, CompressRequest};
pub use engine::{ArchiveEngine, ArchiveJob, BackupReport, RestoreReport};
pub use filters::{ExclusionSet, PathFilter};
pub use guard::{JobOutcome, ServiceGuard};
pub use progress::{BarProgress, LogProgress, NullProgress, Phase, ProgressEvent, ProgressReporter};
pub use staging::{backup_file_name, find_latest_backup, restore_incomplete, BACKUP_PREFIX};
