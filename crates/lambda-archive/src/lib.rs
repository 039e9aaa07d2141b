//! Filesystem-backed archive of spun lambda proxy classes.
//!
//! This crate provides:
//! - `FsArchive`: the [`lambda_spinner_core::ProxyArchive`] implementation,
//!   sharded by the SHA-256 of each call site's canonical key
//! - `ArchiveMetrics`: hit / miss / collision / write counters
//!
//! In share mode a lookup defines the archived bytes through the archive's
//! loader; in dump mode every freshly spun, cache-eligible unit is written.

pub mod metrics;
pub mod paths;
pub mod store;

pub use metrics::{ArchiveMetrics, ArchiveMetricsSnapshot};
pub use paths::{default_archive_root, ENV_ARCHIVE_DIR};
pub use store::{ArchivedUnit, FsArchive};
