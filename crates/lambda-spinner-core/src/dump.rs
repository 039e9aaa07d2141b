//! Debug dump of emitted class files.

use lambda_types::fs_utils::atomic_write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Writes each emitted unit to `<dir>/<internal name>.<seq>.class`.
///
/// The sequence number keeps repeated simple names apart. Write failures are
/// logged and otherwise ignored.
#[derive(Debug)]
pub struct ClassDumper {
    dir: Option<PathBuf>,
    seq: AtomicU64,
}

impl ClassDumper {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            seq: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Dump `bytes` for the unit `name`, returning the path written.
    pub fn dump(&self, name: &str, bytes: &[u8]) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = dump_path(dir, name, seq);
        match atomic_write(&path, bytes) {
            Ok(()) => {
                debug!(unit = %name, path = %path.display(), "dumped proxy class");
                Some(path)
            }
            Err(e) => {
                warn!(unit = %name, error = %e, "failed to dump proxy class");
                None
            }
        }
    }
}

fn dump_path(dir: &Path, name: &str, seq: u64) -> PathBuf {
    let mut path = dir.to_path_buf();
    for segment in name.split('/') {
        path.push(segment);
    }
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.set_file_name(format!("{}.{}.class", file, seq));
    path
}
