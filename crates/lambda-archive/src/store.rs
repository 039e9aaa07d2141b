//! Filesystem-backed proxy archive.

use anyhow::{anyhow, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use lambda_spinner_core::{
    ArchiveMode, DefineRequest, LoadedUnit, ProxyArchive, ProxyLoader, UnitKey,
};

use crate::metrics::ArchiveMetrics;
use crate::paths::{atomic_write_json, default_archive_root, unit_path};

/// One archived unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedUnit {
    /// Requested (not loader-suffixed) unit name
    pub name: String,
    /// Call-site fingerprint, 16 hex digits
    pub fingerprint: String,
    /// Canonical key the entry was written under
    pub key: String,
    /// Base64-encoded class bytes
    pub class_bytes: String,
    pub archived_at: DateTime<Utc>,
}

impl ArchivedUnit {
    pub fn new(name: impl Into<String>, key: &UnitKey, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            fingerprint: format!("{:016x}", key.fingerprint),
            key: key.canonical().to_string(),
            class_bytes: base64::engine::general_purpose::STANDARD.encode(bytes),
            archived_at: Utc::now(),
        }
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.class_bytes)
            .map_err(|e| anyhow!("Failed to decode class bytes of {}: {}", self.name, e))
    }
}

/// Archive storing one JSON entry per call-site key, defining hits through
/// its loader.
pub struct FsArchive<L: ProxyLoader> {
    archive_root: Arc<Path>,
    mode: ArchiveMode,
    loader: Arc<L>,
    metrics: ArchiveMetrics,
}

impl<L: ProxyLoader> FsArchive<L> {
    pub fn new<P: AsRef<Path>>(archive_root: P, mode: ArchiveMode, loader: Arc<L>) -> Result<Self> {
        let archive_root = archive_root.as_ref().to_path_buf();
        std::fs::create_dir_all(&archive_root).map_err(|e| {
            anyhow!(
                "Failed to create archive root {}: {}",
                archive_root.display(),
                e
            )
        })?;
        Ok(Self {
            archive_root: Arc::from(archive_root),
            mode,
            loader,
            metrics: ArchiveMetrics::default(),
        })
    }

    /// Archive under [`default_archive_root`].
    pub fn open_default(mode: ArchiveMode, loader: Arc<L>) -> Result<Self> {
        Self::new(default_archive_root(), mode, loader)
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn metrics(&self) -> &ArchiveMetrics {
        &self.metrics
    }

    /// Read the entry for `key` without defining it. An entry written under a
    /// different key with the same digest is treated as absent.
    pub fn entry(&self, key: &UnitKey) -> Result<Option<ArchivedUnit>> {
        let path = unit_path(&self.archive_root, key);
        if !path.exists() {
            self.metrics.record_miss();
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read archive entry {}: {}", path.display(), e))?;
        let entry: ArchivedUnit = serde_json::from_str(&json)
            .map_err(|e| anyhow!("Failed to parse archive entry {}: {}", path.display(), e))?;
        if entry.key != key.canonical() {
            self.metrics.record_collision();
            warn!(path = %path.display(), key = %key, "archive entry belongs to another call site");
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

impl<L: ProxyLoader> ProxyArchive<L::Unit> for FsArchive<L> {
    fn mode(&self) -> ArchiveMode {
        self.mode
    }

    fn find(&self, key: &UnitKey) -> Result<Option<Arc<L::Unit>>> {
        let Some(entry) = self.entry(key)? else {
            return Ok(None);
        };
        let bytes = entry.decode_bytes()?;
        // Only direct-dispatch, eagerly initialized units are archived.
        let unit = self.loader.define_hidden(DefineRequest {
            name: &entry.name,
            bytes: &bytes,
            class_data: None,
            initialize: true,
        })?;
        self.metrics.record_hit();
        debug!(unit = %unit.name(), archived_at = %entry.archived_at, "defined archived unit");
        Ok(Some(unit))
    }

    fn register(&self, key: &UnitKey, unit: &Arc<L::Unit>) -> Result<()> {
        if self.entry(key)?.is_some() {
            return Ok(());
        }
        let name = requested_name(unit.name());
        let entry = ArchivedUnit::new(name, key, unit.class_bytes());
        atomic_write_json(&unit_path(&self.archive_root, key), &entry)?;
        self.metrics.record_write();
        debug!(unit = %name, key = %key, "archived unit");
        Ok(())
    }
}

/// Strip a loader suffix such as `/0x1f` from a defined name.
fn requested_name(defined: &str) -> &str {
    match defined.rsplit_once('/') {
        Some((base, suffix)) if suffix.starts_with("0x") => base,
        _ => defined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::{InProcessLoader, Runtime};
    use lambda_spinner_core::{spin_class_bytes, SpinnerConfig};
    use lambda_types::{
        CallSiteSpec, CallerClass, FunctionalInterface, ImplMethod, InvocationKind, MethodType,
    };
    use tempfile::TempDir;

    fn site(impl_name: &str) -> CallSiteSpec {
        CallSiteSpec::new(
            CallerClass::new("com.acme.Main"),
            FunctionalInterface::new("java/lang/Runnable"),
            "run",
            MethodType::void(),
            vec![],
            ImplMethod::new("com/acme/Main", impl_name, MethodType::void(), InvocationKind::Static),
        )
    }

    fn loader() -> Arc<InProcessLoader> {
        Arc::new(InProcessLoader::new(Arc::new(Runtime::new())))
    }

    fn define(loader: &InProcessLoader, site: &CallSiteSpec) -> Result<Arc<lambda_runtime::HiddenUnit>> {
        let emitted = spin_class_bytes(site, &SpinnerConfig::default()).map_err(|e| anyhow!("{}", e))?;
        loader.define_hidden(DefineRequest {
            name: &emitted.name,
            bytes: &emitted.bytes,
            class_data: None,
            initialize: true,
        })
    }

    #[test]
    fn test_register_then_find() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let loader = loader();
        let archive = FsArchive::new(temp_dir.path(), ArchiveMode::Dump, Arc::clone(&loader))?;

        let site = site("lambda$main$0");
        let key = UnitKey::new(&site);
        let unit = define(&loader, &site)?;
        archive.register(&key, &unit)?;

        let entry = archive.entry(&key)?.expect("entry should exist");
        assert_eq!(entry.name, "com/acme/Main$$Lambda");
        assert_eq!(entry.decode_bytes()?, unit.class_bytes());

        let found = archive.find(&key)?.expect("unit should be found");
        assert_eq!(found.class_bytes(), unit.class_bytes());
        assert_ne!(found.name(), unit.name());
        assert_eq!(archive.metrics().snapshot().writes, 1);
        Ok(())
    }

    #[test]
    fn test_register_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let loader = loader();
        let archive = FsArchive::new(temp_dir.path(), ArchiveMode::Dump, Arc::clone(&loader))?;
        let site = site("lambda$main$0");
        let key = UnitKey::new(&site);
        let unit = define(&loader, &site)?;
        archive.register(&key, &unit)?;
        archive.register(&key, &unit)?;
        assert_eq!(archive.metrics().snapshot().writes, 1);
        Ok(())
    }

    #[test]
    fn test_miss_and_foreign_entry() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let loader = loader();
        let archive = FsArchive::new(temp_dir.path(), ArchiveMode::Share, Arc::clone(&loader))?;
        let key = UnitKey::new(&site("lambda$main$0"));
        assert!(archive.find(&key)?.is_none());

        // An entry at this key's path written for another site is not a hit.
        let other = UnitKey::new(&site("lambda$main$1"));
        let forged = ArchivedUnit::new("com/acme/Main$$Lambda", &other, &[0xCA, 0xFE]);
        atomic_write_json(&unit_path(temp_dir.path(), &key), &forged)?;
        assert!(archive.find(&key)?.is_none());

        let snapshot = archive.metrics().snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.collisions, 1);
        Ok(())
    }

    #[test]
    fn test_requested_name() {
        assert_eq!(requested_name("com/acme/Main$$Lambda/0x1f"), "com/acme/Main$$Lambda");
        assert_eq!(requested_name("com/acme/Main$$Lambda"), "com/acme/Main$$Lambda");
    }
}
