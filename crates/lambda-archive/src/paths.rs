//! Path utilities for the sharded archive layout.
//!
//! ```text
//! <root>/units/<aa>/<sha256(canonical key)>.json
//! ```

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use lambda_types::fs_utils::atomic_write;
use lambda_spinner_core::UnitKey;

/// Environment override for the default archive root.
pub const ENV_ARCHIVE_DIR: &str = "LAMBDA_SPINNER_ARCHIVE_DIR";
const DEFAULT_ARCHIVE_DIR: &str = ".lambda-spinner";

/// `$LAMBDA_SPINNER_ARCHIVE_DIR`, or `~/.lambda-spinner/archive`.
pub fn default_archive_root() -> PathBuf {
    std::env::var(ENV_ARCHIVE_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_ARCHIVE_DIR)
                .join("archive")
        })
}

/// Lowercase hex SHA-256 of the key's canonical form.
pub fn key_digest(key: &UnitKey) -> String {
    hex::encode(Sha256::digest(key.canonical().as_bytes()))
}

/// Full filesystem path of the entry for `key`.
pub fn unit_path(archive_root: &Path, key: &UnitKey) -> PathBuf {
    let digest = key_digest(key);
    archive_root
        .join("units")
        .join(&digest[0..2])
        .join(format!("{}.json", digest))
}

/// Write a JSON file atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}
