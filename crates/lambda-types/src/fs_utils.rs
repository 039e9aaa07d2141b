//! Filesystem helpers shared by the dump directory and the archive.

use anyhow::{anyhow, Result};
use std::path::Path;

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to `<ext>.tmp`, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents_and_leaves_no_temp_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("com/acme/Main$$Lambda.class");
        atomic_write(&path, &[0xCA, 0xFE])?;
        assert_eq!(std::fs::read(&path)?, vec![0xCA, 0xFE]);
        assert!(!path.with_extension("class.tmp").exists());

        atomic_write(&path, &[0xBA, 0xBE])?;
        assert_eq!(std::fs::read(&path)?, vec![0xBA, 0xBE]);
        Ok(())
    }

    #[test]
    fn test_atomic_write_reports_blocked_parent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file")?;
        let err = atomic_write(&blocker.join("x.class"), &[1]).unwrap_err();
        assert!(err.to_string().contains("Failed to create directory"));
        Ok(())
    }
}
