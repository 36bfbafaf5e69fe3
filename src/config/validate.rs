//! Backup root validation.
//! The root is created if missing, must be a directory, and must accept a
//! probe file. The returned path is canonical (dunce on Windows, so no
//! `\\?\` prefix leaks into user-facing output).

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::VaultError;

fn invalid(path: &Path, context: impl Into<String>) -> anyhow::Error {
    VaultError::BackupRootInvalid {
        path: path.to_path_buf(),
        context: context.into(),
    }
    .into()
}

pub fn validate_backup_root(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(invalid(path, "path is empty"));
    }
    if path.exists() {
        if !path.is_dir() {
            return Err(invalid(path, "exists but is not a directory"));
        }
    } else {
        fs::create_dir_all(path).map_err(|e| invalid(path, format!("cannot create: {e}")))?;
        info!(path = %path.display(), "Created backup root");
    }

    is_writable_probe(path).map_err(|e| invalid(path, format!("not writable: {e}")))?;
    let real = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    debug!(path = %real.display(), "Backup root writable");
    Ok(real)
}

/// Create and remove a uniquely named probe file.
fn is_writable_probe(dir: &Path) -> std::io::Result<()> {
    let probe = dir.join(format!(".media_vault_probe_{}.tmp", std::process::id()));
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&probe)?;
    let _ = fs::remove_file(&probe);
    Ok(())
}
