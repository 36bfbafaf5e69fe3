//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/log/backup paths and detects symlinked
//! ancestors for safety.

use anyhow::{Context, Result};
use dirs::{config_dir, data_dir, home_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::CONFIG_ENV;

const APP_DIR: &str = "media_vault";

/// Config path: `$MEDIA_VAULT_CONFIG` when set (a directory gets `config.xml`
/// appended, a relative path is resolved against the working directory),
/// otherwise the OS config dir.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(raw) = env::var_os(CONFIG_ENV) {
        let mut p = PathBuf::from(raw);
        if p.is_relative() {
            p = env::current_dir()
                .context("resolve current directory for relative config path")?
                .join(p);
        }
        if p.is_dir() {
            p.push("config.xml");
        }
        return Ok(p);
    }
    let base = config_dir()
        .or_else(|| home_dir().map(|h| h.join(".config")))
        .context("cannot determine a config directory")?;
    Ok(base.join(APP_DIR).join("config.xml"))
}

/// OS-appropriate default log file path (data dir).
pub fn default_log_path() -> Option<PathBuf> {
    let mut base = data_dir().or_else(|| home_dir().map(|h| h.join(".local").join("share")))?;
    base.push(APP_DIR);
    let _ = fs::create_dir_all(&base);
    base.push("media_vault.log");
    Some(base)
}

/// `~/MediaVault`, or `./Backup` without a home directory.
pub fn default_backup_root() -> PathBuf {
    home_dir()
        .map(|h| h.join("MediaVault"))
        .unwrap_or_else(|| PathBuf::from("Backup"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() && fs::symlink_metadata(anc)?.file_type().is_symlink() {
            return Ok(true);
        }
        p = anc.parent();
    }
    Ok(false)
}
