//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

use anyhow::{Context, Result, bail};
use std::env;
use std::path::PathBuf;

pub use paths::{
    default_backup_root, default_config_path, default_log_path, path_has_symlink_ancestor,
};
pub use types::{Config, FolderSource, LogLevel, default_folders};
pub use validate::validate_backup_root;
pub use xml::{create_template_config, load_config_from_xml_path, parse_config_xml};

/// Environment variable naming an explicit config file (or directory).
pub const CONFIG_ENV: &str = "MEDIA_VAULT_CONFIG";

/// Device storage root for the primary user.
pub const DEVICE_ROOT_DEFAULT: &str = "/storage/emulated/0";

/// Folders backed up when the config does not list its own.
pub const DEFAULT_FOLDER_NAMES: [&str; 8] = [
    "Camera",
    "Screenshots",
    "Downloads",
    "WhatsApp Media",
    "Telegram",
    "Instagram",
    "TikTok",
    "SnapChat",
];

/// Result of resolving the config at startup.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// True on first run: the template was just written.
    pub created: bool,
}

/// Load the config, writing the template first if this is the first run.
///
/// An explicit `MEDIA_VAULT_CONFIG` that points nowhere is an error; the
/// template is only written at the default location.
pub fn load_or_init() -> Result<LoadedConfig> {
    let path = default_config_path()?;
    if path.exists() {
        let config = load_config_from_xml_path(&path)?;
        return Ok(LoadedConfig {
            config,
            path,
            created: false,
        });
    }
    if env::var_os(CONFIG_ENV).is_some() {
        bail!(
            "{CONFIG_ENV} points to '{}', which does not exist",
            path.display()
        );
    }
    create_template_config(&path)
        .with_context(|| format!("write template config '{}'", path.display()))?;
    Ok(LoadedConfig {
        config: Config::default(),
        path,
        created: true,
    })
}
