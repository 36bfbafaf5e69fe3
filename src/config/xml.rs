//! XML configuration support.
//! - Parses config.xml (quick_xml + serde) into a Config.
//! - Writes a commented template on first run; its presence is the setup marker.
//!
//! Notes:
//! - This module only reads/writes the config file; directory validation happens elsewhere.
//! - Unknown elements are rejected so typos do not silently fall back to defaults.
//! - Values are trimmed; empty elements mean "use the default".

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::paths::path_has_symlink_ancestor;
use super::types::{Config, FolderSource, LogLevel, default_folders};
use crate::backup::OrganizeTiming;
use crate::model::DeviceFolder;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    backup_root: Option<String>,
    adb_path: Option<String>,
    device_serial: Option<String>,
    device_root: Option<String>,
    folders: Option<XmlFolders>,
    folder_source: Option<String>,
    organize_timing: Option<String>,
    include_audio: Option<String>,
    max_retries: Option<String>,
    pull_timeout_seconds: Option<String>,
    poll_interval_seconds: Option<String>,
    delete_after_backup: Option<String>,
    transfer_workers: Option<String>,
    failure_log: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlFolders {
    #[serde(default)]
    folder: Vec<XmlFolder>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlFolder {
    name: String,
    path: Option<String>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_number<T: std::str::FromStr>(field: &str, v: &Option<String>) -> Result<Option<T>> {
    match non_empty(v) {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("invalid <{field}> value '{s}': expected a whole number")),
    }
}

fn parse_flag(field: &str, v: &Option<String>) -> Result<Option<bool>> {
    match non_empty(v).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("true" | "yes" | "1") => Ok(Some(true)),
        Some("false" | "no" | "0") => Ok(Some(false)),
        Some(other) => bail!("invalid <{field}> value '{other}': expected true or false"),
    }
}

/// Parse config XML text. Missing elements keep their defaults.
pub fn parse_config_xml(contents: &str) -> Result<Config> {
    let parsed: XmlConfig = from_xml_str(contents).context("parse config xml")?;
    xml_to_config(parsed)
}

// Map XmlConfig -> Config
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = non_empty(&parsed.backup_root) {
        cfg.backup_root = PathBuf::from(s);
    }
    if let Some(s) = non_empty(&parsed.adb_path) {
        cfg.adb_path = PathBuf::from(s);
    }
    cfg.device_serial = non_empty(&parsed.device_serial).map(str::to_string);
    if let Some(s) = non_empty(&parsed.device_root) {
        cfg.device_root = s.trim_end_matches('/').to_string();
        cfg.folders = default_folders(&cfg.device_root);
    }

    if let Some(folders) = parsed.folders {
        let mut list = Vec::with_capacity(folders.folder.len());
        for f in folders.folder {
            let name = f.name.trim();
            if name.is_empty() {
                bail!("<folder> entry with an empty <name>");
            }
            let path = match non_empty(&f.path) {
                Some(p) => p.to_string(),
                None => cfg.folder_path_for(name),
            };
            list.push(DeviceFolder::new(name, path));
        }
        if !list.is_empty() {
            cfg.folders = list;
        }
    }

    if let Some(s) = non_empty(&parsed.folder_source) {
        cfg.folder_source = FolderSource::parse(s)
            .with_context(|| format!("invalid <folder_source> value '{s}'"))?;
    }
    if let Some(s) = non_empty(&parsed.organize_timing) {
        cfg.organize_timing = OrganizeTiming::parse(s)
            .with_context(|| format!("invalid <organize_timing> value '{s}'"))?;
    }
    if let Some(b) = parse_flag("include_audio", &parsed.include_audio)? {
        cfg.include_audio = b;
    }
    if let Some(n) = parse_number::<u32>("max_retries", &parsed.max_retries)? {
        cfg.max_retries = n;
    }
    if let Some(n) = parse_number::<u64>("pull_timeout_seconds", &parsed.pull_timeout_seconds)? {
        cfg.pull_timeout = Duration::from_secs(n);
    }
    if let Some(n) = parse_number::<u64>("poll_interval_seconds", &parsed.poll_interval_seconds)? {
        cfg.poll_interval = Duration::from_secs(n.max(1));
    }
    if let Some(b) = parse_flag("delete_after_backup", &parsed.delete_after_backup)? {
        cfg.delete_after_backup = b;
    }
    if let Some(n) = parse_number::<usize>("transfer_workers", &parsed.transfer_workers)? {
        cfg.transfer_workers = n.max(1);
    }
    if let Some(s) = non_empty(&parsed.failure_log) {
        cfg.failure_log = PathBuf::from(s);
    }
    if let Some(s) = non_empty(&parsed.log_level) {
        cfg.log_level = s.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    if let Some(s) = non_empty(&parsed.log_file) {
        cfg.log_file = Some(PathBuf::from(s));
    }

    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    parse_config_xml(&contents).with_context(|| format!("in config '{}'", path.display()))
}

/// Commented template reflecting the built-in defaults.
pub fn template_contents() -> String {
    let defaults = Config::default();
    let folders: String = defaults
        .folders
        .iter()
        .map(|f| format!("    <folder><name>{}</name></folder>\n", f.name))
        .collect();
    let log_file = defaults
        .log_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    format!(
        "<!--\n  media_vault configuration (XML)\n\n  backup_root            -> host directory receiving <Folder>/<Category>/<YYYY-MM-DD>/ trees\n  adb_path               -> adb binary (bare name is looked up on PATH)\n  device_serial          -> pick one device when several are attached (optional)\n  device_root            -> device storage root; folders default to <device_root>/DCIM/<name>\n  folders                -> <folder><name>..</name><path>..</path></folder>; path is optional\n  folder_source          -> fixed_list | device_discovered (every folder under DCIM)\n  organize_timing        -> per_folder | end_of_run\n  include_audio          -> also back up .mp3 files (true/false)\n  max_retries            -> attempts per file before it is logged as failed\n  pull_timeout_seconds   -> limit for a single file pull\n  poll_interval_seconds  -> device reconnection polling interval\n  delete_after_backup    -> offer to remove backed-up files from the device (true/false)\n  transfer_workers       -> concurrent pulls per folder (1 = sequential)\n  failure_log            -> failed transfer log (relative to the working directory)\n  log_level              -> quiet | normal | info | debug\n  log_file               -> path to log file (optional; console output still used)\n\n  CLI flags override XML values.\n-->\n<config>\n  <backup_root>{}</backup_root>\n  <adb_path>{}</adb_path>\n  <device_serial></device_serial>\n  <device_root>{}</device_root>\n  <folders>\n{}  </folders>\n  <folder_source>fixed_list</folder_source>\n  <organize_timing>per_folder</organize_timing>\n  <include_audio>false</include_audio>\n  <max_retries>{}</max_retries>\n  <pull_timeout_seconds>{}</pull_timeout_seconds>\n  <poll_interval_seconds>{}</poll_interval_seconds>\n  <delete_after_backup>false</delete_after_backup>\n  <transfer_workers>1</transfer_workers>\n  <failure_log>{}</failure_log>\n  <log_level>normal</log_level>\n  <log_file>{}</log_file>\n</config>\n",
        defaults.backup_root.display(),
        defaults.adb_path.display(),
        defaults.device_root,
        folders,
        defaults.max_retries,
        defaults.pull_timeout.as_secs(),
        defaults.poll_interval.as_secs(),
        defaults.failure_log.display(),
        log_file,
    )
}

/// Create the template config file and its parent directory.
/// Uses secure creation to avoid following attacker-controlled symlinks on Unix.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir '{}'", parent.display()))?;
        let _ = set_dir_mode_0700(parent);
    }

    write_config_secure_new_0600(path, template_contents().as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!(path = %path.display(), "Created template config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let cfg = parse_config_xml(&template_contents()).unwrap();
        let def = Config::default();
        assert_eq!(cfg.backup_root, def.backup_root);
        assert_eq!(cfg.folders, def.folders);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.pull_timeout, Duration::from_secs(300));
        assert!(cfg.device_serial.is_none());
        assert!(!cfg.delete_after_backup);
    }

    #[test]
    fn unknown_element_is_rejected() {
        let err = parse_config_xml("<config><backup_rot>/x</backup_rot></config>").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"), "{err:#}");
    }

    #[test]
    fn bad_number_is_an_error() {
        let err = parse_config_xml("<config><max_retries>three</max_retries></config>").unwrap_err();
        assert!(format!("{err:#}").contains("max_retries"));
    }
}
