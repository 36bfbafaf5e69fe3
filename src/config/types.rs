//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.
//! - FolderSource picks between the configured list and device discovery.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backup::{BackupSettings, DeletePolicy, OrganizeTiming};
use crate::failure_log::DEFAULT_FAILURE_LOG;
use crate::model::DeviceFolder;
use crate::scan::MediaFilter;
use crate::transfer::{DEFAULT_MAX_RETRIES, DEFAULT_PULL_TIMEOUT, RetryPolicy};

use super::{DEFAULT_FOLDER_NAMES, DEVICE_ROOT_DEFAULT, paths};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Where the list of device folders comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderSource {
    /// `Config::folders` as configured.
    #[default]
    FixedList,
    /// Every non-hidden subdirectory of `<device_root>/DCIM`.
    DeviceDiscovered,
}

impl FolderSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "fixedlist" | "fixed" | "list" => Some(FolderSource::FixedList),
            "devicediscovered" | "discovered" | "discover" | "device" => {
                Some(FolderSource::DeviceDiscovered)
            }
            _ => None,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host directory receiving `<Folder>/<Category>/<date>/` trees
    pub backup_root: PathBuf,
    /// Path or bare name of the adb binary
    pub adb_path: PathBuf,
    /// Target one device when several are attached
    pub device_serial: Option<String>,
    /// Device storage root, parent of `DCIM`
    pub device_root: String,
    pub folders: Vec<DeviceFolder>,
    pub folder_source: FolderSource,
    pub organize_timing: OrganizeTiming,
    pub include_audio: bool,
    pub max_retries: u32,
    pub pull_timeout: Duration,
    pub poll_interval: Duration,
    /// Offer deletion of device originals (still confirmed per folder unless --auto)
    pub delete_after_backup: bool,
    /// Concurrent pulls per folder (1 = sequential)
    pub transfer_workers: usize,
    pub failure_log: PathBuf,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_root: paths::default_backup_root(),
            adb_path: PathBuf::from("adb"),
            device_serial: None,
            device_root: DEVICE_ROOT_DEFAULT.to_string(),
            folders: default_folders(DEVICE_ROOT_DEFAULT),
            folder_source: FolderSource::FixedList,
            organize_timing: OrganizeTiming::PerFolder,
            include_audio: false,
            max_retries: DEFAULT_MAX_RETRIES,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            poll_interval: Duration::from_secs(1),
            delete_after_backup: false,
            transfer_workers: 1,
            failure_log: PathBuf::from(DEFAULT_FAILURE_LOG),
            log_level: LogLevel::Normal,
            log_file: paths::default_log_path(),
        }
    }
}

impl Config {
    /// Device directory holding the camera/app media folders.
    pub fn dcim_root(&self) -> String {
        format!("{}/DCIM", self.device_root.trim_end_matches('/'))
    }

    /// Path of a configured folder that only gave a name.
    pub fn folder_path_for(&self, name: &str) -> String {
        format!("{}/{}", self.dcim_root(), name)
    }

    pub fn filter(&self) -> MediaFilter {
        MediaFilter::new(self.include_audio)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.max(1),
            pull_timeout: self.pull_timeout,
            poll_interval: self.poll_interval,
        }
    }

    /// Orchestrator settings; the deletion policy is chosen by the caller.
    pub fn backup_settings(&self, delete: DeletePolicy) -> BackupSettings {
        BackupSettings {
            retry: self.retry_policy(),
            filter: self.filter(),
            organize_timing: self.organize_timing,
            delete,
            workers: self.transfer_workers.max(1),
        }
    }
}

/// The built-in folder list under `<device_root>/DCIM`.
pub fn default_folders(device_root: &str) -> Vec<DeviceFolder> {
    let dcim = format!("{}/DCIM", device_root.trim_end_matches('/'));
    DEFAULT_FOLDER_NAMES
        .iter()
        .map(|name| DeviceFolder::new(*name, format!("{dcim}/{name}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_folders_live_under_dcim() {
        let folders = default_folders("/storage/emulated/0/");
        assert_eq!(folders.len(), DEFAULT_FOLDER_NAMES.len());
        assert_eq!(folders[0], DeviceFolder::new("Camera", "/storage/emulated/0/DCIM/Camera"));
        assert!(folders.iter().any(|f| f.device_path == "/storage/emulated/0/DCIM/WhatsApp Media"));
    }

    #[test]
    fn retry_policy_never_drops_below_one_attempt() {
        let cfg = Config {
            max_retries: 0,
            ..Config::default()
        };
        assert_eq!(cfg.retry_policy().max_retries, 1);
    }

    #[test]
    fn folder_source_parse() {
        assert_eq!(FolderSource::parse("fixed_list"), Some(FolderSource::FixedList));
        assert_eq!(FolderSource::parse("DeviceDiscovered"), Some(FolderSource::DeviceDiscovered));
        assert_eq!(FolderSource::parse("nope"), None);
    }
}
