//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Without --auto every decision is confirmed interactively.
//! - --debug is a shorthand for --log-level debug.
//! - --folder may be repeated; it replaces the configured folder list.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::backup::OrganizeTiming;
use crate::config::types::{Config, FolderSource, LogLevel};

/// Back up photos and videos from an Android device over ADB.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Back up Android photos and videos over ADB, sorted by type and date"
)]
pub struct Args {
    /// Run without prompts: configured location, all folders, no pause at exit.
    #[arg(long, help = "Run without prompts (use configured location and folders)")]
    pub auto: bool,

    /// Remove files from the device once they are safely backed up.
    #[arg(long, help = "Delete backed-up files from the device")]
    pub clean: bool,

    /// Write a JSON report into the backup root when the run finishes.
    #[arg(long, help = "Write backup_report_<timestamp>.json into the backup root")]
    pub report: bool,

    /// Only compare device files against an existing backup; copy nothing.
    #[arg(long, help = "Verify an existing backup against the device and exit")]
    pub verify: bool,

    #[arg(long, value_hint = ValueHint::DirPath, help = "Override the backup root directory")]
    pub backup_root: Option<PathBuf>,

    #[arg(long = "adb", value_name = "PATH", value_hint = ValueHint::ExecutablePath, help = "Path to the adb binary")]
    pub adb_path: Option<PathBuf>,

    #[arg(long, short = 's', help = "Serial of the device to use when several are attached")]
    pub serial: Option<String>,

    /// Back up only these folder names (repeatable).
    #[arg(long = "folder", value_name = "NAME", help = "Folder to back up (repeatable)")]
    pub folders: Vec<String>,

    #[arg(long, help = "Discover folders under DCIM on the device instead of the configured list")]
    pub discover: bool,

    #[arg(long, help = "Organize once after all folders instead of after each folder")]
    pub organize_at_end: bool,

    #[arg(long, value_name = "N", help = "Concurrent pulls per folder (1 = sequential)")]
    pub workers: Option<usize>,

    #[arg(long, value_name = "N", help = "Attempts per file before it is logged as failed")]
    pub max_retries: Option<u32>,

    #[arg(long, help = "Also back up .mp3 files")]
    pub include_audio: bool,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Print where media_vault will look for the config file, then exit.
    #[arg(
        long,
        help = "Print the config file location used by media_vault and exit"
    )]
    pub print_config: bool,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(root) = &self.backup_root {
            cfg.backup_root = sanitize_path_input(&root.to_string_lossy());
        }
        if let Some(adb) = &self.adb_path {
            cfg.adb_path = adb.clone();
        }
        if let Some(serial) = &self.serial {
            cfg.device_serial = Some(serial.clone());
        }
        if !self.folders.is_empty() {
            let configured = std::mem::take(&mut cfg.folders);
            cfg.folders = self
                .folders
                .iter()
                .map(|name| {
                    configured
                        .iter()
                        .find(|f| f.name == *name)
                        .cloned()
                        .unwrap_or_else(|| {
                            crate::model::DeviceFolder::new(name, cfg.folder_path_for(name))
                        })
                })
                .collect();
            cfg.folder_source = FolderSource::FixedList;
        }
        if self.discover {
            cfg.folder_source = FolderSource::DeviceDiscovered;
        }
        if self.organize_at_end {
            cfg.organize_timing = OrganizeTiming::EndOfRun;
        }
        if let Some(n) = self.workers {
            cfg.transfer_workers = n.max(1);
        }
        if let Some(n) = self.max_retries {
            cfg.max_retries = n;
        }
        if self.include_audio {
            cfg.include_audio = true;
        }
        if self.clean {
            cfg.delete_after_backup = true;
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
    }
}

/// Clean up a path typed or pasted by a user: surrounding whitespace and
/// quotes (as copied from a file explorer) are removed, then one trailing
/// separator unless the path is a root.
pub fn sanitize_path_input(s: &str) -> PathBuf {
    let trimmed = s.trim();
    let mut inner = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.trim_matches(|c| c == '\'' || c == '"').to_string()
    };

    let is_root = inner == "/" || (inner.len() == 3 && inner.ends_with(":\\"));
    if !is_root && (inner.ends_with('\\') || inner.ends_with('/')) {
        inner.pop();
    }
    PathBuf::from(inner)
}

pub fn parse() -> Args {
    Args::parse()
}
