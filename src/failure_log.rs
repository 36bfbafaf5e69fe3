//! Append-only failure log (`failed_transfers.log`).
//!
//! Each entry is written with a single `write_all` while holding an exclusive
//! advisory lock, so concurrent transfer workers never interleave lines.
//! The file is opened in append mode per entry; no handle is held across a run.

use chrono::Local;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_FAILURE_LOG: &str = "failed_transfers.log";
pub const SEPARATOR_WIDTH: usize = 50;

#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Four-line entry for a file that exhausted its retries.
    pub fn record_transfer(&self, source: &str, dest: &Path) {
        let entry = format!(
            "Failed to backup: {}\nDestination: {}\nTime: {}\n{}\n",
            source,
            dest.display(),
            timestamp(),
            separator()
        );
        self.append_logged(&entry);
    }

    /// Entry for a folder that could not be processed at all.
    pub fn record_folder_error(&self, folder: &str, error: &str) {
        let entry = format!(
            "Error processing folder {}: {}\nTime: {}\n{}\n",
            folder,
            error,
            timestamp(),
            separator()
        );
        self.append_logged(&entry);
    }

    fn append_logged(&self, entry: &str) {
        if let Err(e) = self.append(entry) {
            warn!(path = %self.path.display(), error = %e, "Could not write failure log entry");
        }
    }

    fn append(&self, entry: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let written = file.write_all(entry.as_bytes()).and_then(|_| file.flush());
        let _ = FileExt::unlock(&file);
        written
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}
