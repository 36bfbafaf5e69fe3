//! Data carried through one backup run.
//! - DeviceFolder: a named directory on the device
//! - FolderPlan: scan-phase totals for one folder
//! - TransferRecord: the concluded outcome of one file copy
//! - ProgressState: counters used only for reporting

use serde::Serialize;
use std::path::PathBuf;

/// A named directory on the device, e.g. `Camera` -> `/storage/emulated/0/DCIM/Camera`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFolder {
    pub name: String,
    pub device_path: String,
}

impl DeviceFolder {
    pub fn new(name: impl Into<String>, device_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_path: device_path.into(),
        }
    }
}

/// Scan-phase result for one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderPlan {
    pub name: String,
    pub folder_path: String,
    pub file_count: usize,
    pub total_bytes: u64,
}

impl FolderPlan {
    pub fn empty(folder: &DeviceFolder) -> Self {
        Self {
            name: folder.name.clone(),
            folder_path: folder.device_path.clone(),
            file_count: 0,
            total_bytes: 0,
        }
    }

    pub fn folder(&self) -> DeviceFolder {
        DeviceFolder::new(&self.name, &self.folder_path)
    }

    pub fn total_mb(&self) -> f64 {
        bytes_to_mb(self.total_bytes)
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    Success,
    Failed,
}

/// Outcome of one file copy. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub folder: String,
    pub source_path: String,
    pub dest_path: PathBuf,
    pub status: TransferStatus,
    pub error: Option<String>,
    pub attempts: u32,
}

impl TransferRecord {
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Reporting counters; `processed_files` only grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub processed_files: usize,
    pub total_files: usize,
    pub current_folder_index: usize,
    pub current_folder_total: usize,
    /// Files finished in the current folder.
    pub current_folder_done: usize,
}

impl ProgressState {
    pub fn folder_percent(&self) -> f64 {
        percent(self.current_folder_done, self.current_folder_total)
    }

    pub fn total_percent(&self) -> f64 {
        percent(self.processed_files, self.total_files)
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (done as f64 / total as f64 * 100.0).min(100.0)
    }
}
