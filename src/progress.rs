//! Progress reporting hooks.
//!
//! The engine never prints; it calls a [`ProgressReporter`] so the CLI (or a
//! test) decides what to show. Every method has a no-op default.

use std::path::Path;

use crate::model::{FolderPlan, ProgressState, TransferRecord};
use crate::transport::TransportError;

pub trait ProgressReporter: Send + Sync {
    /// A folder finished its scan.
    fn on_folder_scanned(&self, _plan: &FolderPlan) {}

    /// Copy phase entered a new folder.
    fn on_folder_started(&self, _name: &str, _dest: &Path, _progress: &ProgressState) {}

    /// About to pull one file.
    fn on_file_started(&self, _progress: &ProgressState, _source: &str, _dest: &Path) {}

    /// A pull attempt failed and will be retried.
    fn on_retry(&self, _source: &str, _attempt: u32, _max: u32, _error: &TransportError) {}

    /// The device dropped; waiting for it to come back.
    fn on_device_lost(&self, _source: &str) {}

    /// One poll of the device list came back empty.
    fn on_device_wait(&self, _polls: u64) {}

    fn on_device_ready(&self) {}

    /// A file copy concluded (success or failure).
    fn on_file_completed(&self, _progress: &ProgressState, _record: &TransferRecord) {}

    /// A whole folder could not be processed.
    fn on_folder_error(&self, _name: &str, _error: &str) {}

    /// Result of deleting a backed-up file from the device.
    fn on_removed(&self, _source: &str, _result: Result<(), &TransportError>) {}
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressReporter for Silent {}
