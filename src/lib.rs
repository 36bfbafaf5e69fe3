//! Core library for `media_vault`.
//!
//! Backs up photos and videos from an Android device to a host directory
//! through a [`Transport`] (ADB in production):
//! - scan the selected device folders for media and total their sizes
//! - pull each file with bounded retries, waiting out device disconnects
//! - record failures in an append-only log and keep going
//! - sort the copies into `<Folder>/<Category>/<YYYY-MM-DD>/`
//! - optionally delete the device originals of selected folders
//!
//! The binary adds config loading, logging and the interactive prompts.

pub mod backup;
pub mod cli;
pub mod config;
pub mod device;
pub mod errors;
pub mod failure_log;
pub mod model;
pub mod organize;
pub mod output;
pub mod platform;
pub mod progress;
pub mod report;
pub mod scan;
pub mod shutdown;
pub mod transfer;
pub mod transport;
pub mod verify;

pub use backup::{
    BackupReport, BackupSettings, DeletePolicy, FolderError, OrganizeTiming, Orchestrator,
    RemoveFailure, ScanSummary,
};
pub use config::{
    CONFIG_ENV, Config, FolderSource, LoadedConfig, LogLevel, default_config_path,
    default_log_path, load_or_init, path_has_symlink_ancestor,
};
pub use device::wait_for_device;
pub use errors::VaultError;
pub use failure_log::FailureLog;
pub use model::{DeviceFolder, FolderPlan, ProgressState, TransferRecord, TransferStatus};
pub use organize::{Category, OrganizeSummary, organize};
pub use progress::{ProgressReporter, Silent};
pub use scan::{MediaFilter, folders_from_dirs, list_media, scan};
pub use shutdown::Shutdown;
pub use transfer::{RetryPolicy, TransferEngine, TransferOutcome};
pub use transport::{AdbTransport, Transport, TransportError, TransportErrorKind};
pub use verify::{VerifyReport, VerifyStatus, verify};
