//! Backup orchestrator.
//!
//! A run has two phases:
//! - plan: scan every folder for totals (the caller may narrow the selection)
//! - execute: per folder, re-list the device, pull each file through the
//!   transfer engine, record the outcome, organize, and finally delete
//!   device originals for folders selected for deletion
//!
//! Nothing in the copy path aborts the run: file failures go to the failure
//! log and the `failed` list, folder failures are logged and skipped.

use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::errors::VaultError;
use crate::failure_log::FailureLog;
use crate::model::{
    DeviceFolder, FolderPlan, ProgressState, TransferRecord, TransferStatus, bytes_to_mb,
};
use crate::organize::{OrganizeSummary, organize};
use crate::progress::ProgressReporter;
use crate::scan::{MediaFilter, list_media, scan};
use crate::shutdown::Shutdown;
use crate::transfer::{RetryPolicy, TransferEngine, TransferOutcome};
use crate::transport::{Transport, device_file_name};

/// When the organizer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OrganizeTiming {
    /// After each folder's files have been attempted.
    #[default]
    PerFolder,
    /// Once, after the last folder.
    EndOfRun,
}

impl OrganizeTiming {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "perfolder" | "folder" => Some(OrganizeTiming::PerFolder),
            "endofrun" | "end" | "once" => Some(OrganizeTiming::EndOfRun),
            _ => None,
        }
    }
}

/// Which device folders, if any, lose their originals after a successful backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    #[default]
    Keep,
    /// Every folder in the run.
    AllFolders,
    /// Only these folder names.
    Folders(BTreeSet<String>),
}

impl DeletePolicy {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DeletePolicy::Folders(names.into_iter().map(Into::into).collect())
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            DeletePolicy::Keep => false,
            DeletePolicy::AllFolders => true,
            DeletePolicy::Folders(set) => !set.is_empty(),
        }
    }

    pub fn applies_to(&self, folder: &str) -> bool {
        match self {
            DeletePolicy::Keep => false,
            DeletePolicy::AllFolders => true,
            DeletePolicy::Folders(set) => set.contains(folder),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub retry: RetryPolicy,
    pub filter: MediaFilter,
    pub organize_timing: OrganizeTiming,
    pub delete: DeletePolicy,
    /// Concurrent pulls per folder; 1 keeps the run strictly sequential.
    pub workers: usize,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            filter: MediaFilter::default(),
            organize_timing: OrganizeTiming::default(),
            delete: DeletePolicy::default(),
            workers: 1,
        }
    }
}

/// Scan-phase results in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub plans: Vec<FolderPlan>,
}

impl ScanSummary {
    pub fn total_files(&self) -> usize {
        self.plans.iter().map(|p| p.file_count).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.plans.iter().map(|p| p.total_bytes).sum()
    }

    pub fn total_mb(&self) -> f64 {
        bytes_to_mb(self.total_bytes())
    }

    /// Narrow the selection before copying starts; order is preserved.
    pub fn retain(&mut self, mut keep: impl FnMut(&FolderPlan) -> bool) {
        self.plans.retain(|p| keep(p));
    }

    pub fn names(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderError {
    pub folder: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveFailure {
    pub source_path: String,
    pub error: String,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub successful: Vec<TransferRecord>,
    pub failed: Vec<TransferRecord>,
    pub folder_errors: Vec<FolderError>,
    pub removed: Vec<String>,
    pub remove_failures: Vec<RemoveFailure>,
    pub organized_files: usize,
    pub interrupted: bool,
}

impl BackupReport {
    fn new() -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            successful: Vec::new(),
            failed: Vec::new(),
            folder_errors: Vec::new(),
            removed: Vec::new(),
            remove_failures: Vec::new(),
            organized_files: 0,
            interrupted: false,
        }
    }

    /// Count an organize pass and point copied records at their new homes.
    fn apply_moves(&mut self, organized: &OrganizeSummary) {
        self.organized_files += organized.moved;
        if organized.moves.is_empty() {
            return;
        }
        let moved: HashMap<&Path, &Path> = organized
            .moves
            .iter()
            .map(|(from, to)| (from.as_path(), to.as_path()))
            .collect();
        for record in &mut self.successful {
            if let Some(to) = moved.get(record.dest_path.as_path()) {
                record.dest_path = to.to_path_buf();
            }
        }
    }

    pub fn successful_sources(&self) -> Vec<&str> {
        self.successful.iter().map(|r| r.source_path.as_str()).collect()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.failed.iter().map(|r| r.source_path.as_str()).collect()
    }
}

struct RunState {
    progress: ProgressState,
    report: BackupReport,
}

pub struct Orchestrator<'a, T: Transport + ?Sized> {
    transport: &'a T,
    settings: BackupSettings,
    failure_log: &'a FailureLog,
    shutdown: &'a Shutdown,
    reporter: &'a dyn ProgressReporter,
}

impl<'a, T: Transport + ?Sized> Orchestrator<'a, T> {
    pub fn new(
        transport: &'a T,
        settings: BackupSettings,
        failure_log: &'a FailureLog,
        shutdown: &'a Shutdown,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            transport,
            settings,
            failure_log,
            shutdown,
            reporter,
        }
    }

    /// Scan phase.
    pub fn plan(&self, folders: &[DeviceFolder]) -> ScanSummary {
        let mut plans = Vec::with_capacity(folders.len());
        for folder in folders {
            if self.shutdown.is_requested() {
                break;
            }
            let plan = scan(self.transport, folder, self.settings.filter);
            self.reporter.on_folder_scanned(&plan);
            plans.push(plan);
        }
        let summary = ScanSummary { plans };
        info!(
            folders = summary.plans.len(),
            files = summary.total_files(),
            bytes = summary.total_bytes(),
            "Scan complete"
        );
        summary
    }

    /// Scan and copy every folder without narrowing.
    pub fn run(&self, backup_root: &Path, folders: &[DeviceFolder]) -> BackupReport {
        let summary = self.plan(folders);
        self.execute(backup_root, &summary)
    }

    /// Copy phase for the (possibly narrowed) scan summary.
    pub fn execute(&self, backup_root: &Path, summary: &ScanSummary) -> BackupReport {
        let state = Mutex::new(RunState {
            progress: ProgressState {
                total_files: summary.total_files(),
                ..ProgressState::default()
            },
            report: BackupReport::new(),
        });
        let mut organize_later: Vec<PathBuf> = Vec::new();

        for (index, plan) in summary.plans.iter().enumerate() {
            if self.shutdown.is_requested() {
                lock(&state).report.interrupted = true;
                break;
            }
            let folder = plan.folder();
            let dest_dir = backup_root.join(&plan.name);
            let files_after: usize = summary.plans[index + 1..]
                .iter()
                .map(|p| p.file_count)
                .sum();

            if let Err(e) = self.backup_folder(&folder, &dest_dir, index, files_after, &state) {
                error!(code = e.code(), kind = e.kind(), folder = %folder.name, error = %e, "Folder failed; continuing with next folder");
                let message = e.to_string();
                self.failure_log.record_folder_error(&folder.name, &message);
                self.reporter.on_folder_error(&folder.name, &message);
                lock(&state).report.folder_errors.push(FolderError {
                    folder: folder.name.clone(),
                    error: message,
                });
            }

            match self.settings.organize_timing {
                OrganizeTiming::PerFolder => {
                    let organized = self.organize_dir(&dest_dir);
                    lock(&state).report.apply_moves(&organized);
                }
                OrganizeTiming::EndOfRun => organize_later.push(dest_dir),
            }

            if lock(&state).report.interrupted {
                break;
            }
        }

        let mut report = state.into_inner().unwrap_or_else(|e| e.into_inner()).report;
        for dir in organize_later {
            let organized = self.organize_dir(&dir);
            report.apply_moves(&organized);
        }

        if report.interrupted {
            warn!("Run interrupted; skipping deletion of device files");
        } else {
            self.remove_backed_up(&mut report);
        }

        report.finished_at = Some(Local::now());
        info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            folder_errors = report.folder_errors.len(),
            removed = report.removed.len(),
            interrupted = report.interrupted,
            "Backup run finished"
        );
        report
    }

    fn backup_folder(
        &self,
        folder: &DeviceFolder,
        dest_dir: &Path,
        index: usize,
        files_after: usize,
        state: &Mutex<RunState>,
    ) -> Result<(), VaultError> {
        info!(folder = %folder.name, src = %folder.device_path, dest = %dest_dir.display(), "Processing folder");
        fs::create_dir_all(dest_dir).map_err(|source| VaultError::Destination {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        // Listed again on purpose: the device may have changed since the scan.
        let files = list_media(self.transport, folder, self.settings.filter).map_err(|source| {
            VaultError::Enumeration {
                folder: folder.name.clone(),
                source,
            }
        })?;

        let jobs = assign_destinations(dest_dir, &files);
        {
            let mut st = lock(state);
            st.progress.current_folder_index = index;
            st.progress.current_folder_total = jobs.len();
            st.progress.current_folder_done = 0;
            st.progress.total_files = st.progress.processed_files + jobs.len() + files_after;
            self.reporter
                .on_folder_started(&folder.name, dest_dir, &st.progress);
        }

        let engine = TransferEngine::new(
            self.transport,
            self.settings.retry,
            self.shutdown,
            self.reporter,
        );
        let process = |(source, dest): &(String, PathBuf)| {
            if self.shutdown.is_requested() {
                lock(state).report.interrupted = true;
                return;
            }
            {
                let st = lock(state);
                self.reporter.on_file_started(&st.progress, source, dest);
            }
            let outcome = engine.copy_file(source, dest);
            self.conclude(&mut lock(state), &folder.name, source, dest, outcome);
        };

        let workers = self.settings.workers.max(1);
        if workers == 1 {
            jobs.iter().for_each(process);
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| jobs.par_iter().for_each(process)),
                Err(e) => {
                    warn!(error = %e, "Could not start transfer workers; copying sequentially");
                    jobs.iter().for_each(process);
                }
            }
        }
        Ok(())
    }

    fn conclude(
        &self,
        state: &mut RunState,
        folder: &str,
        source: &str,
        dest: &Path,
        outcome: TransferOutcome,
    ) {
        let record = match outcome {
            TransferOutcome::Success { attempts } => TransferRecord {
                folder: folder.to_string(),
                source_path: source.to_string(),
                dest_path: dest.to_path_buf(),
                status: TransferStatus::Success,
                error: None,
                attempts,
            },
            TransferOutcome::Failure { attempts, error } => {
                self.failure_log.record_transfer(source, dest);
                TransferRecord {
                    folder: folder.to_string(),
                    source_path: source.to_string(),
                    dest_path: dest.to_path_buf(),
                    status: TransferStatus::Failed,
                    error: Some(error),
                    attempts,
                }
            }
            TransferOutcome::Interrupted => {
                state.report.interrupted = true;
                return;
            }
        };

        state.progress.processed_files += 1;
        state.progress.current_folder_done += 1;
        self.reporter.on_file_completed(&state.progress, &record);
        if record.is_success() {
            state.report.successful.push(record);
        } else {
            state.report.failed.push(record);
        }
    }

    fn organize_dir(&self, dir: &Path) -> OrganizeSummary {
        if !dir.is_dir() {
            return OrganizeSummary::default();
        }
        organize(dir)
    }

    fn remove_backed_up(&self, report: &mut BackupReport) {
        if !self.settings.delete.is_enabled() {
            return;
        }
        let targets: Vec<String> = report
            .successful
            .iter()
            .filter(|r| self.settings.delete.applies_to(&r.folder))
            .map(|r| r.source_path.clone())
            .collect();
        info!(count = targets.len(), "Removing backed-up files from device");

        for source in targets {
            if self.shutdown.is_requested() {
                warn!("Shutdown requested; leaving remaining device files in place");
                break;
            }
            match self.transport.remove(&source) {
                Ok(()) => {
                    debug!(src = %source, "Removed from device");
                    self.reporter.on_removed(&source, Ok(()));
                    report.removed.push(source);
                }
                Err(e) => {
                    warn!(src = %source, error = %e, "Failed to remove from device; backup still counts");
                    self.reporter.on_removed(&source, Err(&e));
                    report.remove_failures.push(RemoveFailure {
                        source_path: source,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

fn lock(state: &Mutex<RunState>) -> std::sync::MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pick a host path for each device file. Names already on disk, or already
/// handed out in this folder (same name in different device subfolders), get
/// a " (n)" suffix before the extension.
fn assign_destinations(dest_dir: &Path, files: &[String]) -> Vec<(String, PathBuf)> {
    let mut taken: HashSet<PathBuf> = HashSet::new();
    files
        .iter()
        .map(|source| {
            let name = device_file_name(source);
            let mut dest = dest_dir.join(name);
            if dest.exists() || taken.contains(&dest) {
                let base = Path::new(name);
                let stem: OsString = base
                    .file_stem()
                    .map(|s| s.to_os_string())
                    .unwrap_or_else(|| OsString::from(name));
                let ext = base.extension().map(|e| e.to_os_string());
                let mut n: u64 = 2;
                loop {
                    let mut candidate = stem.clone();
                    candidate.push(format!(" ({n})"));
                    if let Some(ref e) = ext {
                        candidate.push(".");
                        candidate.push(e);
                    }
                    dest = dest_dir.join(candidate);
                    if !dest.exists() && !taken.contains(&dest) {
                        break;
                    }
                    n += 1;
                }
            }
            taken.insert(dest.clone());
            (source.clone(), dest)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn delete_policy_scoping() {
        assert!(!DeletePolicy::Keep.applies_to("Camera"));
        assert!(DeletePolicy::AllFolders.applies_to("Camera"));
        let only = DeletePolicy::only(["Camera"]);
        assert!(only.is_enabled());
        assert!(only.applies_to("Camera"));
        assert!(!only.applies_to("Screenshots"));
        assert!(!DeletePolicy::only(Vec::<String>::new()).is_enabled());
    }

    #[test]
    fn organize_timing_parse() {
        assert_eq!(OrganizeTiming::parse("per-folder"), Some(OrganizeTiming::PerFolder));
        assert_eq!(OrganizeTiming::parse("EndOfRun"), Some(OrganizeTiming::EndOfRun));
        assert_eq!(OrganizeTiming::parse("end_of_run"), Some(OrganizeTiming::EndOfRun));
        assert_eq!(OrganizeTiming::parse("sometimes"), None);
    }

    #[test]
    fn same_name_in_two_device_subfolders_gets_distinct_destinations() {
        let td = tempdir().unwrap();
        let files = vec![
            "/sdcard/DCIM/Camera/a.jpg".to_string(),
            "/sdcard/DCIM/Camera/old/a.jpg".to_string(),
        ];
        let jobs = assign_destinations(td.path(), &files);
        assert_eq!(jobs[0].1, td.path().join("a.jpg"));
        assert_eq!(jobs[1].1, td.path().join("a (2).jpg"));
    }

    #[test]
    fn existing_host_file_is_not_reused() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("b.mp4"), b"old").unwrap();
        let jobs = assign_destinations(td.path(), &["/x/b.mp4".to_string()]);
        assert_eq!(jobs[0].1, td.path().join("b (2).mp4"));
    }

    #[test]
    fn summary_totals_and_retain() {
        let mut s = ScanSummary {
            plans: vec![
                FolderPlan {
                    name: "Camera".into(),
                    folder_path: "/c".into(),
                    file_count: 2,
                    total_bytes: 10,
                },
                FolderPlan {
                    name: "Screenshots".into(),
                    folder_path: "/s".into(),
                    file_count: 3,
                    total_bytes: 5,
                },
            ],
        };
        assert_eq!(s.total_files(), 5);
        assert_eq!(s.total_bytes(), 15);
        s.retain(|p| p.name == "Screenshots");
        assert_eq!(s.names(), vec!["Screenshots".to_string()]);
    }
}
