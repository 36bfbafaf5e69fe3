//! Post-backup verification.
//! Compares what the device still holds against the host tree by file name
//! and size. Host files are indexed recursively, so organized
//! (`Category/YYYY-MM-DD/`) and unorganized layouts both match.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::model::DeviceFolder;
use crate::scan::{MediaFilter, list_media};
use crate::transport::{Transport, device_file_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerifyStatus {
    Present,
    SizeMismatch,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyEntry {
    pub folder: String,
    pub source_path: String,
    pub status: VerifyStatus,
    pub device_size: Option<u64>,
    pub host_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub entries: Vec<VerifyEntry>,
    /// Folders whose device listing failed.
    pub unreadable_folders: Vec<String>,
}

impl VerifyReport {
    pub fn count(&self, status: VerifyStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn is_complete(&self) -> bool {
        self.unreadable_folders.is_empty()
            && self.entries.iter().all(|e| e.status == VerifyStatus::Present)
    }
}

struct HostFile {
    path: PathBuf,
    size: u64,
}

/// Check every media file of `folders` against `<backup_root>/<name>`.
pub fn verify<T: Transport + ?Sized>(
    transport: &T,
    backup_root: &Path,
    folders: &[DeviceFolder],
    filter: MediaFilter,
) -> VerifyReport {
    let mut report = VerifyReport::default();

    for folder in folders {
        let files = match list_media(transport, folder, filter) {
            Ok(files) => files,
            Err(e) => {
                warn!(folder = %folder.name, error = %e, "Cannot list folder for verification");
                report.unreadable_folders.push(folder.name.clone());
                continue;
            }
        };
        let index = index_host_files(&backup_root.join(&folder.name));

        for source in files {
            let name = device_file_name(&source);
            let device_size = transport.stat_size(&source).ok();
            let candidates = index.candidates(name);

            let (status, host_path) = match candidates.first() {
                None => (VerifyStatus::Missing, None),
                Some(first) => match device_size {
                    // Same-named photos from different days may share a stem;
                    // any copy with the right size counts.
                    Some(size) => match candidates.iter().find(|h| h.size == size) {
                        Some(hit) => (VerifyStatus::Present, Some(hit.path.clone())),
                        None => (VerifyStatus::SizeMismatch, Some(first.path.clone())),
                    },
                    None => (VerifyStatus::Present, Some(first.path.clone())),
                },
            };
            report.entries.push(VerifyEntry {
                folder: folder.name.clone(),
                source_path: source,
                status,
                device_size,
                host_path,
            });
        }
    }

    info!(
        present = report.count(VerifyStatus::Present),
        size_mismatch = report.count(VerifyStatus::SizeMismatch),
        missing = report.count(VerifyStatus::Missing),
        "Verification finished"
    );
    report
}

/// Host files by literal name, and by name with collision suffixes removed.
#[derive(Default)]
struct HostIndex {
    exact: HashMap<String, Vec<HostFile>>,
    stripped: HashMap<String, Vec<HostFile>>,
}

impl HostIndex {
    /// Literal matches first: a device file may itself be called `photo (1).jpg`.
    fn candidates(&self, name: &str) -> Vec<&HostFile> {
        let exact = self.exact.get(name).into_iter().flatten();
        let stripped = self.stripped.get(name).into_iter().flatten();
        exact.chain(stripped).collect()
    }
}

fn index_host_files(dir: &Path) -> HostIndex {
    let mut index = HostIndex::default();
    if !dir.is_dir() {
        return index;
    }
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let path = entry.into_path();
        let base = original_name(&name);
        if base != name {
            index.stripped.entry(base).or_default().push(HostFile {
                path: path.clone(),
                size,
            });
        }
        index.exact.entry(name).or_default().push(HostFile { path, size });
    }
    index
}

/// Undo the suffixes added on name collisions: `" (n)"` from the copy phase
/// and `"_<secs>"` / `"_<secs>_<n>"` from the organizer.
pub fn original_name(host_name: &str) -> String {
    let (stem, ext) = match host_name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, Some(e)),
        _ => (host_name, None),
    };

    let mut stem = stem;
    // Organizer suffix first: it was applied last.
    stem = strip_seconds_suffix(stem);
    stem = strip_copy_counter(stem);

    match ext {
        Some(e) => format!("{stem}.{e}"),
        None => stem.to_string(),
    }
}

/// Unix seconds stay ten digits wide until 2286.
const EPOCH_DIGITS: usize = 10;

fn strip_seconds_suffix(stem: &str) -> &str {
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    // "_<secs>_<n>"
    if let Some((head, n)) = stem.rsplit_once('_') {
        if is_digits(n) {
            if let Some((base, secs)) = head.rsplit_once('_') {
                if is_digits(secs) && secs.len() == EPOCH_DIGITS && !base.is_empty() {
                    return base;
                }
            }
            if n.len() == EPOCH_DIGITS && !head.is_empty() {
                return head;
            }
        }
    }
    stem
}

fn strip_copy_counter(stem: &str) -> &str {
    let Some(inner) = stem.strip_suffix(')') else {
        return stem;
    };
    match inner.rsplit_once(" (") {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => stem,
    }
}
