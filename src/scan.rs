//! File enumerator.
//! Lists media files in a device folder (extension allow-list) and totals
//! their sizes for the scan phase.

use tracing::{debug, warn};

use crate::model::{DeviceFolder, FolderPlan};
use crate::transport::{Transport, TransportError, device_file_name};

const PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];
const AUDIO_EXTENSIONS: [&str; 1] = ["mp3"];

/// Extension allow-list applied to device listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaFilter {
    pub include_audio: bool,
}

impl MediaFilter {
    pub fn new(include_audio: bool) -> Self {
        Self { include_audio }
    }

    /// True when the path's lowercase extension is on the allow-list.
    pub fn accepts(&self, path: &str) -> bool {
        let name = device_file_name(path);
        let Some((stem, ext)) = name.rsplit_once('.') else {
            return false;
        };
        if stem.is_empty() {
            return false;
        }
        let ext = ext.to_ascii_lowercase();
        PHOTO_EXTENSIONS.contains(&ext.as_str())
            || VIDEO_EXTENSIONS.contains(&ext.as_str())
            || (self.include_audio && AUDIO_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Copy-phase listing. Errors propagate so the caller can record a folder failure.
pub fn list_media<T: Transport + ?Sized>(
    transport: &T,
    folder: &DeviceFolder,
    filter: MediaFilter,
) -> Result<Vec<String>, TransportError> {
    let keep = |p: &str| filter.accepts(p);
    let mut files = transport.find_files(&folder.device_path, &keep)?;
    // Adapters are expected to filter, but never trust a listing blindly.
    files.retain(|p| filter.accepts(p));
    Ok(files)
}

/// Scan-phase totals for one folder. Never fails: a transport error yields an
/// empty plan and the run carries on.
pub fn scan<T: Transport + ?Sized>(
    transport: &T,
    folder: &DeviceFolder,
    filter: MediaFilter,
) -> FolderPlan {
    let files = match list_media(transport, folder, filter) {
        Ok(files) => files,
        Err(e) => {
            warn!(folder = %folder.name, path = %folder.device_path, error = %e, "Scan failed; treating folder as empty");
            return FolderPlan::empty(folder);
        }
    };

    let mut total_bytes: u64 = 0;
    for file in &files {
        match transport.stat_size(file) {
            Ok(size) => total_bytes = total_bytes.saturating_add(size),
            Err(e) => debug!(file, error = %e, "Size query failed; counting as 0"),
        }
    }

    debug!(folder = %folder.name, files = files.len(), total_bytes, "Scanned folder");
    FolderPlan {
        name: folder.name.clone(),
        folder_path: folder.device_path.clone(),
        file_count: files.len(),
        total_bytes,
    }
}

/// Turn discovered device directories into folders named after their last component.
pub fn folders_from_dirs(dirs: &[String]) -> Vec<DeviceFolder> {
    dirs.iter()
        .map(|d| DeviceFolder::new(device_file_name(d), d.trim_end_matches('/')))
        .filter(|f| !f.name.is_empty() && !f.name.starts_with('.'))
        .collect()
}
