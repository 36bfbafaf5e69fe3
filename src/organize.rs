//! Organizer.
//! Sorts every file under a root into `<root>/<Category>/<YYYY-MM-DD>/<name>`
//! using the file's local modification date.
//!
//! Notes:
//! - Files already in place are left alone, so running twice is harmless.
//! - An occupied destination is never overwritten; the current time (seconds)
//!   is inserted before the extension instead.
//! - Rename is tried first; across filesystems we copy, carry the mtime over
//!   and remove the original.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use filetime::FileTime;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Photos,
    Videos,
    Other,
}

impl Category {
    /// Classify by (case-insensitive) extension.
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp4" | "mov" | "avi") => Category::Videos,
            Some("jpg" | "jpeg" | "png") => Category::Photos,
            _ => Category::Other,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Photos => "Photos",
            Category::Videos => "Videos",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeSummary {
    pub moved: usize,
    pub already_in_place: usize,
    pub errors: usize,
    /// `(from, to)` for every file moved in this pass.
    pub moves: Vec<(PathBuf, PathBuf)>,
}

/// Organize every file below `root`. Per-file errors are logged and counted.
pub fn organize(root: &Path) -> OrganizeSummary {
    let mut summary = OrganizeSummary::default();
    if !root.is_dir() {
        debug!(root = %root.display(), "Nothing to organize");
        return summary;
    }

    // Snapshot first: the walk must not see files we are moving around.
    let files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry while organizing");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    for file in files {
        match organize_file(root, &file) {
            Ok(Placement::Moved(dest)) => {
                debug!(src = %file.display(), dest = %dest.display(), "Organized file");
                summary.moved += 1;
                summary.moves.push((file, dest));
            }
            Ok(Placement::InPlace) => summary.already_in_place += 1,
            Err(e) => {
                warn!(file = %file.display(), error = %format!("{e:#}"), "Could not organize file");
                summary.errors += 1;
            }
        }
    }

    info!(
        root = %root.display(),
        moved = summary.moved,
        in_place = summary.already_in_place,
        errors = summary.errors,
        "Organize pass finished"
    );
    summary
}

enum Placement {
    Moved(PathBuf),
    InPlace,
}

fn organize_file(root: &Path, file: &Path) -> Result<Placement> {
    let meta = fs::metadata(file).with_context(|| format!("stat '{}'", file.display()))?;
    let modified = meta
        .modified()
        .with_context(|| format!("read mtime of '{}'", file.display()))?;
    let name = file
        .file_name()
        .with_context(|| format!("missing file name: {}", file.display()))?;

    let dest_dir = root
        .join(Category::of(file).dir_name())
        .join(date_folder(modified));
    let candidate = dest_dir.join(name);
    if candidate == file {
        return Ok(Placement::InPlace);
    }

    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("create directory '{}'", dest_dir.display()))?;
    let dest = unique_destination(&candidate);
    move_preserving_mtime(file, &dest, FileTime::from_system_time(modified))?;
    Ok(Placement::Moved(dest))
}

/// `YYYY-MM-DD` of a timestamp in local time.
pub fn date_folder(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format("%Y-%m-%d").to_string()
}

/// Return `candidate` if free, else insert the current unix time in seconds
/// before the extension ("<stem>_<secs>[_<n>].<ext>").
pub fn unique_destination(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let stem = candidate
        .file_stem()
        .map(|s| s.to_owned())
        .unwrap_or_else(|| OsStr::new("file").to_owned());
    let ext = candidate.extension().map(|e| e.to_owned());

    let build = |suffix: String| -> PathBuf {
        let mut name = OsString::new();
        name.push(&stem);
        name.push(suffix);
        if let Some(ref e) = ext {
            name.push(".");
            name.push(e);
        }
        candidate.with_file_name(name)
    };

    let dest = build(format!("_{secs}"));
    if !dest.exists() {
        return dest;
    }
    // Several collisions within the same second.
    let mut n: u32 = 2;
    loop {
        let dest = build(format!("_{secs}_{n}"));
        if !dest.exists() {
            return dest;
        }
        n = n.saturating_add(1);
    }
}

fn move_preserving_mtime(src: &Path, dest: &Path, mtime: FileTime) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(error = %e, src = %src.display(), "Rename failed, falling back to copy+remove");
            fs::copy(src, dest)
                .with_context(|| format!("copy '{}' -> '{}'", src.display(), dest.display()))?;
            if let Err(e) = filetime::set_file_mtime(dest, mtime) {
                debug!(error = %e, dest = %dest.display(), "Could not carry modification time over");
            }
            fs::remove_file(src)
                .with_context(|| format!("remove original '{}'", src.display()))?;
            Ok(())
        }
    }
}
