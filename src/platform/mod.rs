//! Platform-specific helpers.
//! OS differences (Unix/Windows) sit behind one API: secure creation of the
//! log and config files, and the free-space query used before a backup.

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;
mod space;

#[cfg(unix)]
pub use unix::{
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};

#[cfg(not(unix))]
pub use windows::{
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};

pub use space::{check_free_space, format_bytes, free_space_bytes};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling used for write-then-rename.
/// Pattern: `.media_vault.tmp.<pid>.<nanos>.<seq>`
pub(crate) fn tmp_sibling_name(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".media_vault.tmp.{pid}.{nanos}.{seq}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tmp_names_are_unique_and_hidden() {
        let target = Path::new("/cfg/config.xml");
        let names: HashSet<PathBuf> = (0..16).map(|_| tmp_sibling_name(target)).collect();
        assert_eq!(names.len(), 16);
        for n in &names {
            assert_eq!(n.parent(), Some(Path::new("/cfg")));
            assert!(n.file_name().unwrap().to_string_lossy().starts_with(".media_vault.tmp."));
        }
    }
}
