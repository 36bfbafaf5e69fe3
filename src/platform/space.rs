//! Free space on the backup volume.

use std::io;
use std::path::Path;

use crate::errors::VaultError;

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
#[cfg(windows)]
use std::os::windows::ffi::OsStrExt;

pub fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.1} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{n} B")
    }
}

/// `InsufficientSpace` when `required` bytes would not fit under `dest`.
/// A failed query is not treated as a shortage.
pub fn check_free_space(dest: &Path, required: u64) -> Result<(), VaultError> {
    match free_space_bytes(dest) {
        Ok(available) if available < required => Err(VaultError::InsufficientSpace {
            required,
            available,
            dest: dest.to_path_buf(),
        }),
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::debug!(dest = %dest.display(), error = %e, "Free space query failed");
            Ok(())
        }
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn free_space_bytes(path: &Path) -> io::Result<u64> {
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let mut s: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut s) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((s.f_bavail as u64).saturating_mul(s.f_frsize as u64))
}

#[cfg(windows)]
pub fn free_space_bytes(path: &Path) -> io::Result<u64> {
    use std::iter::once;
    use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;
    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(once(0)).collect();
    let mut free_avail: u64 = 0;
    let mut total: u64 = 0;
    let mut total_free: u64 = 0;
    let ok = unsafe {
        GetDiskFreeSpaceExW(wide.as_ptr(), &mut free_avail, &mut total, &mut total_free)
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(free_avail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn temp_dir_has_space_for_nothing_and_not_for_everything() {
        let dir = tempdir().unwrap();
        assert!(free_space_bytes(dir.path()).unwrap() > 0);
        assert!(check_free_space(dir.path(), 0).is_ok());
        let err = check_free_space(dir.path(), u64::MAX).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientSpace { .. }));
    }
}
