//! Device transport boundary.
//! The rest of the crate talks to the device only through [`Transport`]; the
//! concrete ADB adapter lives in [`adb`].
//!
//! Errors are classified once, in the adapter, into a [`TransportErrorKind`]
//! so callers never inspect error text to decide whether the device dropped.

pub mod adb;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub use adb::AdbTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Device went away (offline / not attached). Recoverable by waiting.
    Disconnected,
    /// The command did not finish within its deadline.
    Timeout,
    /// The bridge binary itself could not be started.
    Unavailable,
    /// Any other non-zero status.
    Failed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Disconnected => "disconnected",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Unavailable => "unavailable",
            TransportErrorKind::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Disconnected, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Failed, message)
    }

    #[inline]
    pub fn is_disconnect(&self) -> bool {
        self.kind == TransportErrorKind::Disconnected
    }
}

/// Commands the backup engine needs from a device bridge.
///
/// Implementations must be shareable across transfer workers.
pub trait Transport: Send + Sync {
    /// Serials of attached, ready devices.
    fn list_devices(&self) -> Result<BTreeSet<String>, TransportError>;

    /// Regular files below `path` (recursive) for which `keep` returns true.
    fn find_files(
        &self,
        path: &str,
        keep: &dyn Fn(&str) -> bool,
    ) -> Result<Vec<String>, TransportError>;

    /// Immediate subdirectories of `path`, as full device paths.
    fn list_dirs(&self, path: &str) -> Result<Vec<String>, TransportError>;

    /// Size in bytes of a single device file.
    fn stat_size(&self, path: &str) -> Result<u64, TransportError>;

    /// Copy `src` from the device to host `dst`, giving up after `timeout`.
    fn pull(&self, src: &str, dst: &Path, timeout: Duration) -> Result<(), TransportError>;

    /// Delete a device file.
    fn remove(&self, path: &str) -> Result<(), TransportError>;
}

/// Last path component of a device path (device paths always use `/`).
pub fn device_file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_of_device_path() {
        assert_eq!(device_file_name("/sdcard/DCIM/Camera/a.jpg"), "a.jpg");
        assert_eq!(device_file_name("a.jpg"), "a.jpg");
        assert_eq!(device_file_name("/sdcard/DCIM/Camera/"), "Camera");
    }

    #[test]
    fn display_includes_kind() {
        let e = TransportError::timeout("pull exceeded 300s");
        assert_eq!(e.to_string(), "timeout: pull exceeded 300s");
        assert!(!e.is_disconnect());
        assert!(TransportError::disconnected("x").is_disconnect());
    }
}
