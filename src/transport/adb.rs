//! ADB adapter.
//! Shells out to the `adb` binary and translates its exit status and stderr
//! into [`TransportError`] kinds. This is the only place that knows which
//! stderr texts mean "device went away".

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::{Transport, TransportError, TransportErrorKind};

/// stderr fragments that adb prints when the device is gone.
const DISCONNECT_MARKERS: [&str; 4] = [
    "device offline",
    "no devices/emulators found",
    "no devices found",
    "device unauthorized",
];

/// `adb -s <serial>` names the missing device: `adb: device 'R58M123' not found`.
fn is_named_device_missing(text: &str) -> bool {
    text.split("device '").skip(1).any(|rest| {
        rest.split_once('\'')
            .is_some_and(|(_, tail)| tail.trim_start().starts_with("not found"))
    })
}

/// Deadline for short shell queries (find/stat/rm/devices).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Transport backed by the Android Debug Bridge command line tool.
#[derive(Debug, Clone)]
pub struct AdbTransport {
    adb: PathBuf,
    serial: Option<String>,
    command_timeout: Duration,
}

impl AdbTransport {
    pub fn new(adb: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            adb: adb.into(),
            serial,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn adb_path(&self) -> &Path {
        &self.adb
    }

    /// Pre-flight check: run `adb version` and return its first line.
    pub fn probe(&self) -> Result<String, TransportError> {
        let out = self.run([OsStr::new("version")], self.command_timeout)?;
        if !out.success {
            return Err(TransportError::new(
                TransportErrorKind::Unavailable,
                format!(
                    "'{} version' failed; the installation looks corrupted: {}",
                    self.adb.display(),
                    out.stderr.trim()
                ),
            ));
        }
        Ok(out.stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    fn shell(&self, command: &str) -> Result<CommandOutput, TransportError> {
        trace!(command, "adb shell");
        self.run([OsStr::new("shell"), OsStr::new(command)], self.command_timeout)
    }

    fn run<I, S>(&self, args: I, timeout: Duration) -> Result<CommandOutput, TransportError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            TransportError::new(
                TransportErrorKind::Unavailable,
                format!("cannot start '{}': {}", self.adb.display(), e),
            )
        })?;
        wait_with_deadline(child, timeout)
    }
}

/// Wait for `child` to exit, draining both pipes on helper threads so a chatty
/// process cannot block on a full pipe. Kills the child after `timeout`.
fn wait_with_deadline(mut child: Child, timeout: Duration) -> Result<CommandOutput, TransportError> {
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    join_reader(stdout);
                    join_reader(stderr);
                    return Err(TransportError::timeout(format!(
                        "command did not finish within {}s",
                        timeout.as_secs()
                    )));
                }
                thread::sleep(POLL_SLICE);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(TransportError::failed(format!("wait failed: {e}")));
            }
        }
    };

    Ok(CommandOutput {
        success: status.success(),
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Map a failed command's output to a transport error kind.
pub fn classify_failure(stderr: &str, stdout: &str) -> TransportError {
    let combined = format!("{} {}", stderr, stdout).to_ascii_lowercase();
    let message = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    if DISCONNECT_MARKERS.iter().any(|m| combined.contains(m))
        || is_named_device_missing(&combined)
    {
        TransportError::disconnected(message)
    } else {
        TransportError::failed(message)
    }
}

/// Quote a device path for the device's POSIX shell.
pub fn shell_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Parse `adb devices` output into the serials of devices in the `device` state.
pub fn parse_devices(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .skip_while(|l| !l.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            (state == "device").then(|| serial.to_string())
        })
        .collect()
}

/// Split `find` output into non-empty paths (adb shell may emit CRLF).
pub fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|l| l.trim_end_matches('\r').trim())
        .filter(|l| !l.is_empty() && l.starts_with('/'))
        .map(str::to_string)
        .collect()
}

impl Transport for AdbTransport {
    fn list_devices(&self) -> Result<BTreeSet<String>, TransportError> {
        let out = self.run([OsStr::new("devices")], self.command_timeout)?;
        if !out.success {
            return Err(classify_failure(&out.stderr, &out.stdout));
        }
        let devices = parse_devices(&out.stdout);
        match &self.serial {
            Some(serial) => Ok(devices.into_iter().filter(|d| d == serial).collect()),
            None => Ok(devices),
        }
    }

    fn find_files(
        &self,
        path: &str,
        keep: &dyn Fn(&str) -> bool,
    ) -> Result<Vec<String>, TransportError> {
        let out = self.shell(&format!("find {} -type f", shell_quote(path)))?;
        let listing = parse_listing(&out.stdout);
        if !out.success {
            let err = classify_failure(&out.stderr, &out.stdout);
            // find exits non-zero on unreadable subdirectories but still lists the rest.
            if err.is_disconnect() || listing.is_empty() {
                return Err(err);
            }
            warn!(path, error = %err, "Partial device listing");
        }
        Ok(listing.into_iter().filter(|p| keep(p)).collect())
    }

    fn list_dirs(&self, path: &str) -> Result<Vec<String>, TransportError> {
        let out = self.shell(&format!(
            "find {} -mindepth 1 -maxdepth 1 -type d",
            shell_quote(path)
        ))?;
        if !out.success {
            return Err(classify_failure(&out.stderr, &out.stdout));
        }
        let mut dirs = parse_listing(&out.stdout);
        dirs.sort();
        Ok(dirs)
    }

    fn stat_size(&self, path: &str) -> Result<u64, TransportError> {
        let out = self.shell(&format!("stat -c %s {}", shell_quote(path)))?;
        if !out.success {
            return Err(classify_failure(&out.stderr, &out.stdout));
        }
        let text = out.stdout.trim();
        text.parse::<u64>()
            .map_err(|_| TransportError::failed(format!("unparsable size '{text}' for {path}")))
    }

    fn pull(&self, src: &str, dst: &Path, timeout: Duration) -> Result<(), TransportError> {
        debug!(src, dst = %dst.display(), "adb pull");
        let args: [OsString; 3] = ["pull".into(), src.into(), dst.as_os_str().to_owned()];
        let out = self.run(args, timeout)?;
        if out.success {
            Ok(())
        } else {
            Err(classify_failure(&out.stderr, &out.stdout))
        }
    }

    fn remove(&self, path: &str) -> Result<(), TransportError> {
        let out = self.shell(&format!("rm {}", shell_quote(path)))?;
        // Older adb builds report success even when the remote command failed.
        if !out.success || out.stderr.contains("rm:") || out.stdout.contains("rm:") {
            return Err(classify_failure(&out.stderr, &out.stdout));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devices_output_keeps_only_ready_devices() {
        let out = "* daemon started successfully\nList of devices attached\nR58M123\tdevice\nemulator-5554\toffline\nXYZ\tunauthorized\n\n";
        let devs = parse_devices(out);
        assert_eq!(devs.len(), 1);
        assert!(devs.contains("R58M123"));
    }

    #[test]
    fn devices_output_empty_list() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn disconnect_markers_are_classified() {
        let e = classify_failure("error: device offline\n", "");
        assert_eq!(e.kind, TransportErrorKind::Disconnected);
        let e = classify_failure("adb: error: no devices/emulators found", "");
        assert_eq!(e.kind, TransportErrorKind::Disconnected);
        let e = classify_failure("", "error: no devices found");
        assert_eq!(e.kind, TransportErrorKind::Disconnected);
        let e = classify_failure("adb: device 'R58M123' not found\n", "");
        assert_eq!(e.kind, TransportErrorKind::Disconnected);
        let e = classify_failure("adb: device unauthorized.\nThis adb server's $ADB_VENDOR_KEYS is not set", "");
        assert_eq!(e.kind, TransportErrorKind::Disconnected);
    }

    #[test]
    fn missing_remote_file_is_not_a_missing_device() {
        let e = classify_failure("adb: error: remote object '/sdcard/DCIM/device 'x.jpg' does not exist", "");
        assert_eq!(e.kind, TransportErrorKind::Failed);
        let e = classify_failure("stat: '/sdcard/a.jpg': No such file or directory (not found)", "");
        assert_eq!(e.kind, TransportErrorKind::Failed);
    }

    #[test]
    fn other_errors_are_plain_failures() {
        let e = classify_failure("adb: error: failed to stat remote object '/x': No such file or directory", "");
        assert_eq!(e.kind, TransportErrorKind::Failed);
        assert!(e.message.contains("No such file"));
    }

    #[test]
    fn quoting_handles_spaces_and_quotes() {
        assert_eq!(shell_quote("/sdcard/WhatsApp Media"), "'/sdcard/WhatsApp Media'");
        assert_eq!(shell_quote("it's.jpg"), "'it'\\''s.jpg'");
    }

    #[test]
    fn listing_strips_crlf_and_noise() {
        let out = "/sdcard/DCIM/Camera/a.jpg\r\n\r\n/sdcard/DCIM/Camera/b.mp4\r\nfind: '/x': Permission denied\n";
        assert_eq!(
            parse_listing(out),
            vec!["/sdcard/DCIM/Camera/a.jpg", "/sdcard/DCIM/Camera/b.mp4"]
        );
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let t = AdbTransport::new("/definitely/not/here/adb", None);
        let err = t.probe().unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Unavailable);
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let err = wait_with_deadline(child, Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
    }
}
