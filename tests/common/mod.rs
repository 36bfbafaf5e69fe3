//! Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use media_vault::{
    BackupSettings, DeviceFolder, RetryPolicy, Shutdown, Transport, TransportError,
};

pub const SERIAL: &str = "FAKE01";

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    device_script: VecDeque<BTreeSet<String>>,
    pull_script: HashMap<String, VecDeque<Result<(), TransportError>>>,
    always_fail: HashMap<String, TransportError>,
    failing_listings: HashSet<String>,
    failing_removes: HashSet<String>,
    pulls: Vec<String>,
    removed: Vec<String>,
    device_polls: usize,
    cancel_after: Option<(usize, Shutdown)>,
}

/// Device files live in memory; a successful pull writes their bytes to the
/// host path, a failed one leaves a partial file behind like adb does.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<State>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), contents.to_vec());
        self
    }

    /// Outcomes for the next pulls of `path`; afterwards pulls succeed.
    pub fn script_pull(self, path: &str, outcomes: Vec<Result<(), TransportError>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pull_script
            .insert(path.to_string(), outcomes.into());
        self
    }

    /// Every pull of `path` fails with `error`.
    pub fn always_fail(self, path: &str, error: TransportError) -> Self {
        self.state
            .lock()
            .unwrap()
            .always_fail
            .insert(path.to_string(), error);
        self
    }

    pub fn fail_listing(self, dir: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_listings
            .insert(dir.to_string());
        self
    }

    pub fn fail_remove(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_removes
            .insert(path.to_string());
        self
    }

    /// Answers for the next `list_devices` calls; afterwards the device is present.
    pub fn script_devices(self, answers: Vec<Vec<&str>>) -> Self {
        self.state.lock().unwrap().device_script = answers
            .into_iter()
            .map(|a| a.into_iter().map(str::to_string).collect())
            .collect();
        self
    }

    /// Request shutdown once `n` pulls have been issued.
    pub fn cancel_after(self, n: usize, shutdown: Shutdown) -> Self {
        self.state.lock().unwrap().cancel_after = Some((n, shutdown));
        self
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state.lock().unwrap().pulls.clone()
    }

    pub fn pull_count(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .filter(|p| *p == path)
            .count()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn device_polls(&self) -> usize {
        self.state.lock().unwrap().device_polls
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }
}

impl Transport for FakeTransport {
    fn list_devices(&self) -> Result<BTreeSet<String>, TransportError> {
        let mut st = self.state.lock().unwrap();
        st.device_polls += 1;
        Ok(st
            .device_script
            .pop_front()
            .unwrap_or_else(|| BTreeSet::from([SERIAL.to_string()])))
    }

    fn find_files(
        &self,
        path: &str,
        keep: &dyn Fn(&str) -> bool,
    ) -> Result<Vec<String>, TransportError> {
        let st = self.state.lock().unwrap();
        if st.failing_listings.contains(path) {
            return Err(TransportError::failed(format!(
                "find: '{path}': Permission denied"
            )));
        }
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(st
            .files
            .keys()
            .filter(|k| k.starts_with(&prefix) && keep(k))
            .cloned()
            .collect())
    }

    fn list_dirs(&self, path: &str) -> Result<Vec<String>, TransportError> {
        let st = self.state.lock().unwrap();
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let dirs: BTreeSet<String> = st
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split_once('/').map(|(d, _)| format!("{prefix}{d}")))
            .collect();
        Ok(dirs.into_iter().collect())
    }

    fn stat_size(&self, path: &str) -> Result<u64, TransportError> {
        let st = self.state.lock().unwrap();
        st.files
            .get(path)
            .map(|c| c.len() as u64)
            .ok_or_else(|| TransportError::failed(format!("stat: '{path}': No such file")))
    }

    fn pull(&self, src: &str, dst: &Path, _timeout: Duration) -> Result<(), TransportError> {
        let mut st = self.state.lock().unwrap();
        st.pulls.push(src.to_string());
        let pulls = st.pulls.len();
        if let Some((n, shutdown)) = &st.cancel_after {
            if pulls >= *n {
                shutdown.request();
            }
        }

        let scripted = st.pull_script.get_mut(src).and_then(|q| q.pop_front());
        let outcome = match (scripted, st.always_fail.get(src)) {
            (Some(r), _) => r,
            (None, Some(e)) => Err(e.clone()),
            (None, None) => Ok(()),
        };

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        match outcome {
            Ok(()) => {
                let contents = st
                    .files
                    .get(src)
                    .cloned()
                    .ok_or_else(|| TransportError::failed(format!("'{src}' does not exist")))?;
                fs::write(dst, contents).unwrap();
                Ok(())
            }
            Err(e) => {
                if !e.is_disconnect() {
                    fs::write(dst, b"partial").unwrap();
                }
                Err(e)
            }
        }
    }

    fn remove(&self, path: &str) -> Result<(), TransportError> {
        let mut st = self.state.lock().unwrap();
        if st.failing_removes.contains(path) {
            return Err(TransportError::failed(format!(
                "rm: {path}: Read-only file system"
            )));
        }
        st.files.remove(path);
        st.removed.push(path.to_string());
        Ok(())
    }
}

/// Retry policy with a short poll interval so reconnect waits stay fast.
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        pull_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(5),
    }
}

pub fn fast_settings() -> BackupSettings {
    BackupSettings {
        retry: fast_policy(3),
        ..BackupSettings::default()
    }
}

pub fn camera() -> DeviceFolder {
    DeviceFolder::new("Camera", "/sdcard/DCIM/Camera")
}
