//! Transfer engine.
//! Copies one device file to the host with bounded retries.
//!
//! Per-file state machine:
//! - pull succeeds -> Success
//! - device dropped -> wait for reconnection, pull again; does not use up a retry
//! - timeout / other error -> count an attempt; retry while attempts < max_retries
//!
//! Every retry copies the whole file again; there is no partial resume.

use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::device::{POLL_INTERVAL, wait_for_device};
use crate::progress::ProgressReporter;
use crate::shutdown::Shutdown;
use crate::transport::Transport;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub pull_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// `attempts` counts every pull issued, reconnect retries included.
    Success { attempts: u32 },
    Failure { attempts: u32, error: String },
    /// Shutdown requested before the file could be copied.
    Interrupted,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }
}

pub struct TransferEngine<'a, T: Transport + ?Sized> {
    transport: &'a T,
    policy: RetryPolicy,
    shutdown: &'a Shutdown,
    reporter: &'a dyn ProgressReporter,
}

impl<'a, T: Transport + ?Sized> TransferEngine<'a, T> {
    pub fn new(
        transport: &'a T,
        policy: RetryPolicy,
        shutdown: &'a Shutdown,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            transport,
            policy,
            shutdown,
            reporter,
        }
    }

    /// Pull `source` into `dest`.
    pub fn copy_file(&self, source: &str, dest: &Path) -> TransferOutcome {
        let max = self.policy.max_retries.max(1);
        let mut failures: u32 = 0;
        let mut pulls: u32 = 0;

        loop {
            if self.shutdown.is_requested() {
                return TransferOutcome::Interrupted;
            }
            pulls += 1;
            match self.transport.pull(source, dest, self.policy.pull_timeout) {
                Ok(()) => {
                    debug!(src = source, dest = %dest.display(), pulls, "Pulled file");
                    return TransferOutcome::Success { attempts: pulls };
                }
                Err(e) if e.is_disconnect() => {
                    warn!(src = source, error = %e, "Device disconnected; waiting for reconnection");
                    self.reporter.on_device_lost(source);
                    if wait_for_device(
                        self.transport,
                        self.policy.poll_interval,
                        self.shutdown,
                        self.reporter,
                    )
                    .is_err()
                    {
                        return TransferOutcome::Interrupted;
                    }
                    info!(src = source, "Device back; resuming transfer");
                }
                Err(e) => {
                    failures += 1;
                    if failures < max {
                        warn!(src = source, attempt = failures, max, error = %e, "Transfer failed; retrying");
                        self.reporter.on_retry(source, failures, max, &e);
                        continue;
                    }
                    warn!(src = source, attempts = failures, error = %e, "Transfer failed; giving up");
                    discard_partial(dest);
                    return TransferOutcome::Failure {
                        attempts: pulls,
                        error: e.to_string(),
                    };
                }
            }
        }
    }
}

/// Remove whatever a failed pull left behind (best-effort).
fn discard_partial(dest: &Path) {
    if dest.is_file() {
        match fs::remove_file(dest) {
            Ok(()) => debug!(dest = %dest.display(), "Removed partial file"),
            Err(e) => debug!(dest = %dest.display(), error = %e, "Could not remove partial file"),
        }
    }
}
