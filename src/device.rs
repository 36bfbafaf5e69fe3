//! Connectivity monitor.
//! Blocks until the transport reports at least one attached device.

use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::VaultError;
use crate::progress::ProgressReporter;
use crate::shutdown::Shutdown;
use crate::transport::Transport;

/// Default delay between device polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll `list_devices` every `interval` until it returns a non-empty set.
///
/// Query errors count as "no device yet". There is no timeout; the only way out
/// besides a device appearing is a shutdown request.
pub fn wait_for_device<T: Transport + ?Sized>(
    transport: &T,
    interval: Duration,
    shutdown: &Shutdown,
    reporter: &dyn ProgressReporter,
) -> Result<BTreeSet<String>, VaultError> {
    let mut polls: u64 = 0;
    loop {
        if shutdown.is_requested() {
            return Err(VaultError::Interrupted);
        }
        match transport.list_devices() {
            Ok(devices) if !devices.is_empty() => {
                if polls > 0 {
                    info!(polls, devices = ?devices, "Device connected");
                } else {
                    debug!(devices = ?devices, "Device present");
                }
                reporter.on_device_ready();
                return Ok(devices);
            }
            Ok(_) => debug!(polls, "No device attached yet"),
            Err(e) => debug!(polls, error = %e, "Device query failed; treating as absent"),
        }
        polls += 1;
        reporter.on_device_wait(polls);
        if !shutdown.sleep(interval) {
            return Err(VaultError::Interrupted);
        }
    }
}
