//! User-facing console output.
//! Prefixed, colored messages (colors only when stdout is a TTY) and the
//! [`ConsoleReporter`] that turns engine progress events into terminal lines.

use owo_colors::OwoColorize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{FolderPlan, ProgressState, TransferRecord};
use crate::progress::ProgressReporter;
use crate::transport::{TransportError, device_file_name};

fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {msg}");
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {msg}");
    }
}

/// Plain line, no prefix.
pub fn print_user(msg: &str) {
    println!("{msg}");
}

/// Section heading, bold on a TTY.
pub fn print_heading(msg: &str) {
    if is_tty() {
        println!("\n{}", msg.bold());
    } else {
        println!("\n{msg}");
    }
}

/// `[ 42.5%] Camera 3/10 (20%) IMG_0001.jpg`: overall percent first, then
/// the position and share done within the folder.
pub fn progress_line(progress: &ProgressState, folder: &str, file_name: &str) -> String {
    format!(
        "[{:>5.1}%] {} {}/{} ({:.0}%) {}",
        progress.total_percent(),
        folder,
        progress.current_folder_done + 1,
        progress.current_folder_total,
        progress.folder_percent(),
        file_name
    )
}

/// Prints engine progress to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    quiet: bool,
    waiting: AtomicBool,
    folder: std::sync::Mutex<String>,
}

impl ConsoleReporter {
    /// `quiet` drops the per-file lines; warnings and errors still print.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Self::default()
        }
    }

    fn end_wait_line(&self) {
        if self.waiting.swap(false, Ordering::Relaxed) {
            println!();
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn on_folder_scanned(&self, plan: &FolderPlan) {
        print_user(&format!(
            "  {:<16} {:>6} files  {:>10.1} MB",
            plan.name,
            plan.file_count,
            plan.total_mb()
        ));
    }

    fn on_folder_started(&self, name: &str, dest: &Path, progress: &ProgressState) {
        if let Ok(mut f) = self.folder.lock() {
            *f = name.to_string();
        }
        print_heading(&format!(
            "{name} ({} files) -> {}",
            progress.current_folder_total,
            dest.display()
        ));
    }

    fn on_file_started(&self, progress: &ProgressState, source: &str, _dest: &Path) {
        if self.quiet {
            return;
        }
        let folder = self.folder.lock().map(|f| f.clone()).unwrap_or_default();
        print_user(&progress_line(progress, &folder, device_file_name(source)));
    }

    fn on_retry(&self, source: &str, attempt: u32, max: u32, error: &TransportError) {
        print_warn(&format!(
            "{} failed (attempt {attempt}/{max}): {}; retrying",
            device_file_name(source),
            error.message
        ));
    }

    fn on_device_lost(&self, source: &str) {
        print_warn(&format!(
            "Device disconnected while copying {}. Reconnect it to continue.",
            device_file_name(source)
        ));
    }

    fn on_device_wait(&self, _polls: u64) {
        if !self.waiting.swap(true, Ordering::Relaxed) {
            print!("Waiting for device");
        }
        print!(".");
        let _ = std::io::stdout().flush();
    }

    fn on_device_ready(&self) {
        if self.waiting.load(Ordering::Relaxed) {
            self.end_wait_line();
            print_success("Device connected");
        }
    }

    fn on_file_completed(&self, _progress: &ProgressState, record: &TransferRecord) {
        if !record.is_success() {
            print_warn(&format!(
                "Gave up on {} after {} attempts",
                device_file_name(&record.source_path),
                record.attempts
            ));
        }
    }

    fn on_folder_error(&self, name: &str, error: &str) {
        print_error(&format!("Skipping folder {name}: {error}"));
    }

    fn on_removed(&self, source: &str, result: Result<(), &TransportError>) {
        if let Err(e) = result {
            print_warn(&format!("Could not delete {source} from device: {}", e.message));
        }
    }
}
