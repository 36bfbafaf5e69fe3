//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the interrupt handler,
//! checks the bridge, then drives either a verify pass or a full backup run
//! with prompts (or without them under --auto).

use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use media_vault::cli::Args;
use media_vault::config::{Config, FolderSource, validate_backup_root};
use media_vault::output::{self as out, ConsoleReporter};
use media_vault::platform::{check_free_space, format_bytes};
use media_vault::report::write_report;
use media_vault::transport::device_file_name;
use media_vault::{
    AdbTransport, BackupReport, CONFIG_ENV, DeletePolicy, DeviceFolder, FailureLog, LogLevel,
    Orchestrator, ProgressReporter, Shutdown, Transport, VaultError, VerifyStatus,
    default_config_path, folders_from_dirs, load_or_init, verify, wait_for_device,
};

use crate::logging::init_tracing;
use crate::prompt;

/// Failed files listed in the final summary.
const SUMMARY_FAILURES: usize = 5;

/// Exit status when the run finished but some files could not be copied.
const EXIT_INCOMPLETE: u8 = 2;

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    let loaded = load_or_init()?;
    let mut cfg = loaded.config;
    args.apply_overrides(&mut cfg);

    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)
        .inspect_err(|e| out::print_error(&format!("Failed to initialize logging: {e}")))?;

    if loaded.created {
        out::print_success(&format!(
            "First run: wrote a config template to {}",
            loaded.path.display()
        ));
        out::print_info("Defaults are in effect; edit that file to change them.");
    }

    // First Ctrl-C asks the run to stop at the next file boundary; a second
    // one flushes the log and exits immediately.
    let shutdown = Shutdown::new();
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let shutdown = shutdown.clone();
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            if shutdown.is_requested() {
                if let Ok(mut g) = guard_slot.lock() {
                    let _ = g.take();
                }
                std::process::exit(130);
            }
            shutdown.request();
            out::print_warn("Interrupt received; stopping after the current file (Ctrl-C again to quit now)");
        })?;
    }

    debug!(?args, config = %loaded.path.display(), "Starting media_vault");
    let result = match execute(&args, &cfg, &shutdown) {
        Err(e) if matches!(e.downcast_ref::<VaultError>(), Some(VaultError::Interrupted)) => {
            Ok(finish_interrupted(&args))
        }
        other => other,
    };

    if let Err(e) = &result {
        match e.downcast_ref::<VaultError>() {
            Some(ve) => error!(code = ve.code(), kind = ve.kind(), error = %ve, "Run aborted"),
            None => error!(error = %format!("{e:#}"), "Run aborted"),
        }
    }

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn print_config_location() {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            PathBuf::from(p).display()
        ));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default media_vault config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet; the first run writes a template.");
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e:#}")),
    }
}

fn execute(args: &Args, cfg: &Config, shutdown: &Shutdown) -> Result<ExitCode> {
    let transport = AdbTransport::new(&cfg.adb_path, cfg.device_serial.clone());
    let version = transport
        .probe()
        .map_err(|e| VaultError::BridgeUnavailable(e.to_string()))?;
    info!(adb = %transport.adb_path().display(), %version, "ADB available");

    let reporter = ConsoleReporter::new(cfg.log_level == LogLevel::Quiet);

    if args.verify {
        return verify_only(args, cfg, &transport, shutdown, &reporter);
    }

    let interactive = !args.auto;
    let delete_wanted = if cfg.delete_after_backup {
        true
    } else if interactive {
        prompt::confirm("Delete files from the device after they are backed up?", false)?
    } else {
        false
    };

    let backup_root = if interactive && args.backup_root.is_none() {
        prompt::choose_backup_root(&cfg.backup_root)?
    } else {
        validate_backup_root(&cfg.backup_root)?
    };
    out::print_info(&format!("Backup location: {}", backup_root.display()));

    if !device_ready(&transport, cfg, shutdown, &reporter)? {
        return Ok(finish_interrupted(args));
    }

    let folders = resolve_folders(&transport, cfg);
    out::print_heading("Scanning folders...");
    let failure_log = FailureLog::new(&cfg.failure_log);
    let probe_settings = cfg.backup_settings(DeletePolicy::Keep);
    let orchestrator = Orchestrator::new(&transport, probe_settings, &failure_log, shutdown, &reporter);
    let mut summary = orchestrator.plan(&folders);
    if shutdown.is_requested() {
        return Ok(finish_interrupted(args));
    }

    if interactive && args.folders.is_empty() {
        let picked = prompt::select_folders(&summary.plans)?;
        let keep: Vec<String> = picked.iter().map(|&i| summary.plans[i].name.clone()).collect();
        summary.retain(|p| keep.contains(&p.name));
    }
    if summary.total_files() == 0 {
        out::print_info("No media files to back up.");
        return Ok(finish(args, ExitCode::SUCCESS));
    }

    out::print_info(&format!(
        "{} files ({:.1} MB) in {} folder(s)",
        summary.total_files(),
        summary.total_mb(),
        summary.plans.len()
    ));
    if let Err(e) = check_free_space(&backup_root, summary.total_bytes()) {
        warn!(code = e.code(), kind = e.kind(), error = %e, "Backup may not fit");
        if let VaultError::InsufficientSpace { required, available, .. } = &e {
            out::print_warn(&format!(
                "The backup needs about {} but only {} is free.",
                format_bytes(*required),
                format_bytes(*available)
            ));
        }
        if interactive && !prompt::confirm("Continue anyway?", false)? {
            return Ok(finish(args, ExitCode::SUCCESS));
        }
    }

    if interactive && !prompt::confirm("Start backup?", true)? {
        out::print_info("Backup cancelled.");
        return Ok(finish(args, ExitCode::SUCCESS));
    }

    let delete = if !delete_wanted {
        DeletePolicy::Keep
    } else if interactive {
        DeletePolicy::only(prompt::select_delete_folders(&summary.names())?)
    } else {
        DeletePolicy::AllFolders
    };

    let orchestrator = Orchestrator::new(
        &transport,
        cfg.backup_settings(delete),
        &failure_log,
        shutdown,
        &reporter,
    );
    let report = orchestrator.execute(&backup_root, &summary);
    print_summary(&report, &failure_log);

    if args.report {
        match write_report(&backup_root, &report) {
            Ok(path) => out::print_info(&format!("Report written to {}", path.display())),
            Err(e) => out::print_warn(&format!("Could not write report: {e:#}")),
        }
    }

    if report.interrupted {
        return Ok(finish_interrupted(args));
    }
    let code = if report.failed.is_empty() && report.folder_errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    };
    Ok(finish(args, code))
}

fn verify_only(
    args: &Args,
    cfg: &Config,
    transport: &AdbTransport,
    shutdown: &Shutdown,
    reporter: &dyn ProgressReporter,
) -> Result<ExitCode> {
    let backup_root = cfg.backup_root.clone();
    if !backup_root.is_dir() {
        return Err(VaultError::BackupRootInvalid {
            path: backup_root,
            context: "nothing to verify; directory does not exist".into(),
        }
        .into());
    }
    if !device_ready(transport, cfg, shutdown, reporter)? {
        return Ok(finish_interrupted(args));
    }

    let folders = resolve_folders(transport, cfg);
    let report = verify(transport, &backup_root, &folders, cfg.filter());

    out::print_heading("Verification");
    out::print_user(&format!(
        "  present: {}  size mismatch: {}  missing: {}",
        report.count(VerifyStatus::Present),
        report.count(VerifyStatus::SizeMismatch),
        report.count(VerifyStatus::Missing)
    ));
    for entry in report
        .entries
        .iter()
        .filter(|e| e.status != VerifyStatus::Present)
        .take(SUMMARY_FAILURES)
    {
        out::print_user(&format!("  {:?}: {}", entry.status, entry.source_path));
    }
    for folder in &report.unreadable_folders {
        out::print_warn(&format!("Could not list {folder} on the device"));
    }

    let code = if report.is_complete() {
        out::print_success("Every device file has a backup copy.");
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    };
    Ok(finish(args, code))
}

/// Wait for a device; false when interrupted.
fn device_ready<T: Transport + ?Sized>(
    transport: &T,
    cfg: &Config,
    shutdown: &Shutdown,
    reporter: &dyn ProgressReporter,
) -> Result<bool> {
    match wait_for_device(transport, cfg.poll_interval, shutdown, reporter) {
        Ok(devices) => {
            info!(?devices, "Using device");
            Ok(true)
        }
        Err(VaultError::Interrupted) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn resolve_folders<T: Transport + ?Sized>(transport: &T, cfg: &Config) -> Vec<DeviceFolder> {
    match cfg.folder_source {
        FolderSource::FixedList => cfg.folders.clone(),
        FolderSource::DeviceDiscovered => {
            let root = cfg.dcim_root();
            match transport.list_dirs(&root) {
                Ok(dirs) if !dirs.is_empty() => folders_from_dirs(&dirs),
                Ok(_) => {
                    warn!(root = %root, "No folders found on device; using configured list");
                    cfg.folders.clone()
                }
                Err(e) => {
                    warn!(root = %root, error = %e, "Folder discovery failed; using configured list");
                    cfg.folders.clone()
                }
            }
        }
    }
}

fn print_summary(report: &BackupReport, failure_log: &FailureLog) {
    out::print_heading("Backup summary");
    out::print_user(&format!("  copied:  {}", report.successful.len()));
    out::print_user(&format!("  failed:  {}", report.failed.len()));
    if !report.removed.is_empty() || !report.remove_failures.is_empty() {
        out::print_user(&format!(
            "  removed from device: {} ({} could not be removed)",
            report.removed.len(),
            report.remove_failures.len()
        ));
    }
    for fe in &report.folder_errors {
        out::print_warn(&format!("Folder {} was skipped: {}", fe.folder, fe.error));
    }

    if !report.failed.is_empty() {
        out::print_user("\n  First failed files:");
        for rec in report.failed.iter().take(SUMMARY_FAILURES) {
            out::print_user(&format!("    {}", device_file_name(&rec.source_path)));
        }
        if report.failed.len() > SUMMARY_FAILURES {
            out::print_user(&format!(
                "    ... and {} more",
                report.failed.len() - SUMMARY_FAILURES
            ));
        }
    }
    if failure_log.exists() && (!report.failed.is_empty() || !report.folder_errors.is_empty()) {
        out::print_info(&format!("Details: {}", failure_log.path().display()));
    }
    if report.interrupted {
        out::print_warn("The backup was interrupted; rerun to copy the remaining files.");
    } else if report.failed.is_empty() && report.folder_errors.is_empty() {
        out::print_success("Backup complete.");
    }
}

fn finish_interrupted(args: &Args) -> ExitCode {
    out::print_warn("Interrupted by user.");
    finish(args, ExitCode::SUCCESS)
}

fn finish(args: &Args, code: ExitCode) -> ExitCode {
    if !args.auto {
        prompt::wait_for_enter("Press Enter to exit...");
    }
    code
}
