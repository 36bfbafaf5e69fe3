//! JSON run report written next to the backup.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backup::BackupReport;

/// `backup_report_<YYYYMMDD_HHMMSS>.json`
pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("backup_report_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Serialize `report` into `backup_root`, named after the run's start time.
pub fn write_report(backup_root: &Path, report: &BackupReport) -> Result<PathBuf> {
    let path = backup_root.join(report_file_name(report.started_at));
    let file = File::create(&path)
        .with_context(|| format!("create report '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, report)
        .with_context(|| format!("serialize report '{}'", path.display()))?;
    w.write_all(b"\n")?;
    w.flush()
        .with_context(|| format!("flush report '{}'", path.display()))?;
    info!(path = %path.display(), "Wrote backup report");
    Ok(path)
}
