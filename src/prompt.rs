//! Interactive prompts (dialoguer).
//! Each prompt loops until it has a usable answer and returns a typed value.

use anyhow::{Result, bail};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use media_vault::{FolderPlan, VaultError};
use media_vault::cli::sanitize_path_input;
use media_vault::config::validate_backup_root;
use media_vault::output as out;

/// Ctrl-C inside a prompt surfaces as an `Interrupted` read; treat it like
/// an interrupt anywhere else in the run.
fn prompt_error(e: dialoguer::Error) -> anyhow::Error {
    match e {
        dialoguer::Error::IO(err) if err.kind() == io::ErrorKind::Interrupted => {
            VaultError::Interrupted.into()
        }
        other => other.into(),
    }
}

pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact().map_err(prompt_error)?)
}

/// Default location or a typed one; validated (created, writable) before returning.
pub fn choose_backup_root(default: &Path) -> Result<PathBuf> {
    let theme = ColorfulTheme::default();
    let items = [
        format!("Use default location ({})", default.display()),
        "Choose a different location".to_string(),
    ];
    let choice = Select::with_theme(&theme)
        .with_prompt("Backup location")
        .items(&items)
        .default(0)
        .interact().map_err(prompt_error)?;

    if choice == 0 {
        return validate_backup_root(default);
    }

    loop {
        let raw: String = Input::with_theme(&theme)
            .with_prompt("Path (quotes are fine)")
            .interact_text().map_err(prompt_error)?;
        let path = sanitize_path_input(&raw);
        match validate_backup_root(&path) {
            Ok(real) => return Ok(real),
            Err(e) => {
                out::print_error(&format!("{e:#}"));
                if !confirm("Try again?", true)? {
                    bail!("no usable backup location chosen");
                }
            }
        }
    }
}

pub fn folder_label(plan: &FolderPlan) -> String {
    format!(
        "{} ({} files, {:.1} MB)",
        plan.name,
        plan.file_count,
        plan.total_mb()
    )
}

/// Indices of the folders to back up; folders with files are preselected.
pub fn select_folders(plans: &[FolderPlan]) -> Result<Vec<usize>> {
    let labels: Vec<String> = plans.iter().map(folder_label).collect();
    let defaults: Vec<bool> = plans.iter().map(|p| p.file_count > 0).collect();
    loop {
        let picked = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt("Folders to back up (space toggles, enter confirms)")
            .items(&labels)
            .defaults(&defaults)
            .interact().map_err(prompt_error)?;
        if !picked.is_empty() {
            return Ok(picked);
        }
        out::print_warn("No folders selected.");
        if !confirm("Select again?", true)? {
            return Ok(Vec::new());
        }
    }
}

/// Names of the folders whose device originals should be deleted after backup.
pub fn select_delete_folders(names: &[String]) -> Result<Vec<String>> {
    let defaults = vec![true; names.len()];
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Delete backed-up files from these device folders")
        .items(names)
        .defaults(&defaults)
        .interact().map_err(prompt_error)?;
    Ok(picked.into_iter().map(|i| names[i].clone()).collect())
}

/// Block until the user presses Enter.
pub fn wait_for_enter(msg: &str) {
    print!("\n{msg}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
