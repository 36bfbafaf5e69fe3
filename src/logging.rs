//! Tracing initialization.
//! One console layer (stderr) and an optional non-blocking file layer, both
//! compact text or JSON, under a single level filter.
//!
//! - stdout belongs to prompts and the progress line, so console events go to stderr.
//! - `normal` shows warnings and errors only; `info` adds per-folder progress,
//!   `debug` every pull and retry.
//! - The file layer is skipped (with a warning) when the path has a symlinked
//!   ancestor or cannot be opened; the run continues with console logging.

use anyhow::Result;
use chrono::Local;
use media_vault::output as out;
use media_vault::platform::open_log_file_secure_append;
use media_vault::{LogLevel, path_has_symlink_ancestor};
use std::fmt as stdfmt;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Registry;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// DD/MM/YY HH:MM:SS in local time.
struct LocalHumanTime;

impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

fn level_filter(lvl: &LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    }
}

fn console_layer(json: bool) -> BoxedLayer {
    let layer = tsfmt::layer()
        .with_timer(LocalHumanTime)
        .with_writer(std::io::stderr);
    if json {
        layer.json().with_target(true).boxed()
    } else {
        layer.compact().with_target(false).boxed()
    }
}

fn file_layer(writer: NonBlocking, json: bool) -> BoxedLayer {
    let layer = tsfmt::layer()
        .with_timer(LocalHumanTime)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
        .with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.compact().boxed()
    }
}

fn open_file_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let refused = match path_has_symlink_ancestor(path) {
        Ok(false) => None,
        Ok(true) => Some(format!("an ancestor of {} is a symlink", path.display())),
        Err(e) => Some(format!("cannot inspect {}: {e}", path.display())),
    };
    if let Some(reason) = refused {
        out::print_warn(&format!("File logging disabled: {reason}"));
        return None;
    }

    match open_log_file_secure_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            out::print_warn(&format!(
                "File logging disabled: cannot open {}: {e}",
                path.display()
            ));
            None
        }
    }
}

/// Install the global subscriber. The returned guard flushes the file layer
/// when dropped and must live until the process exits.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let mut layers = vec![console_layer(json)];
    let mut guard = None;
    if let Some((writer, g)) = log_file.and_then(open_file_writer) {
        layers.push(file_layer(writer, json));
        guard = Some(g);
    }

    let filter = EnvFilter::default().add_directive(level_filter(lvl).into());
    registry().with(layers).with(filter).try_init()?;
    Ok(guard)
}
