//! Logging initialisation for the deployer binary.
//!
//! Records go to two `tracing-subscriber` fmt layers: the running log file, as
//! plain `YYYY-mm-dd HH:MM:SS LEVEL message` lines, and the console, coloured
//! by level. The file always receives info and above so a quiet console run
//! still leaves a complete trail. The crate logs through the `log` facade;
//! installing the subscriber also installs the `tracing-log` bridge.

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use camino::Utf8Path;
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, fmt};

const FILE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CONSOLE_TIME_FORMAT: &str = "%H:%M:%S";

/// Maps `-v`/`-q` to the console level.
///
/// # Examples
///
/// ```
/// use fractal_deployer::logging::console_level;
/// use tracing_subscriber::filter::LevelFilter;
///
/// assert_eq!(console_level(0, false), LevelFilter::INFO);
/// assert_eq!(console_level(1, false), LevelFilter::DEBUG);
/// assert_eq!(console_level(0, true), LevelFilter::WARN);
/// ```
#[must_use]
pub const fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::WARN;
    }
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Level written to the log file for a given console level.
#[must_use]
pub fn file_level(console: LevelFilter) -> LevelFilter {
    console.max(LevelFilter::INFO)
}

/// Where the log file goes for this run, if anywhere.
///
/// A dry run never writes one, and neither does a run whose source directory
/// is missing: that run stops at the precondition check and must leave the
/// host untouched.
#[must_use]
pub fn log_file_for(config: &DeployConfig, dry_run: bool) -> Option<&Utf8Path> {
    if dry_run || !config.source_dir.is_dir() {
        return None;
    }
    Some(&config.paths.log_file)
}

/// Opens the log file for appending, creating it and its parent directory
/// when needed.
///
/// # Errors
///
/// Returns [`DeployError::LogFile`] if the file cannot be opened.
pub fn open_log_file(path: &Utf8Path) -> Result<File> {
    let open = || -> std::io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|source| DeployError::LogFile {
        path: path.to_owned(),
        source,
    })
}

/// Builds the subscriber: a console layer writing to `console` at
/// `console_level`, plus a plain-text file layer when `log_file` is given.
pub fn subscriber<W>(
    console_level: LevelFilter,
    console: W,
    ansi: bool,
    log_file: Option<File>,
) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let console_layer = fmt::layer()
        .with_writer(console)
        .with_ansi(ansi)
        .with_target(false)
        .with_timer(ChronoLocal::new(CONSOLE_TIME_FORMAT.to_owned()))
        .with_filter(console_level);

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_timer(ChronoLocal::new(FILE_TIME_FORMAT.to_owned()))
            .with_filter(file_level(console_level))
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
}

/// Installs the stderr and log-file subscriber as the global default.
///
/// # Errors
///
/// Returns [`TryInitError`] if a global subscriber or `log` backend is
/// already installed.
pub fn init_logging(
    console_level: LevelFilter,
    ansi: bool,
    log_file: Option<File>,
) -> std::result::Result<(), TryInitError> {
    subscriber(console_level, std::io::stderr, ansi, log_file).try_init()
}
