//! Logging for the callbridge host.
//!
//! Coloured lines on stderr plus a plain `callbridge.log`, installed once.
//! Library crates only use the `log` facade; this is the one place a logger
//! is set up. Stdout is left alone so it can be piped.

use crate::error::CallbridgeError;

use common::ErrorLocation;

use std::fmt::Arguments;
use std::io::stderr;
use std::panic::Location;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339_millis;
use log::{LevelFilter, Record, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

/// Set by the first call, successful or not.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "callbridge.log";

const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Install the stderr + file logger.
///
/// Safe to call more than once: later calls log a warning and return Ok.
///
/// # Errors
///
/// Returns [`CallbridgeError::Callbridge`] if the log file cannot be created
/// or another logger is already installed.
pub fn initialize(log_dir: &Path) -> Result<(), CallbridgeError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!(
                "Logger initialized with level {LOG_LEVEL:?}, writing {}",
                log_dir.join(LOG_FILE_NAME).display()
            );
        }
    });

    result
}

pub(crate) fn initialize_internal(log_dir: &Path) -> Result<(), CallbridgeError> {
    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let console = Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, message, record, colors.color(record.level()))
        })
        .chain(stderr());

    let log_file = fern::log_file(log_dir.join(LOG_FILE_NAME)).map_err(|e| {
        CallbridgeError::Callbridge {
            message: format!("Failed to create log file in {}: {e}", log_dir.display()),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;

    let file = Dispatch::new()
        .format(|out, message, record| write_line(out, message, record, record.level()))
        .chain(log_file);

    Dispatch::new()
        .level(LOG_LEVEL)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .chain(console)
        .chain(file)
        .apply()
        .map_err(|e| CallbridgeError::Callbridge {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}

fn write_line(
    out: FormatCallback<'_>,
    message: &Arguments<'_>,
    record: &Record<'_>,
    level: impl std::fmt::Display,
) {
    out.finish(format_args!(
        "[{date} - {level}] {message} [{target}]",
        date = format_rfc3339_millis(SystemTime::now()),
        target = record.target(),
    ))
}
