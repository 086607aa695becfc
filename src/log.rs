//! Logging for deropt runs.
//!
//! Messages go to the terminal, with warnings and errors on stderr. Runs which write results also
//! keep logs in the output directory: `deropt_info.log` is a full record of the run at info level
//! or above, whatever the console level, while `deropt_error.log` holds only the warnings and
//! errors (e.g. a solve which hit its time limit).
//!
//! Each message is stamped with the wall-clock time and the time since logging began, which makes
//! slow model builds and solves easy to spot.
use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{Level, LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// When the logger was initialised, if it has been
static LOGGER_START: OnceLock<Instant> = OnceLock::new();

/// Environment variable which takes precedence over the log level in `settings.toml`
pub const LOG_LEVEL_ENV_VAR: &str = "DEROPT_LOG_LEVEL";

/// The log level used if none is given in the environment or `settings.toml`
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Full record of a run
const LOG_INFO_FILE_NAME: &str = "deropt_info.log";

/// Warnings and errors only
const LOG_ERROR_FILE_NAME: &str = "deropt_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_START.get().is_some()
}

/// Parse a log level: one of `off`, `error`, `warn`, `info`, `debug` or `trace`, in any case
pub fn parse_log_level(name: &str) -> Result<LevelFilter> {
    name.parse::<LevelFilter>()
        .ok()
        .with_context(|| format!("Unknown log level: {name}"))
}

/// Pick the log level from the environment, then the settings file, then the default
fn resolve_log_level(from_env: Option<&str>, from_settings: Option<&str>) -> Result<LevelFilter> {
    parse_log_level(from_env.or(from_settings).unwrap_or(DEFAULT_LOG_LEVEL))
}

/// Initialise the program logger.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`, overridden by the
///   `DEROPT_LOG_LEVEL` environment variable
/// * `log_dir`: Where to write log files, if anywhere
pub fn init(log_level_from_settings: Option<&str>, log_dir: Option<&Path>) -> Result<()> {
    let from_env = env::var(LOG_LEVEL_ENV_VAR).ok();
    let log_level = resolve_log_level(from_env.as_deref(), log_level_from_settings)?;
    let start = Instant::now();

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let colours_if_terminal = |is_terminal: bool| is_terminal.then_some(colours);

    let mut dispatch = Dispatch::new()
        .chain(
            formatted(log_level, start, colours_if_terminal(std::io::stdout().is_terminal()))
                .filter(|metadata| metadata.level() > Level::Warn)
                .chain(std::io::stdout()),
        )
        .chain(
            formatted(
                log_level.min(LevelFilter::Warn),
                start,
                colours_if_terminal(std::io::stderr().is_terminal()),
            )
            .chain(std::io::stderr()),
        );

    if let Some(log_dir) = log_dir {
        dispatch = dispatch
            .chain(
                formatted(log_level.max(LevelFilter::Info), start, None)
                    .chain(create_log_file(log_dir, LOG_INFO_FILE_NAME)?),
            )
            .chain(
                formatted(LevelFilter::Warn, start, None)
                    .chain(create_log_file(log_dir, LOG_ERROR_FILE_NAME)?),
            );
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_START.get_or_init(|| start);

    Ok(())
}

/// Create (or truncate) a log file in `log_dir`
fn create_log_file(log_dir: &Path, file_name: &str) -> Result<File> {
    let path = log_dir.join(file_name);
    File::create(&path).with_context(|| format!("Failed to create log file {}", path.display()))
}

/// A dispatch for messages up to `level`, coloured by level if `colours` is given
fn formatted(level: LevelFilter, start: Instant, colours: Option<ColoredLevelConfig>) -> Dispatch {
    Dispatch::new()
        .format(move |out, message, record| match colours {
            Some(colours) => write_log(out, colours.color(record.level()), record, start, message),
            None => write_log(out, record.level(), record, start, message),
        })
        .level(level)
}

/// Write one message as `[time +elapsed level target] message`
fn write_log<T: Display>(
    out: FormatCallback,
    level: T,
    record: &Record,
    start: Instant,
    message: &Arguments,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    let elapsed = format_elapsed(start.elapsed());
    let target = record.target();

    out.finish(format_args!(
        "[{timestamp} {elapsed} {level} {target}] {message}"
    ));
}

/// Format the time since logging began, e.g. `+3.2s` or `+7m05s`
fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(60) {
        format!("+{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("+{}m{:02}s", secs / 60, secs % 60)
    }
}
