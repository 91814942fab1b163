//! Diagnostic logging to stderr.
//!
//! Report output goes to stdout with `println!`; everything emitted through
//! the `log` macros lands here, one line per record with a colored level
//! badge and a timestamp.

use std::io::{self, Write};
use std::str::FromStr;

use console::{Color, style};
use log::{Level, LevelFilter, Log, Metadata, Record};
use time::OffsetDateTime;
use time::macros::format_description;

/// Environment variable overriding the log level (`error|warn|info|debug|trace`).
pub const LOG_ENV: &str = "FWLINK_LOG";

/// A simple logger
pub struct Logger;

static LOGGER: Logger = Logger;

/// Level used when neither `FWLINK_LOG` nor `--verbose` says otherwise.
pub fn level_for(verbose: bool, env_value: Option<&str>) -> LevelFilter {
    if let Some(level) = env_value.and_then(|v| LevelFilter::from_str(v.trim()).ok()) {
        return level;
    }
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Installs the logger. Calling it twice keeps the first logger and updates the level.
pub fn init(verbose: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    log::set_max_level(level_for(verbose, env_value.as_deref()));
    let _ = log::set_logger(&LOGGER);
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let (level_name, level_color) = match record.level() {
            Level::Error => ("ERROR", Color::Red),
            Level::Warn => ("WARN ", Color::Red),
            Level::Info => ("INFO ", Color::Cyan),
            Level::Debug => ("DEBUG", Color::Yellow),
            Level::Trace => ("TRACE", Color::Magenta),
        };
        let now = OffsetDateTime::now_utc();
        let stamp = now
            .format(format_description!("[hour]:[minute]:[second].[subsecond digits:3]"))
            .unwrap_or_default();
        let short_target = record.target().split("::").next().unwrap_or("");
        let msg = format!(
            "{} {} {}{}",
            style(format!("  {}  ", level_name)).bg(level_color).black(),
            style(stamp).dim(),
            style(record.args()),
            style(if short_target != "fwlink" {
                format!("  (from {})", short_target)
            } else {
                String::new()
            })
            .dim(),
        );

        writeln!(io::stderr(), "{}", msg).ok();
    }

    fn flush(&self) {}
}
