//! Stderr logger for the host tool.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

struct CliLogger;

static APP_LOGGER: CliLogger = CliLogger;

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Map the number of `-v` flags to a level. Warnings are always shown.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the logger with the level chosen on the command line.
pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    log::set_logger(&APP_LOGGER).map(|()| log::set_max_level(level_for(verbosity)))
}
