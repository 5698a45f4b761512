//! Stderr logger for the binaries.
use std::io::Write;

use log::{self, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Install the stderr logger.
///
/// `verbosity` of `0` shows warnings and errors, `1` adds training
/// progress, `2` adds debugging output and anything above traces.
pub fn init(verbosity: i32) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(StderrLogger))?;
    log::set_max_level(convert_verbosity_to_level(verbosity));
    Ok(())
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{} [{}] {}",
                convert_level_to_prefix(record.level()),
                record.target(),
                record.args(),
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn convert_verbosity_to_level(verbosity: i32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn convert_level_to_prefix(level: Level) -> &'static str {
    match level {
        Level::Trace => "[T]",
        Level::Debug => "[D]",
        Level::Info => "[I]",
        Level::Warn => "[W]",
        Level::Error => "[E]",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(convert_verbosity_to_level(0), LevelFilter::Warn);
        assert_eq!(convert_verbosity_to_level(1), LevelFilter::Info);
        assert_eq!(convert_verbosity_to_level(2), LevelFilter::Debug);
        assert_eq!(convert_verbosity_to_level(7), LevelFilter::Trace);
    }

    #[test]
    fn prefixes() {
        assert_eq!(convert_level_to_prefix(Level::Warn), "[W]");
        assert_eq!(convert_level_to_prefix(Level::Error), "[E]");
    }
}
