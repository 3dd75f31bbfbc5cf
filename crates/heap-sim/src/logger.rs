use std::{
    fmt,
    io::{self, IsTerminal as _},
};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct StderrLogger {
    color: bool,
}

static COLOR_LOGGER: StderrLogger = StderrLogger { color: true };
static PLAIN_LOGGER: StderrLogger = StderrLogger { color: false };

/// Installs the global logger, writing records up to `level` to stderr.
pub(crate) fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = if io::stderr().is_terminal() {
        &COLOR_LOGGER
    } else {
        &PLAIN_LOGGER
    };
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = LevelFormat {
            level: record.level(),
            color: self.color,
        };
        eprintln!("{level} {}: {}", record.target(), record.args());
    }

    fn flush(&self) {}
}

struct LevelFormat {
    level: Level,
    color: bool,
}

impl fmt::Display for LevelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.level {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        };
        if !self.color {
            return f.write_str(msg);
        }
        let color = match self.level {
            Level::Trace => 35,
            Level::Debug => 34,
            Level::Info => 32,
            Level::Warn => 33,
            Level::Error => 31,
        };
        write!(f, "\x1B[{color};1m{msg}\x1B[0m")
    }
}
