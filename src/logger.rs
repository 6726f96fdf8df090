//! Stderr backend for the `log` facade.

use crossterm::style::{Color, Stylize};
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::io::Write;

static LOGGER: StderrLogger = StderrLogger;

/// Install the logger. Fails if another logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// Level from `-v` occurrences, starting at `base`.
pub fn raise(base: LevelFilter, verbosity: u8) -> LevelFilter {
    let levels = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let start = levels.iter().position(|l| *l == base).unwrap_or(2);
    levels[(start + verbosity as usize).min(levels.len() - 1)]
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::DarkYellow,
        Level::Info => Color::Cyan,
        Level::Debug => Color::Yellow,
        Level::Trace => Color::Green,
    }
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = format!("{:<5}", record.level()).with(level_color(record.level()));
        let mut stderr = std::io::stderr().lock();
        // Multi-line messages (hex dumps) keep the prefix on every line.
        for line in record.args().to_string().lines() {
            let _ = writeln!(stderr, "[{}] {}: {}", level, record.target(), line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
