//! Logger implementation for the log crate.

use core::fmt::{self, Display};

use anyhow::anyhow;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::PortResult;

pub struct SimpleLogger;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCode {
    Red = 31,
    Green = 32,
    Yellow = 33,
    Cyan = 36,
    BrightBlack = 90,
}

impl Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{1B}[{}m", *self as u8)
    }
}

impl ColorCode {
    fn for_level(level: Level) -> Self {
        match level {
            Level::Error => ColorCode::Red,
            Level::Warn => ColorCode::Yellow,
            Level::Info => ColorCode::Green,
            Level::Debug => ColorCode::Cyan,
            Level::Trace => ColorCode::BrightBlack,
        }
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let file = record.file().unwrap_or("none");
        let line = record.line().unwrap_or(0);
        let args = record.args();
        let color = ColorCode::for_level(record.level());
        let color_reset = "\u{1B}[0m";
        let ticks = timestamp();

        // [ticks file:line] message
        kprintln!("[{ticks:>8} {file}:{line}] {color}{args}{color_reset}");
    }

    fn flush(&self) {}
}

/// Log line time stamp: the free-running system counter on hardware.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
fn timestamp() -> u64 {
    crate::drivers::timer::current_ticks()
}

/// The simulated processor has no system counter; use the statistics clock.
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
fn timestamp() -> u64 {
    crate::port::PORT.run_time_counter().into()
}

/// Level selected by the `LOG` build-time environment variable.
pub fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Initialize the logger.
pub fn init() -> PortResult<()> {
    kprintln!(
        "Initializing logger with level: {}",
        option_env!("LOG").unwrap_or("off")
    );
    log::set_logger(&SimpleLogger).map_err(|e| anyhow!("logger init failed: {e}"))?;
    log::set_max_level(level_from_env(option_env!("LOG")));
    Ok(())
}
