//! Single-line structured logging to stderr.
//!
//! No logging framework: the rest of this crate deliberately keeps its
//! dependency surface small, and a handful of log sites (the proxy server's
//! connection log, the pairing orchestrator's health transitions) don't earn
//! one. Each line is `TIMESTAMP LEVEL target: message`.

use chrono::Utc;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        f.write_str(s)
    }
}

pub fn log(level: Level, target: &str, message: impl fmt::Display) {
    eprintln!(
        "{} {} {target}: {message}",
        Utc::now().to_rfc3339(),
        level
    );
}

macro_rules! log_info {
    ($target:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::Level::Info, $target, format!($($arg)*))
    };
}

macro_rules! log_warn {
    ($target:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::Level::Warn, $target, format!($($arg)*))
    };
}

macro_rules! log_error {
    ($target:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::Level::Error, $target, format!($($arg)*))
    };
}

pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
