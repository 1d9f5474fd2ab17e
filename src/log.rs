//! Structured logging for harvesting runs.
//!
//! Log levels:
//! - ERROR: Failures that end the run or a cleanup action
//! - WARN: Unexpected but tolerated conditions (status mismatch, late failures)
//! - INFO: Run phases, saved fixtures
//! - DEBUG: Scheduling decisions, task starts and completions
//! - TRACE: Request URLs and raw arguments
//!
//! `--debug` or `MOCKS_DEBUG=1` selects DEBUG; `MOCKS_DEBUG=trace` selects
//! TRACE. Nothing is written until [`init`] has picked a log file, so library
//! users and tests that never call it pay only a level check.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use crate::config::Config;

const LOG_FILE: &str = "make-mocks.log";

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Log levels for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Level selected by the `--debug` flag and the `MOCKS_DEBUG` value.
    fn select(debug_flag: bool, env: Option<&str>) -> Self {
        let from_env = env.map(|v| v.trim().to_ascii_lowercase());
        match from_env.as_deref() {
            Some("trace") => LogLevel::Trace,
            Some("1") | Some("true") | Some("debug") => LogLevel::Debug,
            _ if debug_flag => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

/// Start logging to `~/.mock-harvest/make-mocks.log`, truncating it.
///
/// Without a home directory the level is still set but nothing is written.
pub fn init(debug: bool) {
    let env = std::env::var("MOCKS_DEBUG").ok();
    let level = LogLevel::select(debug, env.as_deref());
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);

    if let Ok(dir) = Config::harvest_dir() {
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join(LOG_FILE);
        let _ = std::fs::write(&path, "");
        LOG_PATH.set(path).ok();
    }
}

fn current_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

fn format_line(timestamp: &str, level: LogLevel, msg: &str) -> String {
    format!("[{}] [{:<5}] {}", timestamp, level.as_str(), msg)
}

/// Log a message at the specified level.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > current_level() {
        return;
    }
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        let _ = writeln!(file, "{}", format_line(&timestamp, level, msg));
    }
}

pub fn error(msg: &str) {
    log_at(LogLevel::Error, msg);
}

pub fn warn(msg: &str) {
    log_at(LogLevel::Warn, msg);
}

pub fn info(msg: &str) {
    log_at(LogLevel::Info, msg);
}

pub fn debug(msg: &str) {
    log_at(LogLevel::Debug, msg);
}

pub fn trace(msg: &str) {
    log_at(LogLevel::Trace, msg);
}

/// Log macro for INFO level.
#[macro_export]
macro_rules! hlog {
    ($($arg:tt)*) => {
        $crate::log::info(&format!($($arg)*))
    };
}

/// Log macro for ERROR level.
#[macro_export]
macro_rules! hlog_error {
    ($($arg:tt)*) => {
        $crate::log::error(&format!($($arg)*))
    };
}

/// Log macro for WARN level.
#[macro_export]
macro_rules! hlog_warn {
    ($($arg:tt)*) => {
        $crate::log::warn(&format!($($arg)*))
    };
}

/// Log macro for DEBUG level (only logs when debug mode is enabled).
#[macro_export]
macro_rules! hlog_debug {
    ($($arg:tt)*) => {
        $crate::log::debug(&format!($($arg)*))
    };
}

/// Log macro for TRACE level.
#[macro_export]
macro_rules! hlog_trace {
    ($($arg:tt)*) => {
        $crate::log::trace(&format!($($arg)*))
    };
}
