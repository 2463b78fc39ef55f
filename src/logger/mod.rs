//! Tagged console logging
//!
//! Leveled logger with per-module tags and colored output:
//!
//! ```rust
//! use poolwatch::logger::{self, LogTag};
//!
//! logger::info(LogTag::Monitor, "subscription active");
//! logger::debug(LogTag::Chain, "eth_call payload ...");
//! ```
//!
//! Call `logger::init(level)` once at startup. Errors always print;
//! debug output requires `LogLevel::Debug`.

use chrono::Utc;
use colored::*;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

static MIN_LEVEL: AtomicU8 = AtomicU8::new(2); // Info by default

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warning,
            "debug" | "verbose" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

/// Source module of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Config,
    Chain,
    Store,
    Tokens,
    Pools,
    Positions,
    Monitor,
    Alerts,
    Notify,
}

impl LogTag {
    fn label(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Chain => "CHAIN",
            LogTag::Store => "STORE",
            LogTag::Tokens => "TOKENS",
            LogTag::Pools => "POOLS",
            LogTag::Positions => "POSITIONS",
            LogTag::Monitor => "MONITOR",
            LogTag::Alerts => "ALERTS",
            LogTag::Notify => "NOTIFY",
        }
    }
}

/// Set the minimum level shown. Call once at startup.
pub fn init(level: LogLevel) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    // Errors always log
    if level != LogLevel::Error && (level as u8) > MIN_LEVEL.load(Ordering::Relaxed) {
        return;
    }

    let timestamp = Utc::now().format("%H:%M:%S%.3f");
    let level_str = match level {
        LogLevel::Error => level.as_str().red().bold(),
        LogLevel::Warning => level.as_str().yellow().bold(),
        LogLevel::Info => level.as_str().green(),
        LogLevel::Debug => level.as_str().purple().dimmed(),
    };

    println!(
        "{} {:5} {} {}",
        format!("[{}]", timestamp).dimmed(),
        level_str,
        format!("[{}]", tag.label()).cyan(),
        message
    );
    let _ = io::stdout().flush();
}
