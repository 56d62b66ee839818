//! Level-gated user-facing logger.
//!
//! A [`Logger`] is a plain value built once per invocation from the
//! configured [`LogLevel`] and handed to whatever needs to report progress.
//! Where messages end up is decided by its [`LogSink`]: the terminal for the
//! CLI, or memory for tests and embedders.
//!
//! Internal diagnostics (command lines, watcher events) use `tracing`
//! directly and are not affected by the configured level.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use owo_colors::OwoColorize;

use crate::config::LogLevel;

/// Destination for log messages that passed the level check.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Logger bound to a level and a sink.
#[derive(Clone)]
pub struct Logger {
    level: LogLevel,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self { level, sink }
    }

    /// Logger printing to the terminal.
    pub fn console(level: LogLevel) -> Self {
        Self::new(level, Arc::new(ConsoleSink::default()))
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Verbose, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Error, message.as_ref());
    }

    fn emit(&self, level: LogLevel, message: &str) {
        if self.level.allows(level) {
            self.sink.log(level, message);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish()
    }
}

/// Writes colour-coded lines to stderr.
///
/// Verbose is blue, info green, warn yellow and error red.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(std::env::var_os("NO_COLOR").is_none())
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, level: LogLevel, message: &str) {
        if !self.color {
            eprintln!("{} {}", symbol(level), message);
            return;
        }

        match level {
            LogLevel::Verbose => eprintln!("{} {}", symbol(level).blue().bold(), message.blue()),
            LogLevel::Info => eprintln!("{} {}", symbol(level).green().bold(), message.green()),
            LogLevel::Warn => eprintln!("{} {}", symbol(level).yellow().bold(), message.yellow()),
            LogLevel::Error => eprintln!("{} {}", symbol(level).red().bold(), message.red()),
            LogLevel::Off => {}
        }
    }
}

fn symbol(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Verbose => "·",
        LogLevel::Info => "✓",
        LogLevel::Warn => "⚠",
        LogLevel::Error => "✗",
        LogLevel::Off => "",
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far, oldest first.
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages received at exactly `level`.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}
