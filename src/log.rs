//! Logger sinks for build progress.
//!
//! The pipeline never prints directly; every step reports through a
//! [`BuildLog`] so the CLI can colorize and tests can inspect the lines.

use colored::*;
use std::sync::Mutex;

/// A sink for human-readable progress and error lines.
pub trait BuildLog {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Terminal logger used by the `plcmod` binary.
pub struct ConsoleLog;

impl BuildLog for ConsoleLog {
    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "x".red(), message.red());
    }
}

/// A single captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Info(String),
    Error(String),
}

/// Records every line in memory.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<LogLine>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                LogLine::Error(msg) => Some(msg),
                LogLine::Info(_) => None,
            })
            .collect()
    }

    /// True if any line (info or error) contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| match line {
            LogLine::Info(msg) | LogLine::Error(msg) => msg.contains(needle),
        })
    }

    fn push(&self, line: LogLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl BuildLog for MemoryLog {
    fn info(&self, message: &str) {
        self.push(LogLine::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(LogLine::Error(message.to_string()));
    }
}
