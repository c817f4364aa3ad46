//! Bounded, most-recent-first trace of engine events for operators.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, Level};

pub const LOG_BUFFER_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Sys,
    Mcp,
    Send,
    Result,
    Warn,
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Sys => "SYS",
            LogCategory::Mcp => "MCP",
            LogCategory::Send => "SEND",
            LogCategory::Result => "RESULT",
            LogCategory::Warn => "WARN",
            LogCategory::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level at which an entry is mirrored into `tracing`. The buffer is the
/// operator-facing channel, so mirrored entries stay below the default
/// stderr filter.
pub fn mirror_level(category: LogCategory) -> Level {
    match category {
        LogCategory::Warn | LogCategory::Error => Level::INFO,
        _ => Level::DEBUG,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Monotonic sequence number; lets consumers spot entries they have not
    /// seen yet even after older ones were evicted.
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub category: LogCategory,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.category,
            self.message
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an entry and drops the oldest past capacity. Every entry is
    /// mirrored into `tracing`.
    pub fn push(&mut self, category: LogCategory, message: impl Into<String>) {
        let message = message.into();
        if mirror_level(category) == Level::INFO {
            info!(category = %category, "{message}");
        } else {
            debug!(category = %category, "{message}");
        }

        self.next_seq += 1;
        self.entries.push_front(LogEntry {
            seq: self.next_seq,
            timestamp: Local::now(),
            category,
            message,
        });
        self.entries.truncate(LOG_BUFFER_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
