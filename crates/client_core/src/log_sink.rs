use std::collections::VecDeque;

use chrono::Local;

use crate::settings::LogRetention;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub text: String,
}

/// Newest-first operator log.
#[derive(Debug)]
pub(crate) struct LogSink {
    entries: VecDeque<LogEntry>,
    display_limit: usize,
    retention: LogRetention,
}

impl LogSink {
    pub fn new(display_limit: usize, retention: LogRetention) -> Self {
        Self {
            entries: VecDeque::new(),
            display_limit,
            retention,
        }
    }

    pub fn push(&mut self, text: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            text: text.into(),
        };
        self.entries.push_front(entry.clone());
        if let LogRetention::Bounded(capacity) = self.retention {
            self.entries.truncate(capacity.max(self.display_limit));
        }
        entry
    }

    /// Entries presentation should render, most recent first.
    pub fn visible(&self) -> Vec<LogEntry> {
        self.entries
            .iter()
            .take(self.display_limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

}
