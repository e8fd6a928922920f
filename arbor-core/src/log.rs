//! Bounded log queue for pipeline events.
//!
//! Processing never aborts the host over a recoverable failure; instead it
//! records a [`LogItem`] with a severity the host can surface, and mirrors
//! the entry to `tracing` for regular diagnostics.

use std::collections::VecDeque;

use crate::types::StageId;

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// A single entry on the pipeline log queue.
#[derive(Clone, Debug)]
pub struct LogItem {
    pub severity: Severity,
    pub message: String,
    /// Stage the entry relates to, when one does.
    pub stage: Option<StageId>,
}

impl LogItem {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            stage: None,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
            stage: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            stage: None,
        }
    }

    /// Attaches the originating stage.
    pub fn for_stage(mut self, stage: StageId) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// A fixed-capacity queue of [`LogItem`]s; the oldest entry is dropped
/// when a push would exceed the capacity.
#[derive(Debug)]
pub struct LogQueue {
    items: VecDeque<LogItem>,
    capacity: usize,
}

impl LogQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends an entry, evicting the oldest one at capacity, and mirrors
    /// it to `tracing`.
    pub fn push(&mut self, item: LogItem) {
        match item.severity {
            Severity::Info => tracing::debug!(stage = ?item.stage, "{}", item.message),
            Severity::Warn => tracing::warn!(stage = ?item.stage, "{}", item.message),
            Severity::Error => tracing::error!(stage = ?item.stage, "{}", item.message),
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Removes and returns all queued entries, oldest first.
    pub fn drain(&mut self) -> Vec<LogItem> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for LogQueue {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_entries_in_order() {
        let mut q = LogQueue::new(4);
        q.push(LogItem::info("a"));
        q.push(LogItem::warn("b"));
        let items = q.drain();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].message, "a");
        assert_eq!(items[0].severity, Severity::Info);
        assert_eq!(items[1].severity, Severity::Warn);
        assert!(q.is_empty());
    }

    #[test]
    fn push_beyond_capacity_drops_oldest() {
        let mut q = LogQueue::new(2);
        q.push(LogItem::info("first"));
        q.push(LogItem::info("second"));
        q.push(LogItem::info("third"));
        let items = q.drain();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].message, "second");
        assert_eq!(items[1].message, "third");
    }

    #[test]
    fn for_stage_tags_the_entry() {
        let item = LogItem::error("boom").for_stage(3);
        assert_eq!(item.stage, Some(3));
        assert_eq!(item.severity, Severity::Error);
    }
}
