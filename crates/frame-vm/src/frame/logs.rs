//! # Log Collector
//!
//! Ordered events emitted by one frame.

use crate::domain::entities::LogEntry;

/// Append-only log list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogCollector {
    entries: Vec<LogEntry>,
}

impl LogCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry.
    pub fn add(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Appends a batch. `None` and empty batches are ignored.
    pub fn add_all(&mut self, entries: Option<Vec<LogEntry>>) {
        if let Some(entries) = entries {
            self.entries.extend(entries);
        }
    }

    /// Collected entries in emission order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains every entry.
    pub fn take(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Address, Bytes, Word};

    fn entry(n: u8) -> LogEntry {
        LogEntry::new(Address::from_low_u8(n), vec![Word::from(n)], Bytes::new())
    }

    #[test]
    fn test_add_keeps_order() {
        let mut logs = LogCollector::new();
        logs.add(entry(1));
        logs.add_all(Some(vec![entry(2), entry(3)]));
        let addrs: Vec<_> = logs.entries().iter().map(|e| e.address).collect();
        assert_eq!(
            addrs,
            vec![
                Address::from_low_u8(1),
                Address::from_low_u8(2),
                Address::from_low_u8(3)
            ]
        );
    }

    #[test]
    fn test_add_all_ignores_none_and_empty() {
        let mut logs = LogCollector::new();
        logs.add(entry(1));
        logs.add_all(None);
        logs.add_all(Some(Vec::new()));
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_take_drains() {
        let mut logs = LogCollector::new();
        logs.add(entry(1));
        assert_eq!(logs.take().len(), 1);
        assert!(logs.is_empty());
    }
}
