//! Bounded, most-recent-first record of completed actions.

use chrono::Local;
use std::collections::VecDeque;

pub const AUDIT_DEPTH: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub kind: String,
    pub details: String,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    last_id: i64,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the front, dropping the oldest beyond
    /// [`AUDIT_DEPTH`]. Ids stay strictly increasing even when two entries
    /// land within the same millisecond.
    pub fn record(&mut self, kind: impl Into<String>, details: impl Into<String>) {
        let now = Local::now();
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        self.entries.push_front(AuditEntry {
            id,
            kind: kind.into(),
            details: details.into(),
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        self.entries.truncate(AUDIT_DEPTH);
    }

    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&AuditEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn record__keeps_newest_first() {
        // given
        let mut log = AuditLog::new();

        // when
        log.record("Buy", "Purchased square #3");
        log.record("Deposit", "Deposited 0.5 ETH");

        // then
        let kinds: Vec<_> = log.entries().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Deposit", "Buy"]);
    }

    #[test]
    fn record__drops_oldest_beyond_depth() {
        // given
        let mut log = AuditLog::new();
        for i in 0..15 {
            log.record("Buy", format!("Purchased square #{i}"));
        }

        // then
        assert_eq!(log.len(), AUDIT_DEPTH);
        assert_eq!(log.newest().unwrap().details, "Purchased square #14");
        let oldest = log.entries().last().unwrap();
        assert_eq!(oldest.details, "Purchased square #5");
    }

    #[test]
    fn record__ids_are_strictly_increasing() {
        // given
        let mut log = AuditLog::new();

        // when
        log.record("Buy", "a");
        log.record("Buy", "b");
        log.record("Buy", "c");

        // then
        let ids: Vec<_> = log.entries().map(|e| e.id).collect();
        assert!(ids[0] > ids[1] && ids[1] > ids[2]);
    }
}
