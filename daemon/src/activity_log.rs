//! Bounded in-memory history of recent activity

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    SystemStats,
    ShutdownWarning,
    ActivityDetected,
    BlackoutPeriod,
    ShutdownInitiated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Local>,
    pub kind: ActivityKind,
    pub data: serde_json::Value,
}

/// Newest-first ring of activity entries, never longer than `max_entries`.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    max_entries: usize,
}

impl ActivityLog {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: VecDeque::new(), max_entries }
    }

    pub fn record(&mut self, timestamp: DateTime<Local>, kind: ActivityKind, data: serde_json::Value) {
        if self.max_entries == 0 {
            return;
        }
        self.entries.push_front(ActivityEntry { timestamp, kind, data });
        self.entries.truncate(self.max_entries);
    }

    pub fn recent(&self, count: usize) -> Vec<ActivityEntry> {
        self.entries.iter().take(count).cloned().collect()
    }

    pub fn by_kind(&self, kind: ActivityKind) -> Vec<ActivityEntry> {
        self.entries.iter().filter(|e| e.kind == kind).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
