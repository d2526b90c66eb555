//! EventLog - Bounded audit trail of emitted events

use serde::{Deserialize, Serialize};
use shared::{ConduitEvent, EventCategory, EventSink, DEFAULT_AUDIT_CAPACITY};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub sequence: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event: ConduitEvent,
}

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<EventRecord>,
    next_sequence: u64,
    evicted: u64,
}

/// Bounded event log
///
/// Oldest records are evicted once `max_entries` is reached. Sequence
/// numbers keep increasing across evictions.
#[derive(Debug)]
pub struct EventLog {
    state: Mutex<LogState>,
    max_entries: usize,
}

impl EventLog {
    /// Create a new EventLog
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: VecDeque::with_capacity(max_entries.min(1024)),
                ..Default::default()
            }),
            max_entries: max_entries.max(1),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LogState) -> T) -> T {
        // A poisoned log is still readable; the records themselves stay consistent.
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Append an event
    pub fn record(&self, event: ConduitEvent) -> u64 {
        let max_entries = self.max_entries;
        self.with_state(|state| {
            if state.entries.len() >= max_entries {
                state.entries.pop_front();
                state.evicted += 1;
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.entries.push_back(EventRecord {
                sequence,
                timestamp: chrono::Utc::now(),
                event,
            });
            sequence
        })
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        self.with_state(|state| state.entries.iter().rev().take(limit).cloned().collect())
    }

    /// All retained records in a category, oldest first
    pub fn by_category(&self, category: EventCategory) -> Vec<EventRecord> {
        self.with_state(|state| {
            state
                .entries
                .iter()
                .filter(|r| r.event.category() == category)
                .cloned()
                .collect()
        })
    }

    /// All retained events, oldest first
    pub fn events(&self) -> Vec<ConduitEvent> {
        self.with_state(|state| state.entries.iter().map(|r| r.event.clone()).collect())
    }

    /// Get statistics
    pub fn stats(&self) -> EventStats {
        self.with_state(|state| {
            let mut by_category = BTreeMap::new();
            for record in &state.entries {
                *by_category.entry(record.event.category()).or_insert(0) += 1;
            }
            EventStats {
                total_entries: state.entries.len(),
                total_recorded: state.next_sequence,
                evicted: state.evicted,
                by_category,
            }
        })
    }

    /// Export as JSON
    pub fn export_json(&self) -> serde_json::Value {
        self.with_state(|state| {
            serde_json::to_value(state.entries.iter().collect::<Vec<_>>()).unwrap_or_default()
        })
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: ConduitEvent) {
        self.record(event);
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

/// Audit statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub total_entries: usize,
    pub total_recorded: u64,
    pub evicted: u64,
    pub by_category: BTreeMap<EventCategory, usize>,
}
