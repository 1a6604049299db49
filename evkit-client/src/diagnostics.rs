//! Bounded diagnostic log owned by the dispatcher.
//!
//! Keeps the most recent dispatch failures in memory so a surface can show
//! them without a log pipeline. Oldest entries are evicted once the buffer
//! is full. [`DiagnosticLog::flush`] forwards entries not yet emitted to
//! `tracing`.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    pub at: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub method: String,
    pub detail: String,
    pub emitted: bool,
}

#[derive(Debug)]
pub struct DiagnosticLog {
    capacity: usize,
    entries: Mutex<VecDeque<DiagnosticEntry>>,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DiagnosticLog {
    /// A log keeping at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, level: DiagnosticLevel, method: &str, detail: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(DiagnosticEntry {
            at: Utc::now(),
            level,
            method: method.to_string(),
            detail: detail.into(),
            emitted: false,
        });
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<DiagnosticEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Emit pending entries through `tracing`; returns how many were emitted.
    pub fn flush(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut emitted = 0;
        for entry in entries.iter_mut().filter(|e| !e.emitted) {
            match entry.level {
                DiagnosticLevel::Info => {
                    tracing::info!(method = %entry.method, at = %entry.at, "{}", entry.detail)
                }
                DiagnosticLevel::Warn => {
                    tracing::warn!(method = %entry.method, at = %entry.at, "{}", entry.detail)
                }
                DiagnosticLevel::Error => {
                    tracing::error!(method = %entry.method, at = %entry.at, "{}", entry.detail)
                }
            }
            entry.emitted = true;
            emitted += 1;
        }
        emitted
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
