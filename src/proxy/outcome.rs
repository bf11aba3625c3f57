//! Per-target attempt outcome counters.
//!
//! One row per pool position. Counters only grow. A snapshot taken
//! mid-request may see an attempt that has not resolved yet, but
//! `successes + failures <= requests` always holds.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of one target's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug)]
pub struct OutcomeTracker {
    rows: Vec<Counters>,
}

impl OutcomeTracker {
    pub fn new(targets: usize) -> Self {
        Self {
            rows: (0..targets).map(|_| Counters::default()).collect(),
        }
    }

    /// Counted before the attempt is sent.
    pub fn record_attempt(&self, index: usize) {
        if let Some(row) = self.rows.get(index) {
            row.requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_success(&self, index: usize) {
        if let Some(row) = self.rows.get(index) {
            row.successes.fetch_add(1, Ordering::Release);
        }
    }

    pub fn record_failure(&self, index: usize) {
        if let Some(row) = self.rows.get(index) {
            row.failures.fetch_add(1, Ordering::Release);
        }
    }

    pub fn get(&self, index: usize) -> Option<OutcomeSnapshot> {
        self.rows.get(index).map(|row| {
            // successes/failures first so the request count is never behind them
            let successes = row.successes.load(Ordering::Acquire);
            let failures = row.failures.load(Ordering::Acquire);
            OutcomeSnapshot {
                requests: row.requests.load(Ordering::Relaxed),
                successes,
                failures,
            }
        })
    }

    pub fn snapshot(&self) -> Vec<OutcomeSnapshot> {
        (0..self.rows.len()).filter_map(|i| self.get(i)).collect()
    }
}
