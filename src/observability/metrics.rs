//! Mapper metrics
//!
//! Monotonic counters only. Thread-safe through relaxed atomics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one mapper
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Entities written by insert
    inserted: AtomicU64,
    /// Entities returned by find
    found: AtomicU64,
    /// Entities reported updated by the driver
    updated: AtomicU64,
    /// Entities reported deleted by the driver
    deleted: AtomicU64,
    /// Operations rejected by a schema contract
    rejected: AtomicU64,
    /// Entities normalized
    normalized: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inserted(&self, count: u64) {
        self.inserted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_found(&self, count: u64) {
        self.found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_updated(&self, count: u64) {
        self.updated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_deleted(&self, count: u64) {
        self.deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_normalized(&self, count: u64) {
        self.normalized.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserted: self.inserted.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            normalized: self.normalized.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub inserted: u64,
    pub found: u64,
    pub updated: u64,
    pub deleted: u64,
    pub rejected: u64,
    pub normalized: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
