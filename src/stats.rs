use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Per-node submission and lifecycle counters.
///
/// Constructed once at startup and injected into the components that
/// record outcomes; never global.
#[derive(Debug, Default)]
pub struct NodeStats {
    submitted: AtomicU64,
    forwarded: AtomicU64,
    rejected: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    killed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub forwarded: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub killed: u64,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_killed(&self) {
        self.killed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            killed: self.killed.load(Ordering::Relaxed),
        }
    }
}
