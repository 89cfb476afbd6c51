// ABOUTME: Delivery counters for the inbound MO queue
// ABOUTME: A sink trait for the queue plus an atomic implementation with point-in-time snapshots

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the inbound queue reports to
pub trait StatsSink: Send + Sync {
    fn increment_data_sm_ok(&self);

    fn increment_data_sm_err(&self);

    fn increment_deliver_sm_sent(&self) {}

    fn increment_deliver_sm_retried(&self) {}

    fn increment_marshal_failure(&self) {}
}

/// Lock-free [`StatsSink`]
#[derive(Debug, Default)]
pub struct InboundStats {
    data_sm_ok: AtomicU64,
    data_sm_err: AtomicU64,
    deliver_sm_sent: AtomicU64,
    deliver_sm_retried: AtomicU64,
    marshal_failures: AtomicU64,
}

/// Counter values at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub data_sm_ok: u64,
    pub data_sm_err: u64,
    pub deliver_sm_sent: u64,
    pub deliver_sm_retried: u64,
    pub marshal_failures: u64,
}

impl InboundStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            data_sm_ok: self.data_sm_ok.load(Ordering::Relaxed),
            data_sm_err: self.data_sm_err.load(Ordering::Relaxed),
            deliver_sm_sent: self.deliver_sm_sent.load(Ordering::Relaxed),
            deliver_sm_retried: self.deliver_sm_retried.load(Ordering::Relaxed),
            marshal_failures: self.marshal_failures.load(Ordering::Relaxed),
        }
    }
}

impl StatsSink for InboundStats {
    fn increment_data_sm_ok(&self) {
        self.data_sm_ok.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_data_sm_err(&self) {
        self.data_sm_err.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_deliver_sm_sent(&self) {
        self.deliver_sm_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_deliver_sm_retried(&self) {
        self.deliver_sm_retried.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_marshal_failure(&self) {
        self.marshal_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let stats = InboundStats::new();
        stats.increment_data_sm_ok();
        stats.increment_data_sm_ok();
        stats.increment_data_sm_err();
        stats.increment_marshal_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.data_sm_ok, 2);
        assert_eq!(snapshot.data_sm_err, 1);
        assert_eq!(snapshot.marshal_failures, 1);
        assert_eq!(snapshot.deliver_sm_sent, 0);
    }
}
