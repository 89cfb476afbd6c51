// ABOUTME: Tracks deliver_sm PDUs written to a session until their deliver_sm_resp arrives
// ABOUTME: Entries are keyed by sequence number and stamped with the dispatch instant

use crate::datatypes::MoPdu;
use crate::sync::lock;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Tracked {
    pdu: MoPdu,
    dispatched_at: Instant,
}

/// PDUs awaiting a deliver_sm_resp
#[derive(Debug, Default)]
pub struct ResponseTracker {
    awaiting: Mutex<HashMap<u32, Tracked>>,
}

impl ResponseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pdu: MoPdu) {
        let tracked = Tracked {
            pdu,
            dispatched_at: Instant::now(),
        };
        lock(&self.awaiting).insert(tracked.pdu.sequence_number(), tracked);
    }

    /// Remove and return the PDU with `sequence_number`, if tracked
    pub fn take(&self, sequence_number: u32) -> Option<MoPdu> {
        lock(&self.awaiting)
            .remove(&sequence_number)
            .map(|tracked| tracked.pdu)
    }

    /// Remove every entry dispatched more than `timeout` ago
    pub fn reclaim_older_than(&self, timeout: Duration) -> Vec<MoPdu> {
        let now = Instant::now();
        let mut awaiting = lock(&self.awaiting);
        let expired: Vec<u32> = awaiting
            .iter()
            .filter(|(_, t)| now.duration_since(t.dispatched_at) >= timeout)
            .map(|(seq, _)| *seq)
            .collect();
        expired
            .into_iter()
            .filter_map(|seq| awaiting.remove(&seq).map(|t| t.pdu))
            .collect()
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        lock(&self.awaiting).contains_key(&sequence_number)
    }

    pub fn len(&self) -> usize {
        lock(&self.awaiting).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.awaiting).is_empty()
    }
}
