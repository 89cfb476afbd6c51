// ABOUTME: Delayed redelivery of MO messages the ESME rejected with ESME_RMSGQFUL
// ABOUTME: Runs its own periodic loop that resubmits held PDUs to the inbound queue

use crate::datatypes::MoPdu;
use crate::directory::ReceiverDirectory;
use crate::inbound::{InboundError, InboundQueue, PduStore};
use crate::sync::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives deliver_sm outcomes from the inbound queue
pub trait RetryCoordinator: Send + Sync {
    /// The ESME reported its queue full; offer `pdu` again later
    fn retry_later(&self, pdu: MoPdu);

    /// The ESME accepted `pdu`; forget any retry bookkeeping for it
    fn delivered_ok(&self, pdu: &MoPdu);

    /// The inbound queue gave up on `pdu` without an answer; forget it too
    fn abandoned(&self, pdu: &MoPdu);
}

/// Configuration for [`DelayedInboundQueue`]
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Time between resubmission sweeps (default: 60 seconds)
    pub period: Duration,

    /// Give up on a PDU after this many ESME_RMSGQFUL responses (default: 100)
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            max_attempts: 100,
        }
    }
}

impl RetryConfig {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Holds rejected PDUs and feeds them back to the inbound queue every period
#[derive(Debug, Default)]
pub struct DelayedInboundQueue {
    config: RetryConfig,
    held: PduStore,
    attempts: Mutex<HashMap<u32, u32>>,
}

impl DelayedInboundQueue {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            held: PduStore::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of PDUs waiting for the next sweep
    pub fn size(&self) -> usize {
        self.held.len()
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        self.held.contains(sequence_number)
    }

    /// How many times the ESME has rejected `sequence_number` so far
    pub fn attempts(&self, sequence_number: u32) -> u32 {
        lock(&self.attempts)
            .get(&sequence_number)
            .copied()
            .unwrap_or(0)
    }

    /// Resubmit every held PDU, stopping when the inbound queue is full.
    ///
    /// Returns the number of PDUs handed back to the inbound queue.
    pub fn process<D: ReceiverDirectory>(&self, queue: &InboundQueue<D>) -> usize {
        let mut resubmitted = 0;
        for pdu in self.held.snapshot() {
            let Some(pdu) = self.held.remove(pdu.sequence_number()) else {
                continue;
            };
            match queue.add_message(pdu) {
                Ok(()) => resubmitted += 1,
                Err(InboundError::QueueFull { pdu, .. }) => {
                    debug!("inbound queue full, retry sweep deferred");
                    self.held.push_front(*pdu);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "unexpected error resubmitting MO message");
                }
            }
        }
        if resubmitted > 0 {
            info!(resubmitted, remaining = self.size(), "resubmitted MO messages");
        }
        resubmitted
    }

    /// Sweep every [`RetryConfig::period`] until `cancel` fires
    pub async fn run<D: ReceiverDirectory>(
        self: Arc<Self>,
        queue: Arc<InboundQueue<D>>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.process(&queue);
                }
            }
        }
        debug!("retry loop stopped");
    }
}

impl RetryCoordinator for DelayedInboundQueue {
    fn retry_later(&self, pdu: MoPdu) {
        let sequence_number = pdu.sequence_number();
        let attempts = {
            let mut attempts = lock(&self.attempts);
            let count = attempts.entry(sequence_number).or_insert(0);
            *count += 1;
            *count
        };

        if attempts > self.config.max_attempts {
            warn!(
                sequence_number,
                attempts = attempts - 1,
                "MO message rejected too many times, discarding"
            );
            lock(&self.attempts).remove(&sequence_number);
            return;
        }
        debug!(sequence_number, attempts, "holding MO message for retry");
        self.held.push(pdu);
    }

    fn delivered_ok(&self, pdu: &MoPdu) {
        lock(&self.attempts).remove(&pdu.sequence_number());
    }

    fn abandoned(&self, pdu: &MoPdu) {
        if lock(&self.attempts).remove(&pdu.sequence_number()).is_some() {
            debug!(
                sequence_number = pdu.sequence_number(),
                "dropped retry count for abandoned MO message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::DeliverSm;

    fn pdu(seq: u32) -> MoPdu {
        DeliverSm::builder().sequence_number(seq).build().into()
    }

    #[test]
    fn defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.period, Duration::from_secs(60));
        assert_eq!(config.max_attempts, 100);
    }

    #[test]
    fn attempts_are_counted_until_delivered() {
        let retry = DelayedInboundQueue::new(RetryConfig::default());
        retry.retry_later(pdu(1));
        assert_eq!(retry.size(), 1);
        assert_eq!(retry.attempts(1), 1);

        retry.delivered_ok(&pdu(1));
        assert_eq!(retry.attempts(1), 0);
    }

    #[test]
    fn abandoned_messages_lose_their_attempt_count() {
        let retry = DelayedInboundQueue::new(RetryConfig::default());
        retry.retry_later(pdu(4));
        retry.held.remove(4);
        assert_eq!(retry.attempts(4), 1);

        retry.abandoned(&pdu(4));
        assert_eq!(retry.attempts(4), 0);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let retry = DelayedInboundQueue::new(RetryConfig::default().with_max_attempts(2));
        retry.retry_later(pdu(1));
        retry.held.remove(1);
        retry.retry_later(pdu(1));
        retry.held.remove(1);
        assert_eq!(retry.attempts(1), 2);

        retry.retry_later(pdu(1));
        assert_eq!(retry.size(), 0);
        assert_eq!(retry.attempts(1), 0);
    }
}
