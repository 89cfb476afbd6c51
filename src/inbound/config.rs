// ABOUTME: Configuration for the inbound MO queue
// ABOUTME: Capacity, diagnostic decoding, outbind policy and an optional tracker reclaim timeout

use std::time::Duration;

/// Shortest idle wait between tracker reclaim sweeps
pub const MIN_RECLAIM_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for [`InboundQueue`](super::InboundQueue)
///
/// # Example
///
/// ```rust
/// use smppsim_mo::inbound::InboundConfig;
/// use std::time::Duration;
///
/// let config = InboundConfig::new(500)
///     .with_decode_pdus(true)
///     .with_response_timeout(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct InboundConfig {
    /// Maximum number of PDUs in the primary queue (default: 1000)
    pub capacity: usize,

    /// Log a decoded view of each PDU alongside its hex dump (default: false)
    pub decode_pdus: bool,

    /// Request an outbind when MO messages arrive and no receiver is bound (default: true)
    pub outbind_enabled: bool,

    /// Drop PDUs that wait longer than this for a deliver_sm_resp (default: never)
    ///
    /// A deliver_sm whose session write failed stays tracked until a response
    /// arrives, which it never will. With a timeout set, such entries are
    /// reclaimed with a warning. Reclaimed PDUs are not retried.
    pub response_timeout: Option<Duration>,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            decode_pdus: false,
            outbind_enabled: true,
            response_timeout: None,
        }
    }
}

impl InboundConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_decode_pdus(mut self, decode: bool) -> Self {
        self.decode_pdus = decode;
        self
    }

    pub fn with_outbind(mut self, enabled: bool) -> Self {
        self.outbind_enabled = enabled;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// How long the idle dispatch loop waits before sweeping the tracker.
    ///
    /// Never shorter than [`MIN_RECLAIM_INTERVAL`], so a zero timeout still
    /// lets the loop block.
    pub fn reclaim_interval(&self) -> Option<Duration> {
        self.response_timeout.map(|timeout| timeout.max(MIN_RECLAIM_INTERVAL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InboundConfig::default();
        assert_eq!(config.capacity, 1000);
        assert!(!config.decode_pdus);
        assert!(config.outbind_enabled);
        assert!(config.response_timeout.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = InboundConfig::new(2)
            .with_outbind(false)
            .with_response_timeout(Duration::from_secs(5));
        assert_eq!(config.capacity, 2);
        assert!(!config.outbind_enabled);
        assert_eq!(config.response_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.reclaim_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn reclaim_interval_has_a_floor() {
        assert_eq!(InboundConfig::default().reclaim_interval(), None);

        let config = InboundConfig::default().with_response_timeout(Duration::ZERO);
        assert_eq!(config.response_timeout, Some(Duration::ZERO));
        assert_eq!(config.reclaim_interval(), Some(MIN_RECLAIM_INTERVAL));
    }
}
