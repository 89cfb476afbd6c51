// ABOUTME: Receiver directory seam: which ESME sessions are bound to receive MO traffic
// ABOUTME: Ships a concrete registry with address-range routing and a one-shot outbind trigger

use crate::connection::send_outbind;
use crate::sync::lock;
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// A bound ESME session the MO engine can write PDUs to.
pub trait Session: Send + Sync + 'static {
    /// Write one marshalled PDU to the ESME
    fn write_response(&self, bytes: Bytes) -> impl Future<Output = io::Result<()>> + Send;
}

/// Everything the inbound queue needs to know about bound receivers.
///
/// Bind and unbind handling lives outside the MO engine; the directory only
/// reports the current state.
pub trait ReceiverDirectory: Send + Sync + 'static {
    type Session: Session;

    /// Number of sessions bound as receiver or transceiver
    fn bound_receiver_count(&self) -> usize;

    /// Pick a receiver whose address_range covers `destination_addr`
    fn select_receiver(&self, destination_addr: &str) -> Option<Arc<Self::Session>>;

    /// Ask the configured ESME to bind
    fn trigger_outbind(&self);

    fn outbind_sent(&self) -> bool;

    fn set_outbind_sent(&self, sent: bool);
}

/// The address_range supplied in bind_receiver / bind_transceiver.
///
/// An empty range or `*` accepts any destination, a trailing `*` matches by
/// prefix, anything else must match exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressRange(String);

impl AddressRange {
    pub fn new(range: impl Into<String>) -> Self {
        Self(range.into())
    }

    pub fn matches(&self, address: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => address.starts_with(prefix),
            None => self.0.is_empty() || self.0 == address,
        }
    }
}

impl From<&str> for AddressRange {
    fn from(range: &str) -> Self {
        Self::new(range)
    }
}

/// Where to send an outbind when MO messages are waiting and nobody is bound
#[derive(Clone, Debug)]
pub struct OutbindTarget {
    /// host:port of the ESME
    pub address: String,
    pub system_id: String,
    pub password: Option<String>,
}

impl OutbindTarget {
    pub fn new(address: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            system_id: system_id.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Receives the TCP connection opened for an outbind, so the session layer can
/// process the ESME's bind_receiver on it.
pub type OutbindHandler = Arc<dyn Fn(TcpStream) + Send + Sync>;

/// Identifier handed out by [`ReceiverRegistry::bind`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

struct BoundReceiver<S> {
    id: ReceiverId,
    address_range: AddressRange,
    session: Arc<S>,
}

/// In-process receiver directory.
///
/// When several bound sessions cover the same destination, selection rotates
/// between them.
pub struct ReceiverRegistry<S> {
    receivers: Mutex<Vec<BoundReceiver<S>>>,
    next_id: AtomicU64,
    rotation: AtomicUsize,
    outbind_sent: AtomicBool,
    outbind_sequence: AtomicU32,
    outbinds_triggered: AtomicU64,
    outbind_target: Option<OutbindTarget>,
    outbind_handler: Option<OutbindHandler>,
}

impl<S: Session> Default for ReceiverRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Session> ReceiverRegistry<S> {
    pub fn new() -> Self {
        Self {
            receivers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            rotation: AtomicUsize::new(0),
            outbind_sent: AtomicBool::new(false),
            outbind_sequence: AtomicU32::new(1),
            outbinds_triggered: AtomicU64::new(0),
            outbind_target: None,
            outbind_handler: None,
        }
    }

    /// Send outbinds to `target` when triggered
    pub fn with_outbind(mut self, target: OutbindTarget) -> Self {
        self.outbind_target = Some(target);
        self
    }

    /// Hand connections opened by an outbind to `handler`
    pub fn on_outbind_connected(mut self, handler: OutbindHandler) -> Self {
        self.outbind_handler = Some(handler);
        self
    }

    /// Register a session bound as receiver or transceiver
    pub fn bind(&self, address_range: impl Into<AddressRange>, session: Arc<S>) -> ReceiverId {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let address_range = address_range.into();
        info!(?id, ?address_range, "receiver bound");
        lock(&self.receivers).push(BoundReceiver {
            id,
            address_range,
            session,
        });
        id
    }

    /// Remove a bound session. Returns false if it was not bound.
    pub fn unbind(&self, id: ReceiverId) -> bool {
        let mut receivers = lock(&self.receivers);
        let before = receivers.len();
        receivers.retain(|r| r.id != id);
        let removed = receivers.len() != before;
        if removed {
            info!(?id, "receiver unbound");
        }
        removed
    }

    /// How many times an outbind has been triggered
    pub fn outbinds_triggered(&self) -> u64 {
        self.outbinds_triggered.load(Ordering::Relaxed)
    }
}

impl<S: Session> ReceiverDirectory for ReceiverRegistry<S> {
    type Session = S;

    fn bound_receiver_count(&self) -> usize {
        lock(&self.receivers).len()
    }

    fn select_receiver(&self, destination_addr: &str) -> Option<Arc<S>> {
        let receivers = lock(&self.receivers);
        let candidates: Vec<&BoundReceiver<S>> = receivers
            .iter()
            .filter(|r| r.address_range.matches(destination_addr))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let pick = self.rotation.fetch_add(1, Ordering::Relaxed) % candidates.len();
        debug!(destination_addr, receiver = ?candidates[pick].id, "selected receiver");
        Some(Arc::clone(&candidates[pick].session))
    }

    fn trigger_outbind(&self) {
        self.outbinds_triggered.fetch_add(1, Ordering::Relaxed);

        let Some(target) = self.outbind_target.clone() else {
            warn!("outbind requested but no outbind target is configured");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("outbind requested outside of a tokio runtime");
            return;
        };

        let sequence_number = self.outbind_sequence.fetch_add(1, Ordering::Relaxed);
        let handler = self.outbind_handler.clone();
        runtime.spawn(async move {
            match send_outbind(&target, sequence_number).await {
                Ok(stream) => {
                    info!(address = %target.address, "outbind sent");
                    if let Some(handler) = handler {
                        handler(stream);
                    }
                }
                Err(e) => warn!(address = %target.address, error = %e, "outbind failed"),
            }
        });
    }

    fn outbind_sent(&self) -> bool {
        self.outbind_sent.load(Ordering::Acquire)
    }

    fn set_outbind_sent(&self, sent: bool) {
        self.outbind_sent.store(sent, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSession;

    impl Session for NullSession {
        async fn write_response(&self, _bytes: Bytes) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn address_range_matching() {
        assert!(AddressRange::new("").matches("12345"));
        assert!(AddressRange::new("*").matches("12345"));
        assert!(AddressRange::new("123*").matches("12345"));
        assert!(!AddressRange::new("123*").matches("45123"));
        assert!(AddressRange::new("12345").matches("12345"));
        assert!(!AddressRange::new("12345").matches("123456"));
    }

    #[test]
    fn bind_select_unbind() {
        let registry = ReceiverRegistry::new();
        assert_eq!(registry.bound_receiver_count(), 0);
        assert!(registry.select_receiver("12345").is_none());

        let id = registry.bind("123*", Arc::new(NullSession));
        assert_eq!(registry.bound_receiver_count(), 1);
        assert!(registry.select_receiver("12345").is_some());
        assert!(registry.select_receiver("99999").is_none());

        assert!(registry.unbind(id));
        assert!(!registry.unbind(id));
        assert_eq!(registry.bound_receiver_count(), 0);
    }

    #[test]
    fn selection_rotates_between_matching_sessions() {
        let registry = ReceiverRegistry::new();
        let first = Arc::new(NullSession);
        let second = Arc::new(NullSession);
        registry.bind("", Arc::clone(&first));
        registry.bind("", Arc::clone(&second));

        let a = registry.select_receiver("1").unwrap();
        let b = registry.select_receiver("1").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn outbind_without_target_only_counts() {
        let registry: ReceiverRegistry<NullSession> = ReceiverRegistry::new();
        registry.trigger_outbind();
        assert_eq!(registry.outbinds_triggered(), 1);

        assert!(!registry.outbind_sent());
        registry.set_outbind_sent(true);
        assert!(registry.outbind_sent());
    }
}
