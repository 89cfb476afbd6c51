// ABOUTME: Inbound MO queue: accepts injected PDUs and drives their delivery to bound receivers
// ABOUTME: Owns the primary queue, pending store and response tracker, and runs the dispatch loop

//! Inbound MO delivery
//!
//! [`InboundQueue`] is the coordinator at the centre of MO delivery. Injected
//! PDUs land in a bounded primary queue and a single dispatch loop works through
//! them:
//!
//! * **No receiver bound**: the whole primary queue is moved to the pending
//!   store and, once per absence episode, an outbind is requested.
//! * **Receiver bound**: each PDU is marshalled and written to a session
//!   selected by destination address. Deliver_sm PDUs then wait in the
//!   response tracker for their deliver_sm_resp.
//! * **deliver_sm_resp**: ESME_RMSGQFUL hands the PDU to the
//!   [`RetryCoordinator`]; any other status completes it.
//!
//! A PDU is only ever held by one of the primary queue, pending store,
//! response tracker or retry store. Each of those has its own lock and moves
//! between them are two separate critical sections.
//!
//! ```rust,no_run
//! use smppsim_mo::connection::TcpSession;
//! use smppsim_mo::directory::ReceiverRegistry;
//! use smppsim_mo::inbound::{InboundConfig, InboundQueue};
//! use smppsim_mo::retry::{DelayedInboundQueue, RetryConfig};
//! use smppsim_mo::stats::InboundStats;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let directory = Arc::new(ReceiverRegistry::<TcpSession>::new());
//! let retry = Arc::new(DelayedInboundQueue::new(RetryConfig::default()));
//! let queue = Arc::new(InboundQueue::new(
//!     InboundConfig::default(),
//!     directory,
//!     retry.clone(),
//!     Arc::new(InboundStats::new()),
//! ));
//!
//! let cancel = CancellationToken::new();
//! let dispatch = queue.spawn(cancel.clone());
//! let retries = tokio::spawn(retry.run(queue.clone(), cancel.clone()));
//!
//! cancel.cancel();
//! let _ = tokio::join!(dispatch, retries);
//! # }
//! ```

mod config;
mod error;
mod store;
mod tracker;

pub use config::{InboundConfig, MIN_RECLAIM_INTERVAL};
pub use error::{InboundError, InboundResult};
pub use store::PduStore;
pub use tracker::ResponseTracker;

use crate::datatypes::{CommandStatus, DeliverSmResponse, MoPdu};
use crate::directory::{ReceiverDirectory, Session};
use crate::logging;
use crate::retry::RetryCoordinator;
use crate::stats::StatsSink;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// The stores owned by the inbound queue
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Bounded queue fed by `add_message`
    Primary,
    /// PDUs set aside while no receiver was bound
    Pending,
    /// PDUs written to a session, waiting for a deliver_sm_resp
    AwaitingResponse,
}

/// Whether a dispatch pass may carry on with the next PDU
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Every receiver has gone; leave the rest for the next wake
    Halt,
}

/// Coordinator for MO delivery. Build one per process and share it via `Arc`.
pub struct InboundQueue<D: ReceiverDirectory> {
    config: InboundConfig,
    directory: Arc<D>,
    retry: Arc<dyn RetryCoordinator>,
    stats: Arc<dyn StatsSink>,
    queue: PduStore,
    pending: PduStore,
    awaiting: ResponseTracker,
    wake: Notify,
}

impl<D: ReceiverDirectory> InboundQueue<D> {
    pub fn new(
        config: InboundConfig,
        directory: Arc<D>,
        retry: Arc<dyn RetryCoordinator>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            config,
            directory,
            retry,
            stats,
            queue: PduStore::new(),
            pending: PduStore::new(),
            awaiting: ResponseTracker::new(),
            wake: Notify::new(),
        }
    }

    pub fn config(&self) -> &InboundConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Queue an MO PDU for delivery.
    ///
    /// Fails with [`InboundError::QueueFull`] when the primary queue is at
    /// capacity; the rejected PDU travels back inside the error.
    pub fn add_message(&self, pdu: MoPdu) -> InboundResult<()> {
        let sequence_number = pdu.sequence_number();
        match self.queue.push_bounded(pdu, self.config.capacity) {
            Ok(()) => {
                trace!(sequence_number, "MO message queued");
                self.wake.notify_one();
                Ok(())
            }
            Err(pdu) => {
                debug!(
                    sequence_number,
                    capacity = self.config.capacity,
                    "inbound queue full, rejecting MO message"
                );
                Err(InboundError::QueueFull {
                    capacity: self.config.capacity,
                    pdu: Box::new(pdu),
                })
            }
        }
    }

    /// Handle the outcome of a deliver_sm reported by the ESME.
    ///
    /// A sequence number that is not tracked is ignored: the response arrived
    /// late, twice, or for something this queue never sent.
    pub fn delivery_result(&self, sequence_number: u32, status: CommandStatus) {
        let Some(pdu) = self.awaiting.take(sequence_number) else {
            trace!(sequence_number, ?status, "no tracked PDU for response");
            return;
        };

        if status.requests_retry() {
            info!(sequence_number, "ESME queue full, scheduling MO message for retry");
            self.stats.increment_deliver_sm_retried();
            self.retry.retry_later(pdu);
        } else {
            debug!(sequence_number, ?status, "MO message delivered");
            self.retry.delivered_ok(&pdu);
        }
    }

    /// Route a decoded deliver_sm_resp to [`delivery_result`](Self::delivery_result)
    pub fn on_deliver_sm_resp(&self, resp: &DeliverSmResponse) {
        self.delivery_result(resp.sequence_number, resp.command_status);
    }

    /// Remove `pdu` from the named store. Returns false, with a warning, if it
    /// was not there.
    pub fn remove_message(&self, pdu: &MoPdu, from: QueueKind) -> bool {
        let sequence_number = pdu.sequence_number();
        if self.take_from(sequence_number, from).is_some() {
            return true;
        }
        warn!(sequence_number, queue = ?from, "attempt to remove MO message that is not queued");
        false
    }

    fn take_from(&self, sequence_number: u32, from: QueueKind) -> Option<MoPdu> {
        match from {
            QueueKind::Primary => self.queue.remove(sequence_number),
            QueueKind::Pending => self.pending.remove(sequence_number),
            QueueKind::AwaitingResponse => self.awaiting.take(sequence_number),
        }
    }

    /// Wake the dispatch loop after a receiver or transceiver binds
    pub fn notify_receiver_bound(&self) {
        self.wake.notify_one();
    }

    /// Number of PDUs in the primary queue
    pub fn size(&self) -> usize {
        self.queue.len()
    }

    /// Number of PDUs set aside while no receiver was bound
    pub fn pending_size(&self) -> usize {
        self.pending.len()
    }

    /// Number of PDUs waiting for a deliver_sm_resp
    pub fn awaiting_response_size(&self) -> usize {
        self.awaiting.len()
    }

    /// Which of this queue's stores currently hold `sequence_number`
    pub fn queues_holding(&self, sequence_number: u32) -> Vec<QueueKind> {
        let mut holding = Vec::new();
        if self.queue.contains(sequence_number) {
            holding.push(QueueKind::Primary);
        }
        if self.pending.contains(sequence_number) {
            holding.push(QueueKind::Pending);
        }
        if self.awaiting.contains(sequence_number) {
            holding.push(QueueKind::AwaitingResponse);
        }
        holding
    }

    /// Spawn the dispatch loop on the current tokio runtime
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run(cancel).await })
    }

    /// The dispatch loop. Runs until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(capacity = self.config.capacity, "inbound dispatch loop started");
        while !cancel.is_cancelled() {
            if self.dispatch_once().await {
                continue;
            }

            let reclaim_tick = async {
                match self.config.reclaim_interval() {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = reclaim_tick => {}
            }
        }
        info!("inbound dispatch loop stopped");
    }

    /// One pass of the dispatch loop without waiting.
    ///
    /// Returns true if a dispatch pass ran, false if the queue was empty or no
    /// receiver was bound (in which case queued PDUs have moved to pending).
    pub async fn dispatch_once(&self) -> bool {
        self.reclaim_expired();
        if !self.ready_to_dispatch() {
            return false;
        }

        for pdu in self.queue.snapshot() {
            if self.process(pdu, QueueKind::Primary).await == Flow::Halt {
                debug!("no receivers left, ending dispatch pass");
                break;
            }
        }
        true
    }

    /// Offer every pending PDU to the receivers now bound, oldest first.
    ///
    /// Call after a receiver or transceiver binds. Re-arms the outbind trigger
    /// for the next period without receivers.
    pub async fn deliver_pending_mo_messages(&self) {
        let pending = self.pending.snapshot();
        if !pending.is_empty() {
            info!(count = pending.len(), "delivering pending MO messages");
        }
        for pdu in pending {
            if self.process(pdu, QueueKind::Pending).await == Flow::Halt {
                break;
            }
        }
        self.directory.set_outbind_sent(false);
    }

    /// True when the primary queue has work and a receiver is bound. With no
    /// receiver, drains the primary queue to pending and requests an outbind.
    fn ready_to_dispatch(&self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        if self.directory.bound_receiver_count() > 0 {
            return true;
        }

        let mut drained = 0usize;
        while let Some(pdu) = self.queue.pop() {
            self.pending.push(pdu);
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "no receiver bound, MO messages moved to pending");
            if self.config.outbind_enabled && !self.directory.outbind_sent() {
                info!("requesting outbind");
                self.directory.trigger_outbind();
                self.directory.set_outbind_sent(true);
            }
        }
        false
    }

    fn reclaim_expired(&self) {
        let Some(timeout) = self.config.response_timeout else {
            return;
        };
        for pdu in self.awaiting.reclaim_older_than(timeout) {
            warn!(
                sequence_number = pdu.sequence_number(),
                ?timeout,
                "no deliver_sm_resp received, dropping MO message"
            );
            self.retry.abandoned(&pdu);
        }
    }

    async fn process(&self, pdu: MoPdu, source: QueueKind) -> Flow {
        match pdu {
            MoPdu::DataSm(_) => self.process_data_sm(pdu, source).await,
            MoPdu::DeliverSm(_) => self.process_deliver_sm(pdu, source).await,
        }
    }

    fn halt_if_unbound(&self) -> Flow {
        if self.directory.bound_receiver_count() == 0 {
            Flow::Halt
        } else {
            Flow::Continue
        }
    }

    async fn process_deliver_sm(&self, pdu: MoPdu, source: QueueKind) -> Flow {
        let sequence_number = pdu.sequence_number();
        let bytes = match pdu.marshal() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(sequence_number, error = %e, "failed to marshal deliver_sm, discarding");
                self.stats.increment_marshal_failure();
                self.remove_message(&pdu, source);
                return Flow::Continue;
            }
        };
        logging::hex_dump(pdu.label(), &bytes);
        if self.config.decode_pdus {
            logging::log_decoded(&pdu);
        }

        let Some(session) = self.directory.select_receiver(pdu.destination_addr()) else {
            info!(
                sequence_number,
                destination_addr = pdu.destination_addr(),
                "no receiver for MO message, holding in pending"
            );
            // Pending PDUs stay where they are
            if source != QueueKind::Pending && self.take_from(sequence_number, source).is_some() {
                self.pending.push(pdu);
            }
            return self.halt_if_unbound();
        };

        // Tracked before the write so a quick deliver_sm_resp finds it
        let Some(pdu) = self.take_from(sequence_number, source) else {
            debug!(sequence_number, "MO message already dispatched elsewhere");
            return Flow::Continue;
        };
        self.awaiting.insert(pdu);

        match session.write_response(bytes).await {
            Ok(()) => {
                self.stats.increment_deliver_sm_sent();
                debug!(sequence_number, "deliver_sm written to receiver");
            }
            Err(e) => warn!(
                sequence_number,
                error = %e,
                "failed to write deliver_sm, it will stay unconfirmed"
            ),
        }
        Flow::Continue
    }

    async fn process_data_sm(&self, pdu: MoPdu, source: QueueKind) -> Flow {
        let sequence_number = pdu.sequence_number();
        let bytes = match pdu.marshal() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(sequence_number, error = %e, "failed to marshal data_sm, discarding");
                self.stats.increment_marshal_failure();
                self.remove_message(&pdu, source);
                return Flow::Continue;
            }
        };
        logging::hex_dump(pdu.label(), &bytes);
        if self.config.decode_pdus {
            logging::log_decoded(&pdu);
        }

        let Some(session) = self.directory.select_receiver(pdu.destination_addr()) else {
            info!(sequence_number, "no receiver for data_sm, discarding");
            self.remove_message(&pdu, source);
            return self.halt_if_unbound();
        };

        // One attempt only, whatever the outcome
        if self.take_from(sequence_number, source).is_none() {
            debug!(sequence_number, "data_sm already dispatched elsewhere");
            return Flow::Continue;
        }
        match session.write_response(bytes).await {
            Ok(()) => self.stats.increment_data_sm_ok(),
            Err(e) => {
                warn!(sequence_number, error = %e, "failed to write data_sm");
                self.stats.increment_data_sm_err();
            }
        }
        Flow::Continue
    }
}
