// ABOUTME: Error types surfaced by the inbound MO queue
// ABOUTME: Queue-full rejections hand the PDU back so callers can hold on to it

use crate::codec::CodecError;
use crate::datatypes::MoPdu;
use std::io;
use thiserror::Error;

/// Errors raised by [`InboundQueue`](super::InboundQueue) operations
#[derive(Debug, Error)]
pub enum InboundError {
    /// The primary queue is at capacity; the message was rejected, not dropped.
    ///
    /// The rejected PDU is returned so the caller decides what happens to it.
    #[error("Inbound queue full (capacity {capacity})")]
    QueueFull { capacity: usize, pdu: Box<MoPdu> },

    /// The PDU could not be marshalled to wire bytes
    #[error("Marshal error: {0}")]
    Marshal(#[from] CodecError),

    /// Writing to the bound session failed
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),
}

/// Result type alias for inbound queue operations
pub type InboundResult<T> = Result<T, InboundError>;

impl InboundError {
    /// True for the flow-control rejection from `add_message`
    pub fn is_queue_full(&self) -> bool {
        matches!(self, InboundError::QueueFull { .. })
    }

    /// Recover the PDU carried by a queue-full rejection
    pub fn into_rejected_pdu(self) -> Option<MoPdu> {
        match self {
            InboundError::QueueFull { pdu, .. } => Some(*pdu),
            _ => None,
        }
    }
}
