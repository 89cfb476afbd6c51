// ABOUTME: Injection boundary: turns a handset message into a deliver_sm on the inbound queue
// ABOUTME: Validates the numbers, assigns a sequence number and records the message for audit

use crate::audit::{MessageRecord, MessageStore, MessageType};
use crate::datatypes::{DeliverSm, MAX_SHORT_MESSAGE_LENGTH, NumericPlanIndicator, TypeOfNumber};
use crate::directory::ReceiverDirectory;
use crate::inbound::{InboundError, InboundQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("Invalid {field}: '{value}' is not a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Message of {0} octets exceeds {MAX_SHORT_MESSAGE_LENGTH}")]
    MessageTooLong(usize),

    #[error(transparent)]
    Queue(#[from] InboundError),
}

/// Builds MO deliver_sm PDUs from a handset, a service number and some text
pub struct MoInjector<D: ReceiverDirectory> {
    queue: Arc<InboundQueue<D>>,
    store: Arc<dyn MessageStore>,
    sequence_number: AtomicU32,
}

impl<D: ReceiverDirectory> MoInjector<D> {
    pub fn new(queue: Arc<InboundQueue<D>>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            queue,
            store,
            sequence_number: AtomicU32::new(0),
        }
    }

    /// Queue a message sent from `handset` to `service`.
    ///
    /// Returns the sequence number of the queued deliver_sm. The message is
    /// recorded in the audit store even when the queue rejects it.
    pub fn inject(
        &self,
        handset: &str,
        service: &str,
        text: &str,
        timestamp: SystemTime,
    ) -> Result<u32, InjectError> {
        let source = parse_number("handset number", handset)?;
        let destination = parse_number("service number", service)?;
        if text.len() > MAX_SHORT_MESSAGE_LENGTH {
            return Err(InjectError::MessageTooLong(text.len()));
        }

        let sequence_number = self.next_sequence_number();
        let pdu = DeliverSm::builder()
            .sequence_number(sequence_number)
            .source_addr(source.to_string())
            .source_numbering(TypeOfNumber::International, NumericPlanIndicator::Isdn)
            .destination_addr(destination.to_string())
            .dest_numbering(TypeOfNumber::International, NumericPlanIndicator::Isdn)
            .short_message(text.as_bytes().to_vec())
            .build();

        self.store.save(MessageRecord::new(
            source,
            destination,
            text,
            MessageType::Mo,
            timestamp,
        ));
        self.queue.add_message(pdu.into())?;

        info!(sequence_number, handset = source, service = destination, "MO message injected");
        Ok(sequence_number)
    }

    /// Next sequence number, wrapping and skipping the reserved 0 and 0xFFFFFFFF
    pub fn next_sequence_number(&self) -> u32 {
        loop {
            let next = self
                .sequence_number
                .fetch_add(1, Ordering::Relaxed)
                .wrapping_add(1);
            if next != 0 && next != u32::MAX {
                return next;
            }
        }
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u64, InjectError> {
    value
        .trim()
        .parse()
        .map_err(|_| InjectError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_must_be_numeric() {
        assert_eq!(parse_number("handset number", " 358401234 ").unwrap(), 358401234);
        let err = parse_number("service number", "12ab").unwrap_err();
        assert!(matches!(
            err,
            InjectError::InvalidNumber { field: "service number", .. }
        ));
    }
}
