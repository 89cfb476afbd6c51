// ABOUTME: FIFO PDU store keyed by sequence number, used for the primary queue and pending store
// ABOUTME: Each store sits behind its own mutex; callers never hold two at once

use crate::datatypes::MoPdu;
use crate::sync::lock;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Insertion-ordered collection of PDUs
#[derive(Debug, Default)]
pub struct PduStore {
    pdus: Mutex<VecDeque<MoPdu>>,
}

impl PduStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, pdu: MoPdu) {
        lock(&self.pdus).push_back(pdu);
    }

    /// Put `pdu` back at the head of the store
    pub fn push_front(&self, pdu: MoPdu) {
        lock(&self.pdus).push_front(pdu);
    }

    /// Append unless the store already holds `capacity` PDUs, in which case
    /// the PDU is handed back.
    pub fn push_bounded(&self, pdu: MoPdu, capacity: usize) -> Result<(), MoPdu> {
        let mut pdus = lock(&self.pdus);
        if pdus.len() >= capacity {
            return Err(pdu);
        }
        pdus.push_back(pdu);
        Ok(())
    }

    /// Remove the PDU carrying `sequence_number`
    pub fn remove(&self, sequence_number: u32) -> Option<MoPdu> {
        let mut pdus = lock(&self.pdus);
        let index = pdus
            .iter()
            .position(|p| p.sequence_number() == sequence_number)?;
        pdus.remove(index)
    }

    /// Copy of the current contents in insertion order
    pub fn snapshot(&self) -> Vec<MoPdu> {
        lock(&self.pdus).iter().cloned().collect()
    }

    /// Remove and return the oldest PDU
    pub fn pop(&self) -> Option<MoPdu> {
        lock(&self.pdus).pop_front()
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        lock(&self.pdus)
            .iter()
            .any(|p| p.sequence_number() == sequence_number)
    }

    pub fn len(&self) -> usize {
        lock(&self.pdus).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pdus).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::DeliverSm;

    fn pdu(seq: u32) -> MoPdu {
        DeliverSm::builder()
            .sequence_number(seq)
            .destination_addr("1")
            .build()
            .into()
    }

    #[test]
    fn keeps_insertion_order() {
        let store = PduStore::new();
        store.push(pdu(2));
        store.push(pdu(1));
        store.push(pdu(3));

        let order: Vec<u32> = store.snapshot().iter().map(|p| p.sequence_number()).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(store.pop().map(|p| p.sequence_number()), Some(2));
    }

    #[test]
    fn remove_by_sequence_number() {
        let store = PduStore::new();
        store.push(pdu(1));
        store.push(pdu(2));

        assert_eq!(store.remove(1).map(|p| p.sequence_number()), Some(1));
        assert!(store.remove(1).is_none());
        assert!(!store.contains(1));
        assert!(store.contains(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn bounded_push_hands_back_the_pdu() {
        let store = PduStore::new();
        assert!(store.push_bounded(pdu(1), 1).is_ok());
        let rejected = store.push_bounded(pdu(2), 1).unwrap_err();
        assert_eq!(rejected.sequence_number(), 2);
        assert_eq!(store.len(), 1);
    }
}
