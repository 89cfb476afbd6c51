// ABOUTME: The MO PDU variants accepted by the inbound queue
// ABOUTME: Sequence number is the sole correlation key across every queue the PDU visits

use crate::codec::{CodecError, Encodable};
use crate::datatypes::{DataSm, DeliverSm};
use bytes::Bytes;

/// A mobile originated PDU awaiting delivery to an ESME.
///
/// Immutable once created; the queues only ever move it around by sequence number.
#[derive(Clone, Debug, PartialEq)]
pub enum MoPdu {
    /// Plain MO message or delivery receipt. Tracked for a deliver_sm_resp and retried
    /// on ESME_RMSGQFUL.
    DeliverSm(Box<DeliverSm>),
    /// Fire-and-forget alternative. Never tracked, never retried.
    DataSm(Box<DataSm>),
}

impl MoPdu {
    pub fn sequence_number(&self) -> u32 {
        match self {
            MoPdu::DeliverSm(pdu) => pdu.sequence_number,
            MoPdu::DataSm(pdu) => pdu.sequence_number,
        }
    }

    pub fn destination_addr(&self) -> &str {
        match self {
            MoPdu::DeliverSm(pdu) => &pdu.destination_addr,
            MoPdu::DataSm(pdu) => &pdu.destination_addr,
        }
    }

    /// Marshal to SMPP wire bytes
    pub fn marshal(&self) -> Result<Bytes, CodecError> {
        match self {
            MoPdu::DeliverSm(pdu) => pdu.to_bytes(),
            MoPdu::DataSm(pdu) => pdu.to_bytes(),
        }
    }

    /// Label used in diagnostic hex dumps
    pub fn label(&self) -> &'static str {
        match self {
            MoPdu::DeliverSm(pdu) if pdu.is_receipt() => "DELIVER_SM (receipt):",
            MoPdu::DeliverSm(_) => "DELIVER_SM:",
            MoPdu::DataSm(_) => "DATA_SM:",
        }
    }
}

impl From<DeliverSm> for MoPdu {
    fn from(pdu: DeliverSm) -> Self {
        MoPdu::DeliverSm(Box::new(pdu))
    }
}

impl From<DataSm> for MoPdu {
    fn from(pdu: DataSm) -> Self {
        MoPdu::DataSm(Box::new(pdu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_follow_the_variant() {
        let deliver: MoPdu = DeliverSm::builder()
            .sequence_number(3)
            .destination_addr("111")
            .delivery_receipt()
            .build()
            .into();
        let data: MoPdu = DataSm::new(4, "1", "222", &b"x"[..]).into();

        assert_eq!(deliver.sequence_number(), 3);
        assert_eq!(deliver.destination_addr(), "111");
        assert_eq!(deliver.label(), "DELIVER_SM (receipt):");
        assert_eq!(data.sequence_number(), 4);
        assert_eq!(data.destination_addr(), "222");
        assert_eq!(data.label(), "DATA_SM:");
    }
}
