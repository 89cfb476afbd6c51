// ABOUTME: Implements the SMPP v3.4 data_sm PDU as an alternative MO submission form
// ABOUTME: data_sm carries its user data in the message_payload TLV and is never retried

use crate::codec::{CodecError, Encodable, PduHeader, encode_cstring};
use crate::datatypes::{
    CommandId, CommandStatus, NumericPlanIndicator, TAG_MESSAGE_PAYLOAD, Tlv, TypeOfNumber,
};
use bytes::{BufMut, Bytes, BytesMut};

const MAX_SERVICE_TYPE_LENGTH: usize = 5;
const MAX_ADDR_LENGTH: usize = 64;

/// SMPP v3.4 data_sm PDU (Section 4.7.1)
///
/// Unlike deliver_sm there is no short_message field; the user data travels in
/// the message_payload optional parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSm {
    pub sequence_number: u32,
    pub service_type: String,
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    pub source_addr: String,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    pub destination_addr: String,
    pub esm_class: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
    pub optional_parameters: Vec<Tlv>,
}

impl DataSm {
    /// Create a data_sm carrying `payload` in a message_payload TLV
    pub fn new(
        sequence_number: u32,
        source_addr: impl Into<String>,
        destination_addr: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            sequence_number,
            service_type: String::new(),
            source_addr_ton: TypeOfNumber::International,
            source_addr_npi: NumericPlanIndicator::Isdn,
            source_addr: source_addr.into(),
            dest_addr_ton: TypeOfNumber::International,
            dest_addr_npi: NumericPlanIndicator::Isdn,
            destination_addr: destination_addr.into(),
            esm_class: 0,
            registered_delivery: 0,
            data_coding: 0,
            optional_parameters: vec![Tlv::new(TAG_MESSAGE_PAYLOAD, payload)],
        }
    }

    /// The message_payload value, if present
    pub fn payload(&self) -> Option<&Bytes> {
        self.optional_parameters
            .iter()
            .find(|tlv| tlv.tag == TAG_MESSAGE_PAYLOAD)
            .map(|tlv| &tlv.value)
    }
}

impl Encodable for DataSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::DataSm,
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        encode_cstring(buf, &self.service_type, MAX_SERVICE_TYPE_LENGTH, "service_type")?;
        buf.put_u8(self.source_addr_ton as u8);
        buf.put_u8(self.source_addr_npi as u8);
        encode_cstring(buf, &self.source_addr, MAX_ADDR_LENGTH, "source_addr")?;
        buf.put_u8(self.dest_addr_ton as u8);
        buf.put_u8(self.dest_addr_npi as u8);
        encode_cstring(buf, &self.destination_addr, MAX_ADDR_LENGTH, "destination_addr")?;
        buf.put_u8(self.esm_class);
        buf.put_u8(self.registered_delivery);
        buf.put_u8(self.data_coding);

        for tlv in &self.optional_parameters {
            if tlv.length() > u16::MAX as usize {
                return Err(CodecError::FieldValidation {
                    field: "optional_parameters",
                    reason: format!("TLV {:#06x} value of {} octets", tlv.tag, tlv.length()),
                });
            }
            tlv.encode(buf);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_sm_header_and_payload() {
        let pdu = DataSm::new(9, "447700900123", "12345", &b"payload"[..]);
        let bytes = pdu.to_bytes().unwrap();

        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..8], &(CommandId::DataSm as u32).to_be_bytes());
        assert_eq!(&bytes[12..16], &9u32.to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 7..], b"payload");
        assert_eq!(pdu.payload().map(|p| p.as_ref()), Some(&b"payload"[..]));
    }

    #[test]
    fn data_sm_rejects_long_address() {
        let pdu = DataSm::new(1, "1", "9".repeat(65), &b""[..]);
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::FieldValidation { field: "destination_addr", .. })
        ));
    }
}
