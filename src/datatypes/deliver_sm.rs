// ABOUTME: Implements the deliver_sm and deliver_sm_resp PDUs used to push MO traffic to a bound ESME
// ABOUTME: The esm_class receipt bit distinguishes delivery receipts from plain mobile originated messages

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
};
use crate::datatypes::{CommandId, CommandStatus, NumericPlanIndicator, Tlv, TypeOfNumber};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

// SMPP v3.4 field length limits (excluding null terminator)
const MAX_SERVICE_TYPE_LENGTH: usize = 5;
const MAX_ADDR_LENGTH: usize = 20;
/// Longest short_message a deliver_sm can carry
pub const MAX_SHORT_MESSAGE_LENGTH: usize = 254;
const MAX_MESSAGE_ID_LENGTH: usize = 64;

/// esm_class bit 2: SMSC Delivery Receipt
pub const ESM_CLASS_DELIVERY_RECEIPT: u8 = 0x04;

/// This operation is used by the SMSC to deliver a short message to an ESME.
/// The deliver_sm PDU is used to deliver both mobile originated messages and
/// delivery receipts from the SMSC to the ESME.
///
/// schedule_delivery_time, validity_period, replace_if_present_flag and
/// sm_default_msg_id are unused for deliver_sm and always encoded as NULL / 0.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    pub sequence_number: u32,

    /// service_type: SMS application service associated with the message.
    pub service_type: String,
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    /// Address of the handset which originated this message.
    pub source_addr: String,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    /// Destination (service) address; used to pick the receiver session.
    pub destination_addr: String,
    /// Bit 2 set marks a delivery receipt.
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
    /// Up to 254 octets of user data. sm_length is derived when encoding.
    pub short_message: Bytes,
    pub optional_parameters: Vec<Tlv>,
}

impl DeliverSm {
    /// Creates a builder for constructing DeliverSm PDUs
    pub fn builder() -> DeliverSmBuilder {
        DeliverSmBuilder::default()
    }

    /// Whether this deliver_sm carries a delivery receipt rather than an MO message
    pub fn is_receipt(&self) -> bool {
        self.esm_class & ESM_CLASS_DELIVERY_RECEIPT != 0
    }
}

/// Builder for creating DeliverSm PDUs with sensible defaults
#[derive(Debug, Default)]
pub struct DeliverSmBuilder {
    inner: DeliverSmFields,
}

#[derive(Debug, Default)]
struct DeliverSmFields {
    sequence_number: u32,
    service_type: String,
    source_addr_ton: TypeOfNumber,
    source_addr_npi: NumericPlanIndicator,
    source_addr: String,
    dest_addr_ton: TypeOfNumber,
    dest_addr_npi: NumericPlanIndicator,
    destination_addr: String,
    esm_class: u8,
    protocol_id: u8,
    priority_flag: u8,
    registered_delivery: u8,
    data_coding: u8,
    short_message: Bytes,
    optional_parameters: Vec<Tlv>,
}

impl DeliverSmBuilder {
    pub fn sequence_number(mut self, seq: u32) -> Self {
        self.inner.sequence_number = seq;
        self
    }

    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.inner.service_type = service_type.into();
        self
    }

    pub fn source_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.source_addr = addr.into();
        self
    }

    pub fn destination_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.destination_addr = addr.into();
        self
    }

    pub fn source_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.inner.source_addr_ton = ton;
        self.inner.source_addr_npi = npi;
        self
    }

    pub fn dest_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.inner.dest_addr_ton = ton;
        self.inner.dest_addr_npi = npi;
        self
    }

    pub fn short_message(mut self, message: impl Into<Bytes>) -> Self {
        self.inner.short_message = message.into();
        self
    }

    pub fn esm_class(mut self, esm_class: u8) -> Self {
        self.inner.esm_class = esm_class;
        self
    }

    /// Mark the message as an SMSC delivery receipt
    pub fn delivery_receipt(mut self) -> Self {
        self.inner.esm_class |= ESM_CLASS_DELIVERY_RECEIPT;
        self
    }

    pub fn data_coding(mut self, data_coding: u8) -> Self {
        self.inner.data_coding = data_coding;
        self
    }

    pub fn priority_flag(mut self, priority_flag: u8) -> Self {
        self.inner.priority_flag = priority_flag;
        self
    }

    pub fn registered_delivery(mut self, registered_delivery: u8) -> Self {
        self.inner.registered_delivery = registered_delivery;
        self
    }

    pub fn optional_parameter(mut self, tlv: Tlv) -> Self {
        self.inner.optional_parameters.push(tlv);
        self
    }

    /// Build the DeliverSm. Field limits are checked when the PDU is encoded, so an
    /// oversized message surfaces as a marshal failure at dispatch time.
    pub fn build(self) -> DeliverSm {
        let f = self.inner;
        DeliverSm {
            sequence_number: f.sequence_number,
            service_type: f.service_type,
            source_addr_ton: f.source_addr_ton,
            source_addr_npi: f.source_addr_npi,
            source_addr: f.source_addr,
            dest_addr_ton: f.dest_addr_ton,
            dest_addr_npi: f.dest_addr_npi,
            destination_addr: f.destination_addr,
            esm_class: f.esm_class,
            protocol_id: f.protocol_id,
            priority_flag: f.priority_flag,
            registered_delivery: f.registered_delivery,
            data_coding: f.data_coding,
            short_message: f.short_message,
            optional_parameters: f.optional_parameters,
        }
    }
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.short_message.len() > MAX_SHORT_MESSAGE_LENGTH {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "{} octets exceeds maximum of {MAX_SHORT_MESSAGE_LENGTH} (use message_payload)",
                    self.short_message.len()
                ),
            });
        }

        PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSm,
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
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag);
        buf.put_u8(0); // schedule_delivery_time
        buf.put_u8(0); // validity_period
        buf.put_u8(self.registered_delivery);
        buf.put_u8(0); // replace_if_present_flag
        buf.put_u8(self.data_coding);
        buf.put_u8(0); // sm_default_msg_id
        buf.put_u8(self.short_message.len() as u8);
        buf.put_slice(&self.short_message);

        for tlv in &self.optional_parameters {
            tlv.encode(buf);
        }

        Ok(())
    }
}

impl Decodable for DeliverSm {
    fn command_id() -> CommandId {
        CommandId::DeliverSm
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let service_type = decode_cstring(buf, MAX_SERVICE_TYPE_LENGTH, "service_type")?;
        let source_addr_ton = decode_ton(buf)?;
        let source_addr_npi = decode_npi(buf)?;
        let source_addr = decode_cstring(buf, MAX_ADDR_LENGTH, "source_addr")?;
        let dest_addr_ton = decode_ton(buf)?;
        let dest_addr_npi = decode_npi(buf)?;
        let destination_addr = decode_cstring(buf, MAX_ADDR_LENGTH, "destination_addr")?;
        let esm_class = decode_u8(buf)?;
        let protocol_id = decode_u8(buf)?;
        let priority_flag = decode_u8(buf)?;
        decode_cstring(buf, 16, "schedule_delivery_time")?;
        decode_cstring(buf, 16, "validity_period")?;
        let registered_delivery = decode_u8(buf)?;
        decode_u8(buf)?; // replace_if_present_flag
        let data_coding = decode_u8(buf)?;
        decode_u8(buf)?; // sm_default_msg_id
        let sm_length = decode_u8(buf)? as usize;
        if buf.remaining() < sm_length {
            return Err(CodecError::Incomplete);
        }
        let short_message = buf.copy_to_bytes(sm_length);

        let mut optional_parameters = Vec::new();
        while buf.remaining() >= 4 {
            let tag = buf.get_u16();
            let length = buf.get_u16() as usize;
            if buf.remaining() < length {
                return Err(CodecError::Incomplete);
            }
            optional_parameters.push(Tlv::new(tag, buf.copy_to_bytes(length)));
        }

        Ok(DeliverSm {
            sequence_number: header.sequence_number,
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            protocol_id,
            priority_flag,
            registered_delivery,
            data_coding,
            short_message,
            optional_parameters,
        })
    }
}

fn decode_ton(buf: &mut Cursor<&[u8]>) -> Result<TypeOfNumber, CodecError> {
    let raw = decode_u8(buf)?;
    TypeOfNumber::try_from(raw).map_err(|_| CodecError::FieldValidation {
        field: "addr_ton",
        reason: format!("unknown type of number {raw:#x}"),
    })
}

fn decode_npi(buf: &mut Cursor<&[u8]>) -> Result<NumericPlanIndicator, CodecError> {
    let raw = decode_u8(buf)?;
    NumericPlanIndicator::try_from(raw).map_err(|_| CodecError::FieldValidation {
        field: "addr_npi",
        reason: format!("unknown numbering plan {raw:#x}"),
    })
}

/// The deliver_sm_resp PDU is the ESME's answer to a deliver_sm. Its
/// command_status decides whether the MO message is finished or retried.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// message_id: unused for deliver_sm_resp, normally NULL.
    pub message_id: String,
}

impl DeliverSmResponse {
    pub fn new(sequence_number: u32, command_status: CommandStatus) -> Self {
        Self {
            command_status,
            sequence_number,
            message_id: String::new(),
        }
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSmResp,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LENGTH, "message_id")
    }
}

impl Decodable for DeliverSmResponse {
    fn command_id() -> CommandId {
        CommandId::DeliverSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        // Some ESMEs omit the body entirely on error responses
        let message_id = if buf.has_remaining() {
            decode_cstring(buf, MAX_MESSAGE_ID_LENGTH, "message_id")?
        } else {
            String::new()
        };

        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeliverSm {
        DeliverSm::builder()
            .sequence_number(7)
            .source_addr("447700900123")
            .destination_addr("12345")
            .source_numbering(TypeOfNumber::International, NumericPlanIndicator::Isdn)
            .short_message("Hello World")
            .build()
    }

    #[test]
    fn deliver_sm_to_bytes_basic() {
        let bytes = sample().to_bytes().unwrap();

        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..8], &(CommandId::DeliverSm as u32).to_be_bytes());
        assert_eq!(&bytes[8..12], &0u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &7u32.to_be_bytes());

        let message_bytes = b"Hello World";
        assert!(
            bytes
                .windows(message_bytes.len())
                .any(|window| window == message_bytes)
        );
    }

    #[test]
    fn deliver_sm_decodes_what_it_encodes() {
        let pdu = sample();
        let bytes = pdu.to_bytes().unwrap();
        assert_eq!(DeliverSm::from_bytes(&bytes).unwrap(), pdu);
    }

    #[test]
    fn deliver_sm_delivery_receipt() {
        let receipt = DeliverSm::builder()
            .destination_addr("12345")
            .delivery_receipt()
            .short_message("id:1 sub:001 dlvrd:001 stat:DELIVRD err:000 text:Hello")
            .build();

        assert!(receipt.is_receipt());
        assert!(!sample().is_receipt());
    }

    #[test]
    fn oversized_short_message_fails_to_marshal() {
        let pdu = DeliverSm::builder()
            .sequence_number(1)
            .destination_addr("12345")
            .short_message(vec![b'x'; 255])
            .build();

        let err = pdu.to_bytes().unwrap_err();
        assert!(matches!(err, CodecError::FieldValidation { field: "short_message", .. }));
    }

    #[test]
    fn oversized_destination_fails_to_marshal() {
        let pdu = DeliverSm::builder()
            .sequence_number(1)
            .destination_addr("1".repeat(21))
            .build();

        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::FieldValidation { field: "destination_addr", .. })
        ));
    }

    #[test]
    fn deliver_sm_response_to_bytes() {
        let bytes = DeliverSmResponse::new(1, CommandStatus::Ok).to_bytes().unwrap();

        assert_eq!(&bytes[0..4], &17u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &(CommandId::DeliverSmResp as u32).to_be_bytes());
        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[16], 0);
    }

    #[test]
    fn deliver_sm_response_without_body() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x05, // deliver_sm_resp
            0x00, 0x00, 0x00, 0x14, // ESME_RMSGQFUL
            0x00, 0x00, 0x00, 0x2A, // sequence_number
        ];
        let resp = DeliverSmResponse::from_bytes(data).unwrap();
        assert_eq!(resp.sequence_number, 42);
        assert_eq!(resp.command_status, CommandStatus::MessageQueueFull);
        assert!(resp.message_id.is_empty());
    }
}
