// SMPP v3.4 Codec - Separates encoding logic from the queue engine
//
// The inbound queue only ever needs "give me the bytes for this PDU" and, on the
// response side, "which sequence number / status does this deliver_sm_resp carry".
// Each PDU implements Encodable/Decodable so the engine can treat marshalling as an
// opaque, fallible boundary.

use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum allowed PDU size to prevent memory exhaustion attacks
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
#[derive(Debug, Clone, PartialEq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: CommandId,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode PDU header from buffer with validation
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id_raw = buf.get_u32();
        let command_id = CommandId::try_from(command_id_raw)
            .map_err(|_| CodecError::InvalidCommandId(command_id_raw))?;
        let command_status = CommandStatus::from(buf.get_u32());
        let sequence_number = buf.get_u32();

        if !(Self::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        if sequence_number == 0 || sequence_number == 0xFFFF_FFFF {
            return Err(CodecError::ReservedSequenceNumber(sequence_number));
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode PDU header to buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.command_status.into());
        buf.put_u32(self.sequence_number);
    }
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU to the buffer. `command_length` may be written as a
    /// placeholder; `to_bytes` patches it.
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Encode into a fresh buffer and fix up the command_length field.
    ///
    /// This is the marshal step of the inbound queue: a failure here discards the
    /// message but never stops the queue.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;

        let length = buf.len() as u32;
        if length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }
        buf[0..4].copy_from_slice(&length.to_be_bytes());

        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer after header
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this PDU type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }

    /// Decode a complete PDU (header and body) from a byte slice
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let header = PduHeader::decode(&mut cursor)?;
        Self::validate_header(&header)?;
        Self::decode(header, &mut cursor)
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid command_id: {0:#x}")]
    InvalidCommandId(u32),

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Reserved sequence number: {0} (0 and 0xFFFFFFFF are reserved)")]
    ReservedSequenceNumber(u32),

    #[error("Unexpected command_id: expected {expected:?}, got {actual:?}")]
    UnexpectedCommandId {
        expected: CommandId,
        actual: CommandId,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("UTF-8 decoding error in field '{field}': {source}")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Peek at the command_length of the next frame, if a full header is buffered.
///
/// Returns `Ok(None)` until the whole frame is available.
pub fn complete_frame_length(buf: &[u8]) -> Result<Option<usize>, CodecError> {
    if buf.len() < PduHeader::SIZE {
        return Ok(None);
    }
    let command_length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if !(PduHeader::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
        return Err(CodecError::InvalidPduLength {
            length: command_length,
            min: PduHeader::SIZE as u32,
            max: MAX_PDU_SIZE,
        });
    }
    let len = command_length as usize;
    Ok((buf.len() >= len).then_some(len))
}

/// Encode a variable-length C-Octet string, validating its maximum length
/// (excluding the null terminator).
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    if value.len() > max_len {
        return Err(CodecError::FieldValidation {
            field,
            reason: format!("{} octets exceeds maximum of {max_len}", value.len()),
        });
    }
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

/// Decode a variable-length C-Octet string of at most `max_len` octets plus terminator
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let chunk = buf.chunk();
    let end = chunk
        .iter()
        .take(max_len + 1)
        .position(|&b| b == 0)
        .ok_or_else(|| {
            if chunk.len() <= max_len {
                CodecError::Incomplete
            } else {
                CodecError::FieldValidation {
                    field,
                    reason: format!("missing null terminator within {} octets", max_len + 1),
                }
            }
        })?;

    let value = chunk[..end].to_vec();
    buf.advance(end + 1);
    String::from_utf8(value).map_err(|source| CodecError::Utf8Error { field, source })
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdu_header_encode_decode() {
        let header = PduHeader {
            command_length: 17,
            command_id: CommandId::DeliverSmResp,
            command_status: CommandStatus::MessageQueueFull,
            sequence_number: 42,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        let mut cursor = Cursor::new(buf.as_ref());
        let decoded = PduHeader::decode(&mut cursor).unwrap();

        assert_eq!(header, decoded);
    }

    #[test]
    fn pdu_header_validation() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x08, // command_length too small
            0x80, 0x00, 0x00, 0x05, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let result = PduHeader::decode(&mut Cursor::new(data));
        assert!(matches!(result, Err(CodecError::InvalidPduLength { .. })));

        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x05, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x00, // sequence_number (reserved)
        ];
        let result = PduHeader::decode(&mut Cursor::new(data));
        assert!(matches!(result, Err(CodecError::ReservedSequenceNumber(0))));
    }

    #[test]
    fn unknown_command_status_keeps_the_raw_value() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x05, // command_id
            0x00, 0x00, 0x00, 0x09, // reserved command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let header = PduHeader::decode(&mut Cursor::new(data)).unwrap();
        assert_eq!(header.command_status, CommandStatus::Other(0x09));
    }

    #[test]
    fn cstring_length_is_enforced() {
        let mut buf = BytesMut::new();
        encode_cstring(&mut buf, "hello", 5, "test").unwrap();
        assert_eq!(buf.as_ref(), b"hello\0");

        let err = encode_cstring(&mut buf, "toolong", 5, "test").unwrap_err();
        assert!(matches!(err, CodecError::FieldValidation { field: "test", .. }));
    }

    #[test]
    fn decode_cstring_stops_at_terminator() {
        let data = b"abc\0rest";
        let mut cursor = Cursor::new(&data[..]);
        assert_eq!(decode_cstring(&mut cursor, 20, "test").unwrap(), "abc");
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn frame_length_waits_for_complete_frame() {
        let mut data = vec![0x00, 0x00, 0x00, 0x11, 0x80, 0x00, 0x00, 0x05];
        data.extend_from_slice(&[0; 8]);
        assert_eq!(complete_frame_length(&data).unwrap(), None);

        data.push(0);
        assert_eq!(complete_frame_length(&data).unwrap(), Some(17));
    }
}
