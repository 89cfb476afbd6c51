use bytes::{BufMut, Bytes, BytesMut};

/// Tag of the message_payload optional parameter
pub const TAG_MESSAGE_PAYLOAD: u16 = 0x0424;

#[derive(Clone, Debug, PartialEq)]
pub struct Tlv {
    /// The Tag field is used to uniquely identify the particular optional parameter in question.
    pub tag: u16,

    /// The Value field contains the actual data for the optional parameter in question.
    /// Its length is written as the TLV's Length field.
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Length field as it appears on the wire
    pub fn length(&self) -> usize {
        self.value.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tag);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_tag_length_value() {
        let mut buf = BytesMut::new();
        Tlv::new(TAG_MESSAGE_PAYLOAD, &b"hi"[..]).encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x04, 0x24, 0x00, 0x02, b'h', b'i']);
    }
}
