//! The purpose of the outbind operation is to allow the SMSC signal an ESME to
//! originate a bind_receiver request to the SMSC. The MO engine raises one when
//! messages are waiting and no receiver is bound.
//!
//! Once the network connection to the ESME is up, the SMSC issues "outbind";
//! the ESME answers with "bind_receiver" on a fresh session.

use crate::codec::{CodecError, Encodable, PduHeader, encode_cstring};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::BytesMut;

const MAX_SYSTEM_ID_LENGTH: usize = 15;
const MAX_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct Outbind {
    pub sequence_number: u32,
    /// Identifies the SMSC to the ESME.
    pub system_id: String,
    /// The password used by the ESME to authenticate the SMSC. NULL when absent.
    pub password: Option<String>,
}

impl Outbind {
    pub fn new(sequence_number: u32, system_id: impl Into<String>, password: Option<String>) -> Self {
        Self {
            sequence_number,
            system_id: system_id.into(),
            password,
        }
    }
}

impl Encodable for Outbind {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::Outbind,
            // Command status is always 0 for outbind
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        encode_cstring(buf, &self.system_id, MAX_SYSTEM_ID_LENGTH, "system_id")?;
        encode_cstring(
            buf,
            self.password.as_deref().unwrap_or(""),
            MAX_PASSWORD_LENGTH,
            "password",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbind_to_bytes() {
        let bytes = Outbind::new(1, "SMPPSim", Some("secret".to_string()))
            .to_bytes()
            .unwrap();

        assert_eq!(bytes.len(), 16 + 8 + 7);
        assert_eq!(&bytes[4..8], &(CommandId::Outbind as u32).to_be_bytes());
        assert_eq!(&bytes[16..24], b"SMPPSim\0");
        assert_eq!(&bytes[24..], b"secret\0");
    }

    #[test]
    fn outbind_without_password() {
        let bytes = Outbind::new(2, "SMPPSim", None).to_bytes().unwrap();
        assert_eq!(bytes.len(), 16 + 8 + 1);
    }
}
