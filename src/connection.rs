// ABOUTME: TCP transport for bound ESME sessions: a writer the inbound queue delivers through
// ABOUTME: and a reader that routes deliver_sm_resp frames back to the inbound queue

use crate::codec::{CodecError, Decodable, Encodable, complete_frame_length};
use crate::datatypes::{DeliverSmResponse, Outbind};
use crate::directory::{OutbindTarget, ReceiverDirectory, Session};
use crate::inbound::InboundQueue;
use bytes::{Bytes, BytesMut};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors raised by the session transport
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed PDU: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection reset by peer")]
    ConnectionReset,
}

/// Split a bound ESME connection into its write side, used by the inbound queue,
/// and its read side, which carries the ESME's responses.
pub fn split(socket: TcpStream) -> (TcpSession, ResponseReader) {
    let (read, write) = socket.into_split();
    (TcpSession::new(write), ResponseReader::new(read))
}

/// Write half of a bound receiver / transceiver session.
///
/// The `OwnedWriteHalf` is decorated with a `BufWriter`; every PDU is flushed
/// straight away since MO traffic is latency sensitive rather than bulk.
#[derive(Debug)]
pub struct TcpSession {
    stream: Mutex<BufWriter<OwnedWriteHalf>>,
}

impl TcpSession {
    pub fn new(stream: OwnedWriteHalf) -> Self {
        Self {
            stream: Mutex::new(BufWriter::new(stream)),
        }
    }
}

impl Session for TcpSession {
    async fn write_response(&self, bytes: Bytes) -> io::Result<()> {
        let mut stream = self.stream.lock().await;
        stream.write_all(&bytes).await?;
        stream.flush().await
    }
}

/// Read half of a bound session, decoding the responses the ESME sends back.
#[derive(Debug)]
pub struct ResponseReader {
    stream: OwnedReadHalf,
    // The buffer for reading frames.
    buffer: BytesMut,
}

impl ResponseReader {
    pub fn new(stream: OwnedReadHalf) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read the next deliver_sm_resp, skipping any other PDU.
    ///
    /// Returns `None` when the ESME closes the connection cleanly.
    pub async fn read_deliver_sm_resp(
        &mut self,
    ) -> Result<Option<DeliverSmResponse>, ConnectionError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                match DeliverSmResponse::from_bytes(&frame) {
                    Ok(resp) => return Ok(Some(resp)),
                    Err(CodecError::UnexpectedCommandId { actual, .. }) => {
                        debug!(command_id = ?actual, "ignoring PDU on receiver session")
                    }
                    Err(e) => warn!(error = %e, "discarding malformed PDU"),
                }
                continue;
            }

            // `0` indicates "end of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // A clean shutdown leaves nothing half-read in the buffer.
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(ConnectionError::ConnectionReset)
                };
            }
        }
    }

    /// Split one complete frame off the buffer, if one has arrived.
    ///
    /// A command_length outside the valid range leaves no way to find the next
    /// frame, so it ends the session.
    fn parse_frame(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        let Some(len) = complete_frame_length(&self.buffer)? else {
            return Ok(None);
        };
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Route every deliver_sm_resp to [`InboundQueue::on_deliver_sm_resp`] until
    /// the ESME disconnects or `cancel` fires.
    pub async fn run<D: ReceiverDirectory>(
        mut self,
        queue: Arc<InboundQueue<D>>,
        cancel: CancellationToken,
    ) -> Result<(), ConnectionError> {
        loop {
            let response = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                response = self.read_deliver_sm_resp() => response?,
            };
            match response {
                Some(resp) => queue.on_deliver_sm_resp(&resp),
                None => {
                    info!("receiver session closed by ESME");
                    return Ok(());
                }
            }
        }
    }
}

/// Connect to the ESME named in `target` and issue an outbind on the new
/// connection. The stream is returned so the session layer can take the bind.
pub async fn send_outbind(
    target: &OutbindTarget,
    sequence_number: u32,
) -> Result<TcpStream, ConnectionError> {
    let pdu = Outbind::new(sequence_number, target.system_id.clone(), target.password.clone());
    let bytes = pdu.to_bytes()?;

    let mut stream = TcpStream::connect(&target.address).await?;
    if let Err(e) = stream.write_all(&bytes).await {
        warn!(address = %target.address, error = %e, "failed writing outbind");
        return Err(e.into());
    }
    stream.flush().await?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{CommandId, CommandStatus, DeliverSm};
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn session_writes_marshalled_bytes() {
        let (server, mut esme) = pair().await;
        let (session, _reader) = split(server);

        let bytes = DeliverSm::builder()
            .sequence_number(5)
            .destination_addr("12345")
            .short_message("hi")
            .build()
            .to_bytes()
            .unwrap();
        session.write_response(bytes.clone()).await.unwrap();

        let mut received = vec![0u8; bytes.len()];
        esme.read_exact(&mut received).await.unwrap();
        assert_eq!(received, bytes.as_ref());
    }

    #[tokio::test]
    async fn reader_skips_other_pdus_and_returns_deliver_sm_resp() {
        let (server, mut esme) = pair().await;
        let (_session, mut reader) = split(server);

        let enquire_link: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x01,
        ];
        let resp = DeliverSmResponse::new(9, CommandStatus::MessageQueueFull)
            .to_bytes()
            .unwrap();

        // Split the response across two writes to exercise partial buffering
        esme.write_all(enquire_link).await.unwrap();
        esme.write_all(&resp[..10]).await.unwrap();
        esme.flush().await.unwrap();
        esme.write_all(&resp[10..]).await.unwrap();
        esme.flush().await.unwrap();

        let decoded = reader.read_deliver_sm_resp().await.unwrap().unwrap();
        assert_eq!(decoded.sequence_number, 9);
        assert_eq!(decoded.command_status, CommandStatus::MessageQueueFull);

        drop(esme);
        assert!(reader.read_deliver_sm_resp().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn outbind_is_written_to_the_esme() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = OutbindTarget::new(listener.local_addr().unwrap().to_string(), "SMPPSim")
            .with_password("pw");

        let _stream = send_outbind(&target, 3).await.unwrap();
        let (mut esme, _) = listener.accept().await.unwrap();

        let mut header = [0u8; 16];
        esme.read_exact(&mut header).await.unwrap();
        assert_eq!(&header[4..8], &(CommandId::Outbind as u32).to_be_bytes());
        assert_eq!(&header[12..16], &3u32.to_be_bytes());
    }
}
