//! Mobile originated delivery engine for an SMPP SMSC simulator.
//!
//! MO messages injected into the simulator are queued by an [`InboundQueue`]
//! and delivered as `deliver_sm` (or `data_sm`) to whichever ESME is bound as a
//! receiver or transceiver. ESME_RMSGQFUL responses send the message to a
//! [`DelayedInboundQueue`] for a later retry.
//!
//! # Example
//!
//! ```rust,no_run
//! use smppsim_mo::audit::MessageLog;
//! use smppsim_mo::connection::{self, TcpSession};
//! use smppsim_mo::directory::ReceiverRegistry;
//! use smppsim_mo::inject::MoInjector;
//! use smppsim_mo::{DelayedInboundQueue, InboundConfig, InboundQueue, InboundStats, RetryConfig};
//! use std::sync::Arc;
//! use std::time::SystemTime;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = Arc::new(ReceiverRegistry::<TcpSession>::new());
//!     let retry = Arc::new(DelayedInboundQueue::new(RetryConfig::default()));
//!     let queue = Arc::new(InboundQueue::new(
//!         InboundConfig::default(),
//!         directory.clone(),
//!         retry.clone(),
//!         Arc::new(InboundStats::new()),
//!     ));
//!
//!     let cancel = CancellationToken::new();
//!     queue.spawn(cancel.clone());
//!     tokio::spawn(retry.run(queue.clone(), cancel.clone()));
//!
//!     // An ESME that has completed bind_receiver on this socket
//!     let listener = TcpListener::bind("127.0.0.1:2775").await?;
//!     let (socket, _) = listener.accept().await?;
//!     let (session, responses) = connection::split(socket);
//!     directory.bind("", Arc::new(session));
//!     tokio::spawn(responses.run(queue.clone(), cancel.clone()));
//!     queue.notify_receiver_bound();
//!     queue.deliver_pending_mo_messages().await;
//!
//!     let injector = MoInjector::new(queue.clone(), Arc::new(MessageLog::new()));
//!     injector.inject("358401234567", "12345", "Hello", SystemTime::now())?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod codec;
pub mod connection;
pub mod datatypes;
pub mod directory;
pub mod inbound;
pub mod inject;
pub mod logging;
pub mod retry;
pub mod stats;
mod sync;


pub use codec::{CodecError, Decodable, Encodable, PduHeader};
pub use datatypes::MoPdu;
pub use directory::{ReceiverDirectory, Session};
pub use inbound::{InboundConfig, InboundError, InboundQueue, QueueKind};
pub use retry::{DelayedInboundQueue, RetryConfig, RetryCoordinator};
pub use stats::{InboundStats, StatsSink};
