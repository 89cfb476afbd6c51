// ABOUTME: Demo SMSC that injects MO messages and delivers them to the first ESME that connects
// ABOUTME: Shows the inbound queue, retry loop, response reader and injector wired together

//! # MO injection demo
//!
//! Messages are injected straight away. With no ESME connected they sit in the
//! pending store (and an outbind is attempted if `--outbind` is given). Once an
//! ESME connects it is treated as bound as a receiver for every address, the
//! pending messages are delivered and its deliver_sm_resp PDUs are tracked.
//!
//! ```bash
//! cargo run --example inject_mo -- --handset 358401234567 --service 12345 \
//!   --message "Hello" --count 3 --port 2775
//! ```

use argh::FromArgs;
use smppsim_mo::audit::{MessageLog, MessageStore};
use smppsim_mo::connection::{self, TcpSession};
use smppsim_mo::directory::{OutbindTarget, ReceiverRegistry};
use smppsim_mo::inject::MoInjector;
use smppsim_mo::{DelayedInboundQueue, InboundConfig, InboundQueue, InboundStats, RetryConfig};
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Inject MO messages and deliver them to a connecting ESME
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the port to accept the ESME on (default: 2775)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// the handset (source) number
    #[argh(option)]
    handset: String,

    /// the service (destination) number
    #[argh(option)]
    service: String,

    /// the message text (default: "Hello from SMPPSim")
    #[argh(option, short = 'm')]
    message: Option<String>,

    /// how many messages to inject (default: 1)
    #[argh(option, short = 'c')]
    count: Option<u32>,

    /// host:port of an ESME to outbind to while nobody is bound
    #[argh(option)]
    outbind: Option<String>,

    /// how long to run in seconds (default: 60)
    #[argh(option)]
    run_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::TRACE } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = cli_args.port.unwrap_or(2775);
    let message = cli_args
        .message
        .unwrap_or_else(|| "Hello from SMPPSim".to_owned());
    let run_duration = Duration::from_secs(cli_args.run_duration.unwrap_or(60));

    let mut registry = ReceiverRegistry::<TcpSession>::new();
    if let Some(address) = cli_args.outbind {
        registry = registry.with_outbind(OutbindTarget::new(address, "SMPPSim"));
    }
    let directory = Arc::new(registry);
    let retry = Arc::new(DelayedInboundQueue::new(RetryConfig::new(Duration::from_secs(5))));
    let stats = Arc::new(InboundStats::new());
    let queue = Arc::new(InboundQueue::new(
        InboundConfig::default().with_decode_pdus(cli_args.debugging),
        directory.clone(),
        retry.clone(),
        stats.clone(),
    ));

    let cancel = CancellationToken::new();
    let dispatch = queue.spawn(cancel.clone());
    let retries = tokio::spawn(retry.clone().run(queue.clone(), cancel.clone()));

    let log = Arc::new(MessageLog::new());
    let injector = MoInjector::new(queue.clone(), log.clone());
    for _ in 0..cli_args.count.unwrap_or(1) {
        match injector.inject(&cli_args.handset, &cli_args.service, &message, SystemTime::now()) {
            Ok(sequence_number) => info!("Injected MO message {sequence_number}"),
            Err(e) => warn!("Injection failed: {e}"),
        }
    }

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Waiting for an ESME on port {port}");

    tokio::select! {
        _ = tokio::time::sleep(run_duration) => info!("Run duration elapsed"),
        accepted = listener.accept() => {
            let (socket, peer) = accepted?;
            info!("ESME connected from {peer}");

            let (session, responses) = connection::split(socket);
            directory.bind("", Arc::new(session));
            let reader = tokio::spawn(responses.run(queue.clone(), cancel.clone()));
            queue.notify_receiver_bound();
            queue.deliver_pending_mo_messages().await;

            tokio::time::sleep(run_duration).await;
            cancel.cancel();
            if let Ok(Err(e)) = reader.await {
                warn!("Response reader ended with error: {e}");
            }
        }
    }

    cancel.cancel();
    let _ = tokio::join!(dispatch, retries);

    let snapshot = stats.snapshot();
    info!(
        "queued={} pending={} awaiting={} retrying={} sent={} retried={} recorded={}",
        queue.size(),
        queue.pending_size(),
        queue.awaiting_response_size(),
        retry.size(),
        snapshot.deliver_sm_sent,
        snapshot.deliver_sm_retried,
        log.find_all().len(),
    );
    Ok(())
}
