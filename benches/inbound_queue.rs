// ABOUTME: Benchmarks for the MO delivery hot path
// ABOUTME: Measures deliver_sm marshalling and a full queue-dispatch-confirm cycle

use bytes::Bytes;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use smppsim_mo::datatypes::{CommandStatus, DeliverSm};
use smppsim_mo::directory::{ReceiverRegistry, Session};
use smppsim_mo::{DelayedInboundQueue, InboundConfig, InboundQueue, InboundStats, MoPdu, RetryConfig};
use std::io;
use std::sync::Arc;
use std::time::Duration;

struct DiscardSession;

impl Session for DiscardSession {
    async fn write_response(&self, bytes: Bytes) -> io::Result<()> {
        black_box(bytes);
        Ok(())
    }
}

fn sample_deliver_sm(seq: u32) -> MoPdu {
    DeliverSm::builder()
        .sequence_number(seq)
        .source_addr("358401234567")
        .destination_addr("12345")
        .short_message("Hello World")
        .build()
        .into()
}

fn bench_marshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshal");
    group.measurement_time(Duration::from_secs(10));

    let pdu = sample_deliver_sm(1);
    group.bench_function("deliver_sm", |b| b.iter(|| black_box(&pdu).marshal()));

    group.finish();
}

fn bench_dispatch_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(10));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let directory = Arc::new(ReceiverRegistry::new());
    directory.bind("", Arc::new(DiscardSession));
    let queue = InboundQueue::new(
        InboundConfig::default(),
        directory,
        Arc::new(DelayedInboundQueue::new(RetryConfig::default())),
        Arc::new(InboundStats::new()),
    );

    group.bench_function("add_dispatch_confirm_100", |b| {
        b.iter(|| {
            runtime.block_on(async {
                for seq in 1..=100 {
                    queue.add_message(sample_deliver_sm(seq)).expect("capacity");
                }
                queue.dispatch_once().await;
                for seq in 1..=100 {
                    queue.delivery_result(seq, CommandStatus::Ok);
                }
            })
        })
    });

    group.finish();
}

criterion_group!(benches, bench_marshal, bench_dispatch_cycle);
criterion_main!(benches);
