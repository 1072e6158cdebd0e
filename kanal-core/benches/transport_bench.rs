#[macro_use]
extern crate criterion;

use criterion::Criterion;

use kanal_core::prelude::*;

fn bench_send_deliver(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport_throughput");

    for process_count in [4, 16, 64] {
        group.throughput(criterion::Throughput::Elements(1));
        group.bench_function(format!("send_deliver_{}", process_count), |b| {
            let transport = Transport::builder(process_count)
                .delay_model(NoDelayModel)
                .build()
                .unwrap();
            let envelope = Envelope::new(
                ProcessId::new(0),
                ProcessId::new(process_count - 1),
                MessageKind::Report,
                1,
                0,
            );
            b.iter(|| {
                transport.send(envelope).unwrap();
                transport
                    .deliver(ProcessId::new(process_count - 1))
                    .unwrap()
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_broadcast_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_round");

    for process_count in [4, 16] {
        group.throughput(criterion::Throughput::Elements(
            (process_count * process_count) as u64,
        ));
        group.bench_function(format!("processes_{}", process_count), |b| {
            let transport = Transport::builder(process_count)
                .delay_model(NoDelayModel)
                .build()
                .unwrap();
            b.iter(|| {
                for sender in 0..process_count {
                    let envelope = Envelope::new(
                        ProcessId::new(sender),
                        ProcessId::new(sender),
                        MessageKind::Report,
                        1,
                        sender as i64,
                    );
                    transport.broadcast(&envelope).unwrap();
                }
                for receiver in 0..process_count {
                    while transport.deliver(ProcessId::new(receiver)).unwrap().is_some() {}
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_send_deliver, bench_broadcast_round);
criterion_main!(benches);
