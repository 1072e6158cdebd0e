use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kanal_core::prelude::*;

const PROCESSES: usize = 6;
const ROUNDS: u64 = 20;

/// Every process broadcasts once per round and polls until it has seen the
/// whole round from everybody.
#[test]
fn concurrent_broadcast_rounds_deliver_everything_once() {
    let transport = Arc::new(
        Transport::builder(PROCESSES)
            .gaussian_delay(1, 1)
            .seed(7)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..PROCESSES)
        .map(|id| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let me = ProcessId::new(id);
                let mut received = Vec::new();
                let deadline = Instant::now() + Duration::from_secs(30);
                for round in 1..=ROUNDS {
                    let report = Envelope::new(me, me, MessageKind::Report, round, id as i64);
                    transport.broadcast(&report).unwrap();

                    let target = PROCESSES * round as usize;
                    while received.len() < target {
                        assert!(Instant::now() < deadline, "process {} starved", id);
                        match transport.deliver(me).unwrap() {
                            Some(envelope) => {
                                assert_eq!(envelope.receiver(), me);
                                received.push(envelope);
                            }
                            None => thread::sleep(Duration::from_micros(200)),
                        }
                    }
                }
                received
            })
        })
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        let received = handle.join().unwrap();
        assert_eq!(received.len(), PROCESSES * ROUNDS as usize);
        for round in 1..=ROUNDS {
            let mut senders: Vec<_> = received
                .iter()
                .filter(|e| e.round() == round)
                .map(|e| e.sender().index())
                .collect();
            senders.sort_unstable();
            assert_eq!(
                senders,
                (0..PROCESSES).collect::<Vec<_>>(),
                "process {} round {}",
                id,
                round
            );
        }
    }

    let snapshot = transport.snapshot();
    assert_eq!(snapshot.sent, (PROCESSES * PROCESSES) as u64 * ROUNDS);
    assert_eq!(snapshot.delivered, snapshot.sent);
    assert_eq!(snapshot.in_flight(), 0);
}

#[test]
fn per_destination_order_survives_concurrent_senders() {
    let transport = Arc::new(
        Transport::builder(4)
            .delay_model(NoDelayModel)
            .build()
            .unwrap(),
    );
    const PER_SENDER: u64 = 500;

    let senders: Vec<_> = (1..4)
        .map(|id| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                for round in 0..PER_SENDER {
                    let envelope = Envelope::new(
                        ProcessId::new(id),
                        ProcessId::new(0),
                        MessageKind::Proposal,
                        round,
                        0,
                    );
                    while let Err(err) = transport.send(envelope) {
                        assert!(matches!(err, TransportError::ChannelFull { .. }));
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let mut last_round = [None::<u64>; 4];
    let mut total = 0;
    let deadline = Instant::now() + Duration::from_secs(30);
    while total < 3 * PER_SENDER {
        assert!(Instant::now() < deadline, "receiver starved");
        if let Some(envelope) = transport.deliver(ProcessId::new(0)).unwrap() {
            let sender = envelope.sender().index();
            if let Some(previous) = last_round[sender] {
                assert!(envelope.round() > previous, "reordered from {}", sender);
            }
            last_round[sender] = Some(envelope.round());
            total += 1;
        } else {
            thread::yield_now();
        }
    }

    for handle in senders {
        handle.join().unwrap();
    }
    assert_eq!(transport.sent(), transport.delivered());
}
