//! End-to-end packet throughput benchmark: how many events per second the
//! full process() path (BA filter, estimator, regularization, telemetry)
//! can sustain with the output sinks disabled.

use criterion::{criterion_group, criterion_main, Criterion};

use dvs_opticflow::event::{Event, Packet};
use dvs_opticflow::{Config, Pipeline};

fn bench_packet_processing(c: &mut Criterion) {
    let cfg = Config {
        width: 128,
        height: 128,
        ..Config::default()
    };
    let mut pipeline = Pipeline::new(cfg).unwrap();

    c.bench_function("process_packet_64_events", |b| {
        let mut t = 0i64;
        b.iter(|| {
            let events: Vec<Event> = (0..64u16)
                .map(|i| {
                    t += 100;
                    Event::new(i, 30, t, true)
                })
                .collect();
            let mut packet = Packet::new(0, events);
            pipeline.process(&mut packet);
            criterion::black_box(&packet);
        })
    });

    pipeline.shutdown();
}

criterion_group!(benches, bench_packet_processing);
criterion_main!(benches);
