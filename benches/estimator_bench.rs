//! Throughput benchmark for the plane-fit estimator in isolation, run
//! against a pre-populated buffer so the measured cost is just the fit.

use criterion::{criterion_group, criterion_main, Criterion};

use dvs_opticflow::buffer::EventBuffer;
use dvs_opticflow::config::Config;
use dvs_opticflow::estimator;
use dvs_opticflow::event::Event;

fn populated_buffer(cfg: &Config) -> EventBuffer {
    let mut buffer = EventBuffer::new(cfg.width, cfg.height);
    for y in 60..68u16 {
        for x in 0..64u16 {
            buffer.add(Event::new(x, y, x as i64 * 1000, true));
        }
    }
    buffer
}

fn bench_estimate(c: &mut Criterion) {
    let cfg = Config {
        flow_dt_min_us: 0,
        width: 128,
        height: 128,
        ..Config::default()
    };
    let buffer = populated_buffer(&cfg);

    c.bench_function("estimate_single_event", |b| {
        b.iter(|| {
            let mut e = Event::new(64, 64, 64_000, true);
            estimator::estimate(&mut e, &buffer, &cfg);
            criterion::black_box(e)
        })
    });
}

criterion_group!(benches, bench_estimate);
criterion_main!(benches);
