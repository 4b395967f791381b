//! Synthetic event generator exercising the optic-flow pipeline end to end.
//!
//! Stands in for the sensor driver and host harness that would otherwise
//! drive [`dvs_opticflow::Pipeline`]: generates a moving edge plus
//! background noise, feeds it through the pipeline in small packets, and
//! prints the telemetry status line periodically.

use std::time::{Duration, Instant};

use log::info;
use rand::Rng;

use dvs_opticflow::event::{Event, Packet};
use dvs_opticflow::{Config, Pipeline};

const WIDTH: u16 = 128;
const HEIGHT: u16 = 128;
const RUN_DURATION: Duration = Duration::from_secs(5);
const PACKET_INTERVAL_US: i64 = 1_000;

fn main() {
    env_logger::init();

    let cfg = Config {
        width: WIDTH,
        height: HEIGHT,
        ..Config::default()
    };

    let mut pipeline = Pipeline::new(cfg).expect("failed to start pipeline");
    let telemetry = pipeline.telemetry();

    let mut rng = rand::rng();
    let mut t: i64 = 0;
    let start = Instant::now();
    let mut last_report = Instant::now();

    info!("starting synthetic event sweep for {:?}", RUN_DURATION);

    while start.elapsed() < RUN_DURATION {
        let mut events = Vec::new();

        // A vertical edge sweeping left to right across the sensor.
        let edge_x = ((t / 2_000) % (WIDTH as i64 - 4)) as u16;
        for y in (HEIGHT / 4)..(3 * HEIGHT / 4) {
            events.push(Event::new(edge_x, y, t, true));
        }

        // Background noise: a handful of uncorrelated single-pixel events.
        for _ in 0..3 {
            let x = rng.random_range(0..WIDTH);
            let y = rng.random_range(0..HEIGHT);
            events.push(Event::new(x, y, t, rng.random_bool(0.5)));
        }

        let mut packet = Packet::new(0, events);
        pipeline.process(&mut packet);

        if last_report.elapsed() >= Duration::from_millis(500) {
            println!("{}", telemetry.snapshot().status_line());
            last_report = Instant::now();
        }

        t += PACKET_INTERVAL_US;
    }

    pipeline.shutdown();
    info!("simulation complete");
}
