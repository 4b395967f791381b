//! The per-event driver composing the buffer, estimator, regularization
//! filter and adaptive filter into a single `process(packet)` operation,
//! and the lifecycle that starts and stops the output writer thread
//! alongside it.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, trace};

use crate::adaptive::AdaptiveFilterState;
use crate::buffer::{EventBuffer, LastTimestampMap};
use crate::config::Config;
use crate::error::Result;
use crate::estimator;
use crate::event::Packet;
use crate::output::csv_sink::CsvSink;
use crate::output::serial::SerialSink;
use crate::output::{OutputRing, Sink, Writer};
use crate::regularization;
use crate::telemetry::{Snapshot, Telemetry};

pub struct Pipeline {
    cfg: Config,
    buffer: EventBuffer,
    last_seen: LastTimestampMap,
    adaptive: AdaptiveFilterState,
    telemetry: Arc<Telemetry>,
    writer: Option<Writer>,
    mean_u: f64,
    mean_v: f64,
    wall_anchor: Option<(i64, i64)>, // (event_t_us, wall_t_us) at anchor
}

impl Pipeline {
    /// Validates `cfg`, allocates pipeline state, and starts the writer
    /// thread with whichever sinks the configured output mode requests.
    /// Failure here means no pipeline starts; once construction succeeds
    /// the writer thread is running and waiting for work.
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate()?;

        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        if cfg.output_mode.wants_serial() {
            match SerialSink::open(cfg.serial_port.as_deref().unwrap(), cfg.serial_baud) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => log::warn!("failed to open serial sink, disabling it: {e}"),
            }
        }
        if cfg.output_mode.wants_file() {
            match CsvSink::open(cfg.output_file.as_deref().unwrap()) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => log::warn!("failed to open file sink, disabling it: {e}"),
            }
        }

        let ring = Arc::new(OutputRing::new(cfg.output_ring_capacity));
        let writer = Writer::spawn(ring, sinks)?;

        let buffer = EventBuffer::new(cfg.width, cfg.height);
        let last_seen = LastTimestampMap::new(cfg.width, cfg.height);
        let adaptive = AdaptiveFilterState::new(&cfg);

        debug!("pipeline initialized: {}x{}", cfg.width, cfg.height);

        Ok(Pipeline {
            cfg,
            buffer,
            last_seen,
            adaptive,
            telemetry: Arc::new(Telemetry::new()),
            writer: Some(writer),
            mean_u: 0.0,
            mean_v: 0.0,
            wall_anchor: None,
        })
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Processes one packet of events in arrival order, attaching flow
    /// where possible and handing off the flow-bearing subset to the
    /// writer thread.
    pub fn process(&mut self, packet: &mut Packet) {
        if packet.events.is_empty() {
            return;
        }

        let mut flow_events = Vec::new();
        let mut last_t = packet.events.last().map(|e| e.t).unwrap_or(0);

        for e in packet.events.iter_mut() {
            if !e.valid {
                continue;
            }
            last_t = e.t;

            if self.cfg.adaptive_enable {
                let suppressed = self
                    .adaptive
                    .check_and_stamp(e.x, e.y, e.t, &mut self.last_seen);
                if suppressed {
                    e.valid = false;
                    trace!("event at ({},{}) suppressed by BA filter", e.x, e.y);
                    continue;
                }
            }

            let prev = self.buffer.latest(e.x, e.y);
            if !prev.is_sentinel() && (e.t - prev.t) < self.cfg.refractory_period_us {
                e.valid = false;
                continue;
            }

            estimator::estimate(e, &self.buffer, &self.cfg);
            self.buffer.add(*e);

            if e.has_flow && self.cfg.filter_enable {
                regularization::regularize(e, &self.buffer, &self.cfg);
            }

            if e.has_flow {
                const IIR_ALPHA: f64 = 0.1;
                self.mean_u += (e.u - self.mean_u) * IIR_ALPHA;
                self.mean_v += (e.v - self.mean_v) * IIR_ALPHA;
                if self.cfg.adaptive_enable {
                    self.adaptive.record_flow_event(e.t);
                }
                flow_events.push(*e);
            }
        }

        if !flow_events.is_empty() {
            if let Some(writer) = &self.writer {
                let out = Packet::new(packet.source_id, flow_events);
                if writer.ring().try_enqueue(out).is_err() {
                    log::warn!("output ring full, dropping packet");
                }
            }
        }

        self.update_telemetry(last_t);
    }

    fn update_telemetry(&mut self, event_t_us: i64) {
        let now_us = now_unix_us();
        let (anchor_event, anchor_wall) = match self.wall_anchor {
            Some(a) => a,
            None => {
                self.wall_anchor = Some((event_t_us, now_us));
                (event_t_us, now_us)
            }
        };

        let event_elapsed = event_t_us - anchor_event;
        let wall_elapsed = now_us - anchor_wall;
        let delay_us = wall_elapsed - event_elapsed;

        let delay_ms = if delay_us < 0 {
            // Event clock jumped backward or process just started; rebase
            // rather than reporting a nonsensical negative delay.
            self.wall_anchor = Some((event_t_us, now_us));
            0.0
        } else {
            delay_us as f64 / 1000.0
        };

        self.telemetry.update(Snapshot {
            mean_u: self.mean_u,
            mean_v: self.mean_v,
            delay_ms,
            event_rate_hz: self.adaptive.rate(),
            tau_us: self.adaptive.tau_us,
        });
    }

    /// Stops the writer thread, draining any buffered packets first.
    pub fn shutdown(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.shutdown();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn now_unix_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
