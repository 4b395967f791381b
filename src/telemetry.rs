//! Pipeline status snapshot, updated after each processed packet and
//! readable by an external status line without blocking the pipeline
//! thread.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    pub mean_u: f64,
    pub mean_v: f64,
    pub delay_ms: f64,
    pub event_rate_hz: f64,
    pub tau_us: i64,
}

impl Snapshot {
    pub fn status_line(&self) -> String {
        format!(
            "flow=({:+.4},{:+.4}) px/us  delay={:.2}ms  rate={:.1}Hz  tau={}us",
            self.mean_u, self.mean_v, self.delay_ms, self.event_rate_hz, self.tau_us
        )
    }
}

pub struct Telemetry {
    inner: Mutex<Snapshot>,
}

impl Telemetry {
    pub fn new() -> Self {
        Telemetry {
            inner: Mutex::new(Snapshot::default()),
        }
    }

    pub fn update(&self, snapshot: Snapshot) {
        *self.inner.lock() = snapshot;
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.inner.lock()
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
