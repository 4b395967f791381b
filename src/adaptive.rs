//! Adaptive background-activity (BA) filter.
//!
//! Suppresses events with no recently active spatial neighbor, and keeps
//! the suppression threshold tau in closed loop against an EWMA estimate of
//! the flow-producing event rate so throughput tracks a setpoint.

use crate::buffer::LastTimestampMap;
use crate::config::Config;

pub struct AdaptiveFilterState {
    pub tau_us: i64,
    rate: f64,
    last_flow_t: Option<i64>,
    dt_min: i64,
    dt_max: i64,
    setpoint: f64,
    gain: f64,
    time_constant_s: f64,
}

impl AdaptiveFilterState {
    pub fn new(cfg: &Config) -> Self {
        AdaptiveFilterState {
            tau_us: cfg.adaptive_dt_max_us,
            rate: 0.0,
            last_flow_t: None,
            dt_min: cfg.adaptive_dt_min_us,
            dt_max: cfg.adaptive_dt_max_us,
            setpoint: cfg.adaptive_rate_setpoint,
            gain: cfg.adaptive_gain,
            time_constant_s: cfg.adaptive_tau_s,
        }
    }

    /// Returns true when the event at (x, y, t) should be suppressed
    /// because no neighbor has been recently active. Always updates the
    /// neighborhood timestamp map afterward, even for suppressed events.
    pub fn check_and_stamp(&mut self, x: u16, y: u16, t: i64, map: &mut LastTimestampMap) -> bool {
        let prev = map.get(x, y);
        let suppress = prev == 0 || (t - prev) >= self.tau_us;
        map.stamp_neighbors(x, y, t);
        suppress
    }

    /// Feeds the rate-control loop with an event that produced flow, and
    /// adjusts tau toward the configured setpoint.
    pub fn record_flow_event(&mut self, t: i64) {
        if let Some(last) = self.last_flow_t {
            let delta_s = (t - last) as f64 / 1e6;
            let r_inst = 1.0 / (delta_s + 1e-5);
            let phi = (delta_s / self.time_constant_s).clamp(0.0, 1.0);
            self.rate += (r_inst - self.rate) * phi;

            if self.rate < self.setpoint {
                self.tau_us = ((self.tau_us as f64 * self.gain) as i64).min(self.dt_max);
            } else if self.rate > self.setpoint {
                self.tau_us = ((self.tau_us as f64 / self.gain) as i64).max(self.dt_min);
            }
        }
        self.last_flow_t = Some(t);
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_pixel_is_suppressed() {
        let cfg = Config::default();
        let mut state = AdaptiveFilterState::new(&cfg);
        let mut map = LastTimestampMap::new(32, 32);
        assert!(state.check_and_stamp(10, 10, 1000, &mut map));
    }

    #[test]
    fn neighbor_activity_prevents_suppression() {
        let cfg = Config::default();
        let mut state = AdaptiveFilterState::new(&cfg);
        let mut map = LastTimestampMap::new(32, 32);
        state.check_and_stamp(10, 9, 500, &mut map);
        let suppressed = state.check_and_stamp(10, 10, 600, &mut map);
        assert!(!suppressed);
    }

    #[test]
    fn tau_stays_within_bounds() {
        let cfg = Config::default();
        let mut state = AdaptiveFilterState::new(&cfg);
        let mut t = 0i64;
        for _ in 0..1000 {
            t += 100_000; // slow stream, well below setpoint
            state.record_flow_event(t);
            assert!(state.tau_us >= cfg.adaptive_dt_min_us);
            assert!(state.tau_us <= cfg.adaptive_dt_max_us);
        }
    }

    #[test]
    fn tau_increases_for_slow_stream() {
        let cfg = Config {
            adaptive_dt_max_us: 1_000_000,
            ..Config::default()
        };
        let mut state = AdaptiveFilterState::new(&cfg);
        state.tau_us = cfg.adaptive_dt_min_us;
        let mut t = 0i64;
        let mut last_tau = state.tau_us;
        let mut increased = false;
        for _ in 0..50 {
            t += 5_000_000; // 0.2 events/s, far below setpoint of 600
            state.record_flow_event(t);
            if state.tau_us > last_tau {
                increased = true;
            }
            last_tau = state.tau_us;
        }
        assert!(increased);
    }
}
