//! Spatial regularization filter.
//!
//! Once an event carries a candidate flow estimate, compare it against the
//! flow already attached to its recently-active spatial neighbors and
//! reject outliers in speed or direction. With fewer than three qualifying
//! neighbors there isn't enough evidence to reject, so the candidate is
//! kept as-is.

use crate::buffer::EventBuffer;
use crate::config::Config;
use crate::event::Event;

pub fn regularize(e: &mut Event, buffer: &EventBuffer, cfg: &Config) {
    if !e.has_flow {
        return;
    }

    let dx = cfg.filter_dx as i32;
    let width = buffer.width() as i32;
    let height = buffer.height() as i32;
    let ex = e.x as i32;
    let ey = e.y as i32;

    let mut speeds = Vec::new();
    let mut angles = Vec::new();

    for oy in -dx..=dx {
        for ox in -dx..=dx {
            if ox == 0 && oy == 0 {
                continue;
            }
            let nx = ex + ox;
            let ny = ey + oy;
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            let n = buffer.latest(nx as u16, ny as u16);
            if !n.has_flow {
                continue;
            }
            if e.t - n.t < 0 || e.t - n.t > cfg.filter_dt_max_us {
                continue;
            }
            speeds.push((n.u * n.u + n.v * n.v).sqrt());
            angles.push(n.v.atan2(n.u));
        }
    }

    if speeds.len() < 3 {
        return;
    }

    let mean_speed = speeds.iter().sum::<f64>() / speeds.len() as f64;
    let mean_angle = circular_mean(&angles);

    if mean_speed <= 0.0 {
        return;
    }

    let this_speed = (e.u * e.u + e.v * e.v).sqrt();
    let this_angle = e.v.atan2(e.u);

    let speed_dev = (this_speed - mean_speed).abs() / mean_speed;
    let angle_dev = angular_distance_deg(this_angle, mean_angle);

    if speed_dev > cfg.filter_max_speed_factor || angle_dev > cfg.filter_max_angle_deg {
        e.has_flow = false;
    }
}

/// Mean direction of a set of angles (radians) via the resultant vector,
/// robust to the wraparound that a plain arithmetic mean would mishandle.
fn circular_mean(angles: &[f64]) -> f64 {
    let (mut sin_sum, mut cos_sum) = (0.0, 0.0);
    for &a in angles {
        sin_sum += a.sin();
        cos_sum += a.cos();
    }
    sin_sum.atan2(cos_sum)
}

/// Principal-value angular difference in degrees, within [0, 180].
fn angular_distance_deg(a: f64, b: f64) -> f64 {
    let mut diff = (a - b).to_degrees() % 360.0;
    if diff < 0.0 {
        diff += 360.0;
    }
    if diff > 180.0 {
        diff = 360.0 - diff;
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_event(x: u16, y: u16, t: i64, u: f64, v: f64) -> Event {
        let mut e = Event::new(x, y, t, true);
        e.u = u;
        e.v = v;
        e.has_flow = true;
        e
    }

    #[test]
    fn keeps_flow_with_insufficient_neighbors() {
        let cfg = Config::default();
        let buffer = EventBuffer::new(16, 16);
        let mut e = flow_event(8, 8, 1000, 1e-3, 1e-3);
        regularize(&mut e, &buffer, &cfg);
        assert!(e.has_flow);
    }

    #[test]
    fn rejects_outlier_direction() {
        let cfg = Config::default();
        let mut buffer = EventBuffer::new(16, 16);
        // Three consistent neighbors moving right.
        buffer.add(flow_event(7, 7, 900, 1e-3, 0.0));
        buffer.add(flow_event(8, 7, 900, 1e-3, 0.0));
        buffer.add(flow_event(9, 7, 900, 1e-3, 0.0));
        let mut e = flow_event(8, 8, 1000, -1e-3, 0.0);
        regularize(&mut e, &buffer, &cfg);
        assert!(!e.has_flow);
    }

    #[test]
    fn keeps_flow_consistent_with_neighbors() {
        let cfg = Config::default();
        let mut buffer = EventBuffer::new(16, 16);
        buffer.add(flow_event(7, 7, 900, 1e-3, 0.0));
        buffer.add(flow_event(8, 7, 900, 1e-3, 0.0));
        buffer.add(flow_event(9, 7, 900, 1e-3, 0.0));
        let mut e = flow_event(8, 8, 1000, 1.05e-3, 0.0);
        regularize(&mut e, &buffer, &cfg);
        assert!(e.has_flow);
    }
}
