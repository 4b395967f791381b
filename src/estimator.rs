//! Benosman 2014 local plane-fit optic-flow estimator.
//!
//! For the event under consideration, gathers the most recent event at
//! every pixel in a square spatial window whose timestamp falls inside
//! [dtMin, dtMax] of the current event, fits a plane t = a*x + b*y + c to
//! that neighborhood by ordinary least squares, and turns the plane's
//! spatial gradient into a flow vector. The fit is always exactly three
//! unknowns, so it's solved directly from the normal equations rather than
//! through a general linear-algebra crate.

use crate::buffer::EventBuffer;
use crate::config::Config;
use crate::event::Event;

struct Sample {
    x: f64,
    y: f64,
    t: f64,
}

/// Attempts to compute optic flow for `e` using its spatio-temporal
/// neighborhood in `buffer`. On success sets `e.u`, `e.v`, `e.has_flow`.
pub fn estimate(e: &mut Event, buffer: &EventBuffer, cfg: &Config) {
    let dx = cfg.flow_dx as i32;
    let width = buffer.width() as i32;
    let height = buffer.height() as i32;
    let ex = e.x as i32;
    let ey = e.y as i32;

    let mut samples = Vec::with_capacity(((2 * dx + 1) * (2 * dx + 1)) as usize);

    for oy in -dx..=dx {
        for ox in -dx..=dx {
            let nx = ex + ox;
            let ny = ey + oy;
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            let (nx, ny) = (nx as u16, ny as u16);
            let cand = if nx == e.x && ny == e.y {
                *e
            } else {
                buffer.latest(nx, ny)
            };
            if cand.is_sentinel() {
                continue;
            }
            let dt = e.t - cand.t;
            if dt < 0 {
                continue;
            }
            if nx == e.x && ny == e.y {
                // The event itself always has dt = 0 and is always admitted.
            } else if dt < cfg.flow_dt_min_us || dt > cfg.flow_dt_max_us {
                continue;
            }
            samples.push(Sample {
                x: nx as f64,
                y: ny as f64,
                t: cand.t as f64,
            });
        }
    }

    if samples.len() < 3 {
        e.has_flow = false;
        return;
    }

    let mut current = samples;
    loop {
        let Some(fit) = fit_plane(&current) else {
            e.has_flow = false;
            return;
        };

        let residual_sum_sq: f64 = current
            .iter()
            .map(|s| {
                let pred = fit.a * s.x + fit.b * s.y + fit.c;
                let r = s.t - pred;
                r * r
            })
            .sum();

        if residual_sum_sq > cfg.flow_thr1 * current.len() as f64 {
            e.has_flow = false;
            return;
        }

        let variance = residual_sum_sq / current.len() as f64;
        let before = current.len();
        current.retain(|s| {
            let pred = fit.a * s.x + fit.b * s.y + fit.c;
            let r = s.t - pred;
            (r * r - variance) <= cfg.flow_thr2
        });

        if current.len() == before {
            return finalize(e, fit.a, fit.b);
        }
        if current.len() < 3 {
            e.has_flow = false;
            return;
        }
    }
}

struct PlaneFit {
    a: f64,
    b: f64,
    #[allow(dead_code)]
    c: f64,
}

/// Ordinary least squares fit of t = a*x + b*y + c via the 3x3 normal
/// equations built from the sums of the sample moments.
fn fit_plane(samples: &[Sample]) -> Option<PlaneFit> {
    let n = samples.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy, mut syy, mut sxt, mut syt, mut st) =
        (0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);

    for s in samples {
        sx += s.x;
        sy += s.y;
        sxx += s.x * s.x;
        sxy += s.x * s.y;
        syy += s.y * s.y;
        sxt += s.x * s.t;
        syt += s.y * s.t;
        st += s.t;
    }

    // Symmetric 3x3 system [sxx sxy sx; sxy syy sy; sx sy n] * [a b c]^T = [sxt syt st]^T
    let m = [[sxx, sxy, sx], [sxy, syy, sy], [sx, sy, n]];
    let rhs = [sxt, syt, st];

    solve3(m, rhs).map(|[a, b, c]| PlaneFit { a, b, c })
}

/// Solves a 3x3 linear system via Cramer's rule. Returns `None` when the
/// system is (near-)singular.
fn solve3(m: [[f64; 3]; 3], rhs: [f64; 3]) -> Option<[f64; 3]> {
    let det = det3(m);
    if det.abs() < 1e-12 {
        return None;
    }
    let mut result = [0.0; 3];
    for col in 0..3 {
        let mut replaced = m;
        for row in 0..3 {
            replaced[row][col] = rhs[row];
        }
        result[col] = det3(replaced) / det;
    }
    Some(result)
}

fn det3(m: [[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

const GRADIENT_FLOOR: f64 = 1e-9;

fn finalize(e: &mut Event, a: f64, b: f64) {
    let denom = a * a + b * b;
    if denom < GRADIENT_FLOOR {
        e.has_flow = false;
        return;
    }
    let u = a / denom;
    let v = b / denom;
    if !u.is_finite() || !v.is_finite() {
        e.has_flow = false;
        return;
    }
    e.u = u;
    e.v = v;
    e.has_flow = true;
}
