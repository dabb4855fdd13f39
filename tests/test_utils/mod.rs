// Synthetic roving sensor impact tests shared by the integration tests
#![allow(dead_code)]

use sdlma_core::{Direction, Measurement, TimeSeries};
use std::f64::consts::PI;
use std::path::PathBuf;

pub const FS: u32 = 1024;
pub const WINDOW: usize = 1024;
/// Measurement points; the hammer strikes the first one
pub const POINTS: [&str; 3] = ["p1", "p2", "p3"];

pub struct Mode {
    pub freq: f64,
    pub xi: f64,
    /// Real mode shape per measurement point
    pub shape: [f64; 3],
}

pub fn two_modes() -> Vec<Mode> {
    vec![
        Mode { freq: 50.0, xi: 0.03, shape: [1.0, 0.6, -0.4] },
        Mode { freq: 120.0, xi: 0.02, shape: [0.8, -0.5, 1.0] },
    ]
}

pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sdlma"))
}

/// Three sample Hann shaped hammer pulse starting at `at`
pub fn hammer_pulse(len: usize, at: usize, amplitude: f64) -> Vec<f64> {
    let mut force = vec![0.0; len];
    for (i, w) in [0.5, 1.0, 0.5].iter().enumerate() {
        if at + i < len {
            force[at + i] = amplitude * w;
        }
    }
    force
}

/// Impulse response at `point` for a hit at `driving_point`
pub fn impulse_response(modes: &[Mode], point: usize, driving_point: usize, len: usize) -> Vec<f64> {
    let dt = 1.0 / FS as f64;
    (0..len)
        .map(|n| {
            let t = n as f64 * dt;
            modes
                .iter()
                .map(|m| {
                    let wn = 2.0 * PI * m.freq;
                    let wd = wn * (1.0 - m.xi * m.xi).sqrt();
                    m.shape[point] * m.shape[driving_point] * (-m.xi * wn * t).exp() * (wd * t).sin() / wd
                })
                .sum::<f64>()
        })
        .collect()
}

fn convolve(force: &[f64], irf: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; force.len()];
    for (i, &f) in force.iter().enumerate().filter(|(_, f)| **f != 0.0) {
        for (j, &h) in irf.iter().enumerate().take(force.len() - i) {
            out[i + j] += f * h;
        }
    }
    out
}

/// Recorded force and responses of `impacts` hits at point 0
pub fn impact_signals(modes: &[Mode], impacts: usize) -> (Vec<TimeSeries>, Vec<TimeSeries>) {
    let mut force = Vec::with_capacity(impacts * WINDOW);
    let mut responses = vec![Vec::with_capacity(impacts * WINDOW); POINTS.len()];
    for hit in 0..impacts {
        let pulse = hammer_pulse(WINDOW, 10, 100.0 + 10.0 * hit as f64);
        for (k, resp) in responses.iter_mut().enumerate() {
            resp.extend(convolve(&pulse, &impulse_response(modes, k, 0, WINDOW)));
        }
        force.extend(pulse);
    }

    let exc = vec![TimeSeries::new(force, "N", FS, "force", POINTS[0], Direction::MinusZ)];
    let resp = responses
        .into_iter()
        .zip(POINTS)
        .map(|(data, name)| TimeSeries::new(data, "m", FS, "displacement", name, Direction::PlusZ))
        .collect();
    (exc, resp)
}

pub fn impact_test(name: &str, impacts: usize) -> Measurement {
    let (exc, resp) = impact_signals(&two_modes(), impacts);
    Measurement::new(name, WINDOW, FS, exc, resp, "synthetic").expect("valid synthetic measurement")
}
