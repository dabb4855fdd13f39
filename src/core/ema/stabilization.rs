// src/core/ema/stabilization.rs
//
// Stabilisation chart: poles that persist between consecutive model orders
// are physical, the rest are numerical.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Relative frequency change still counted as stable
pub const FREQ_TOL: f64 = 0.01;
/// Relative damping change still counted as stable
pub const DAMPING_TOL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    Unstable,
    /// Frequency matches the previous order
    Frequency,
    /// Frequency and damping match the previous order
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pole {
    /// Model order the pole was found at
    pub order: usize,
    /// Natural frequency in Hz
    pub freq: f64,
    /// Damping ratio
    pub xi: f64,
    pub s: Complex64,
    pub stability: Stability,
}

impl Pole {
    pub fn from_s(order: usize, s: Complex64) -> Self {
        let omega = s.norm();
        Self {
            order,
            freq: omega / (2.0 * PI),
            xi: if omega > 0.0 { -s.re / omega } else { 0.0 },
            s,
            stability: Stability::Unstable,
        }
    }
}

fn rel_diff(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        if a == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        ((a - b) / b).abs()
    }
}

/// Classify the poles of every order against the order before it.
///
/// `per_order` must be sorted by ascending order; the lowest order is always
/// unstable.
pub fn stabilize(per_order: &[(usize, Vec<Complex64>)]) -> Vec<Pole> {
    let mut out = Vec::new();
    let mut previous: Vec<Pole> = Vec::new();

    for (order, roots) in per_order {
        let mut current: Vec<Pole> = roots.iter().map(|&s| Pole::from_s(*order, s)).collect();
        current.sort_by(|a, b| a.freq.total_cmp(&b.freq));

        for pole in current.iter_mut() {
            let nearest = previous
                .iter()
                .min_by(|a, b| (a.freq - pole.freq).abs().total_cmp(&(b.freq - pole.freq).abs()));
            if let Some(prev) = nearest {
                if rel_diff(pole.freq, prev.freq) <= FREQ_TOL {
                    pole.stability = if rel_diff(pole.xi, prev.xi) <= DAMPING_TOL {
                        Stability::Stable
                    } else {
                        Stability::Frequency
                    };
                }
            }
        }
        out.extend(current.iter().copied());
        previous = current;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(freq: f64, xi: f64) -> Complex64 {
        let omega = 2.0 * PI * freq;
        Complex64::new(-xi * omega, omega * (1.0 - xi * xi).sqrt())
    }

    #[test]
    fn test_pole_from_s() {
        let pole = Pole::from_s(4, s(50.0, 0.02));
        assert!((pole.freq - 50.0).abs() < 1e-9);
        assert!((pole.xi - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_classification() {
        let per_order = vec![
            (2, vec![s(50.0, 0.02)]),
            (4, vec![s(50.2, 0.0205), s(80.0, 0.1)]),
            (6, vec![s(50.1, 0.03), s(80.5, 0.1), s(130.0, 0.01)]),
        ];
        let poles = stabilize(&per_order);
        let at = |order: usize, freq: f64| {
            poles
                .iter()
                .find(|p| p.order == order && (p.freq - freq).abs() < 0.01)
                .unwrap()
                .stability
        };
        assert_eq!(at(2, 50.0), Stability::Unstable);
        assert_eq!(at(4, 50.2), Stability::Stable);
        assert_eq!(at(4, 80.0), Stability::Unstable);
        assert_eq!(at(6, 50.1), Stability::Frequency);
        assert_eq!(at(6, 80.5), Stability::Stable);
        assert_eq!(at(6, 130.0), Stability::Unstable);
    }
}
