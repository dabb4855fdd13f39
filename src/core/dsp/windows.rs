//! Window functions for impact testing

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window applied to every impact block before the FFT
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrfWindow {
    Rectangular,
    Hann,
    /// Exponential decay reaching `end_value` at the last sample
    Exponential { end_value: f64 },
    /// Unity over the leading `fraction` of the block, zero afterwards
    Force { fraction: f64 },
}

impl Default for FrfWindow {
    fn default() -> Self {
        Self::Rectangular
    }
}

impl FrfWindow {
    pub fn generate(&self, size: usize) -> Vec<f64> {
        if size < 2 {
            return vec![1.0; size];
        }
        let last = (size - 1) as f64;
        match *self {
            FrfWindow::Rectangular => vec![1.0; size],
            FrfWindow::Hann => (0..size)
                .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / last).cos()))
                .collect(),
            FrfWindow::Exponential { end_value } => {
                let end = end_value.clamp(1e-12, 1.0);
                let tau = -last / end.ln().min(-1e-12);
                (0..size).map(|i| (-(i as f64) / tau).exp()).collect()
            }
            FrfWindow::Force { fraction } => {
                let cut = (fraction.clamp(0.0, 1.0) * size as f64).round() as usize;
                (0..size).map(|i| if i < cut { 1.0 } else { 0.0 }).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = FrfWindow::Hann.generate(5);
        assert!(window[0].abs() < 1e-12);
        assert!((window[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_end_value() {
        let window = FrfWindow::Exponential { end_value: 0.01 }.generate(101);
        assert!((window[0] - 1.0).abs() < 1e-12);
        assert!((window[100] - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_force_window() {
        let window = FrfWindow::Force { fraction: 0.25 }.generate(8);
        assert_eq!(window, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
