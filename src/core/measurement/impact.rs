// src/core/measurement/impact.rs
//
// Splitting roving-hammer records into impact blocks and screening each
// impact for overloads and double hits.

use ndarray::Array2;

use super::series::{Direction, TimeSeries};
use super::MeasurementError;
use crate::core::dsp::{samples_near_peak, FrfWindow, SpectrumProcessor};

/// Relative distance to the peak that still counts as "at the peak"
const OVERFLOW_TOLERANCE: f64 = 1e-3;

/// All channels of one category for a single impact
#[derive(Debug, Clone)]
pub struct ImpactBlock {
    /// Shape `(channels, window_len)`
    pub data: Array2<f64>,
    /// Channel names joined with `_`
    pub name: String,
    pub unit_str: String,
    pub fs: u32,
    pub quantity: String,
    pub direction: Direction,
}

impl ImpactBlock {
    #[cfg(test)]
    pub(crate) fn for_test(data: Array2<f64>) -> Self {
        Self {
            data,
            name: "test".to_string(),
            unit_str: String::new(),
            fs: 1,
            quantity: "acceleration".to_string(),
            direction: Direction::PlusZ,
        }
    }
}

/// Stack the channels and cut the record into `len / window_len` impacts.
///
/// Unit, sampling rate, quantity and direction are taken from the first
/// channel.
pub fn prepare_time_series(
    series: &[TimeSeries],
    window_len: usize,
) -> Result<Vec<ImpactBlock>, MeasurementError> {
    let first = series.first().ok_or(MeasurementError::NoSignals)?;
    if window_len == 0 {
        return Err(MeasurementError::InvalidWindow { window_len, samples: first.len() });
    }
    let samples = first.len();
    if samples == 0 || samples % window_len != 0 {
        return Err(MeasurementError::InvalidWindow { window_len, samples });
    }
    if let Some(bad) = series.iter().find(|s| s.len() != samples) {
        return Err(MeasurementError::LengthMismatch {
            name: bad.name.clone(),
            expected: samples,
            found: bad.len(),
        });
    }

    let name = series
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join("_");
    let impacts = samples / window_len;

    Ok((0..impacts)
        .map(|i| {
            let start = i * window_len;
            let data = Array2::from_shape_fn((series.len(), window_len), |(c, t)| {
                series[c].data[start + t]
            });
            ImpactBlock {
                data,
                name: name.clone(),
                unit_str: first.unit_str.clone(),
                fs: first.fs,
                quantity: first.quantity.clone(),
                direction: first.direction,
            }
        })
        .collect())
}

/// Outcome of screening one impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImpactCheck {
    pub exc_overflow: bool,
    pub resp_overflow: bool,
    pub double_impact: bool,
}

impl ImpactCheck {
    pub fn is_ok(&self) -> bool {
        !(self.exc_overflow || self.resp_overflow || self.double_impact)
    }
}

/// Screen one impact.
///
/// A channel overflows when more than `overflow_samples` samples sit at its
/// peak. A second hit puts notches into the force spectrum, so the impact
/// counts as double when the normalised force spectrum drops below
/// `double_impact_limit` anywhere in the lower half of the band.
pub fn check_impact(
    exc: &ImpactBlock,
    resp: &ImpactBlock,
    overflow_samples: usize,
    double_impact_limit: f64,
) -> ImpactCheck {
    let overflows = |block: &ImpactBlock| {
        block
            .data
            .rows()
            .into_iter()
            .any(|row| samples_near_peak(&row.to_vec(), OVERFLOW_TOLERANCE) > overflow_samples)
    };

    let mut double_impact = false;
    if let Some(force) = exc.data.rows().into_iter().next() {
        let mut processor = SpectrumProcessor::new(force.len(), FrfWindow::Rectangular);
        let spectrum = processor.normalized_magnitude(&force.to_vec());
        let half = spectrum.len() / 2;
        double_impact = spectrum
            .iter()
            .take(half.max(1))
            .any(|&m| m < double_impact_limit);
    }

    ImpactCheck {
        exc_overflow: overflows(exc),
        resp_overflow: overflows(resp),
        double_impact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, data: Vec<f64>) -> TimeSeries {
        TimeSeries::new(data, "N", 1024, "force", name, Direction::PlusZ)
    }

    #[test]
    fn test_prepare_splits_impacts() {
        let a = series("a", (0..8).map(f64::from).collect());
        let b = series("b", (10..18).map(f64::from).collect());
        let blocks = prepare_time_series(&[a, b], 4).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "a_b");
        assert_eq!(blocks[1].data.dim(), (2, 4));
        assert_eq!(blocks[1].data[[0, 0]], 4.0);
        assert_eq!(blocks[1].data[[1, 3]], 17.0);
    }

    #[test]
    fn test_prepare_rejects_partial_impact() {
        let a = series("a", vec![0.0; 10]);
        assert!(matches!(
            prepare_time_series(&[a], 4),
            Err(MeasurementError::InvalidWindow { window_len: 4, samples: 10 })
        ));
    }

    #[test]
    fn test_prepare_rejects_length_mismatch() {
        let a = series("a", vec![0.0; 8]);
        let b = series("b", vec![0.0; 12]);
        assert!(matches!(
            prepare_time_series(&[a, b], 4),
            Err(MeasurementError::LengthMismatch { .. })
        ));
    }

    fn single(data: Vec<f64>) -> ImpactBlock {
        let n = data.len();
        ImpactBlock::for_test(Array2::from_shape_vec((1, n), data).unwrap())
    }

    #[test]
    fn test_clean_impact_passes() {
        let mut force = vec![0.0; 1024];
        force[10] = 1.0;
        let resp: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.3).sin() * 0.99f64.powi(i)).collect();
        let check = check_impact(&single(force), &single(resp), 3, 1e-3);
        assert!(check.is_ok());
    }

    #[test]
    fn test_double_hit_detected() {
        let mut force = vec![0.0; 1024];
        force[10] = 1.0;
        force[42] = 1.0;
        let resp: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.3).sin() * 0.99f64.powi(i)).collect();
        let check = check_impact(&single(force), &single(resp), 3, 1e-3);
        assert!(check.double_impact);
        assert!(!check.is_ok());
    }

    #[test]
    fn test_clipped_response_detected() {
        let mut force = vec![0.0; 256];
        force[0] = 1.0;
        let mut resp: Vec<f64> = (0..256).map(|i| (i as f64 * 0.2).sin() * 0.5).collect();
        for v in resp.iter_mut().take(40).skip(20) {
            *v = 2.0;
        }
        let check = check_impact(&single(force), &single(resp), 3, 1e-3);
        assert!(check.resp_overflow);
        assert!(!check.exc_overflow);
    }
}
