//! Small statistics helpers for time blocks

/// Largest absolute sample value
pub fn max_abs(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()))
}

/// Number of samples within `rel_tol` of the absolute peak.
///
/// A clipped channel plateaus at its maximum, so more than a handful of
/// samples sit right at the peak.
pub fn samples_near_peak(samples: &[f64], rel_tol: f64) -> usize {
    let peak = max_abs(samples);
    if peak <= 0.0 {
        return 0;
    }
    let limit = peak * (1.0 - rel_tol);
    samples.iter().filter(|s| s.abs() >= limit).count()
}

/// Arithmetic mean, 0 for empty input
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_near_peak() {
        let clipped = [0.1, 1.0, 1.0, -1.0, 0.999_5, 0.3];
        assert_eq!(samples_near_peak(&clipped, 1e-3), 4);
        assert_eq!(samples_near_peak(&[0.0; 4], 1e-3), 0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);
    }
}
