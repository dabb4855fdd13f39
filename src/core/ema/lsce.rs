// src/core/ema/lsce.rs
//
// Least-squares complex exponential: autoregressive fit of the impulse
// responses (Prony), all outputs sharing one characteristic polynomial.

use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;

use super::{root_to_pole, EmaError};
use crate::core::linalg::{lstsq, poly_roots};

/// Poles of an AR model of order `order` fitted to `irf` (one row per
/// output, sampled every `dt` seconds).
pub fn lsce(irf: ArrayView2<f64>, dt: f64, order: usize) -> Result<Vec<Complex64>, EmaError> {
    let (n_out, n_time) = irf.dim();
    if order == 0 || n_time <= order {
        return Err(EmaError::InvalidOrder(order));
    }
    let per_output = n_time - order;
    let rows = n_out * per_output;

    // Hankel rows: h[t] .. h[t + order - 1] predict -h[t + order]
    let hankel = Array2::from_shape_fn((rows, order), |(row, j)| {
        let (o, t) = (row / per_output, row % per_output);
        irf[[o, t + j]]
    });
    let rhs: Array1<f64> = (0..rows)
        .map(|row| {
            let (o, t) = (row / per_output, row % per_output);
            -irf[[o, t + order]]
        })
        .collect();

    let mut coeffs = lstsq(&hankel, &rhs)?.to_vec();
    coeffs.push(1.0);

    let roots = poly_roots(&coeffs)?;
    Ok(roots.into_iter().map(|z| root_to_pole(z, dt)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_single_mode() {
        let dt = 1.0 / 512.0;
        let s = Complex64::new(-4.0, 2.0 * PI * 30.0);
        let irf = Array2::from_shape_fn((1, 256), |(_, t)| {
            ((s * (t as f64 * dt)).exp() * Complex64::new(0.0, -1.0)).re
        });

        let poles = lsce(irf.view(), dt, 2).unwrap();
        assert_eq!(poles.len(), 2);
        let found = poles.iter().find(|p| p.im > 0.0).unwrap();
        assert!((found - s).norm() < 1e-6 * s.norm());
    }

    #[test]
    fn test_order_longer_than_record() {
        let irf = Array2::<f64>::zeros((1, 4));
        assert!(matches!(lsce(irf.view(), 0.1, 4), Err(EmaError::InvalidOrder(4))));
    }
}
