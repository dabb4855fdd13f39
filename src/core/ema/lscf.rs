// src/core/ema/lscf.rs
//
// Least-squares complex frequency domain estimator (common denominator
// model in the z-domain).

use ndarray::{s, Array1, Array2, ArrayView2};
use num_complex::Complex64;
use std::f64::consts::PI;

use super::{root_to_pole, EmaError};
use crate::core::linalg::{poly_roots, solve, Lu};

/// Poles of a common-denominator model of order `order`.
///
/// `frf` holds one row per output sampled at `freq` (Hz). `dt` is the
/// sampling time of the discrete basis `z = exp(iω dt)`, normally
/// `1 / (2 f_max)`. All roots are mapped back with `s = ln z / dt`;
/// filtering to the physical half plane is left to the caller.
pub fn lscf(
    frf: ArrayView2<Complex64>,
    freq: &[f64],
    dt: f64,
    order: usize,
) -> Result<Vec<Complex64>, EmaError> {
    let (n_out, n_freq) = frf.dim();
    if order == 0 {
        return Err(EmaError::InvalidOrder(order));
    }
    if n_freq != freq.len() || n_freq == 0 {
        return Err(EmaError::InvalidBand {
            lower: freq.first().copied().unwrap_or(0.0),
            upper: freq.last().copied().unwrap_or(0.0),
        });
    }
    let cols = order + 1;

    // Basis X[k, j] = z_k^j
    let basis = Array2::from_shape_fn((n_freq, cols), |(k, j)| {
        Complex64::from_polar(1.0, 2.0 * PI * freq[k] * dt * j as f64)
    });
    let basis_h = basis.t().mapv(|c| c.conj());
    let r = basis_h.dot(&basis).mapv(|c| c.re);
    let r_lu = Lu::factor(r.view())?;

    let mut m = Array2::<f64>::zeros((cols, cols));
    for o in 0..n_out {
        let h = frf.row(o);
        let y = Array2::from_shape_fn((n_freq, cols), |(k, j)| -h[k] * basis[[k, j]]);
        let s_o = basis_h.dot(&y).mapv(|c| c.re);
        let t_o = y.t().mapv(|c| c.conj()).dot(&y).mapv(|c| c.re);
        let r_inv_s = r_lu.solve_matrix(&s_o)?;
        m = m + t_o - s_o.t().dot(&r_inv_s);
    }

    // Highest coefficient fixed to 1
    let lhs = m.slice(s![..order, ..order]).to_owned();
    let rhs: Array1<f64> = m.slice(s![..order, order]).mapv(|v| -v);
    let mut alpha = solve(lhs.view(), &rhs)?.to_vec();
    alpha.push(1.0);

    let roots = poly_roots(&alpha)?;
    Ok(roots.into_iter().map(|z| root_to_pole(z, dt)).collect())
}
