// src/core/ema/lsfd.rs
//
// Least-squares frequency domain fit of modal constants for known poles.

use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;
use std::f64::consts::PI;

use super::EmaError;
use crate::core::linalg::{lstsq, LinalgError};
use crate::core::measurement::FrfForm;

/// Result of an LSFD fit
#[derive(Debug, Clone)]
pub struct LsfdFit {
    /// Reconstructed FRFs, shape `(n_out, n_freq)`
    pub h: Array2<Complex64>,
    /// Modal constants, shape `(n_out, n_modes)`
    pub a: Array2<Complex64>,
    /// Lower residual per output
    pub lower_residual: Vec<f64>,
    /// Upper residual per output
    pub upper_residual: Vec<f64>,
}

/// Complex basis functions at one angular frequency, already in `form`.
///
/// Per mode: `(Re A, Im A)` of `A/(iω - s) + conj(A)/(iω - conj(s))`,
/// then the lower (`1/(iω)²`) and upper (constant) residuals.
fn basis_row(omega: f64, poles: &[Complex64], form: FrfForm) -> Vec<Complex64> {
    let iw = Complex64::new(0.0, omega);
    let i = Complex64::new(0.0, 1.0);
    let to_form = FrfForm::conversion(FrfForm::Receptance, form, omega);

    let mut row = Vec::with_capacity(2 * poles.len() + 2);
    for &s in poles {
        let a = (iw - s).inv();
        let b = (iw - s.conj()).inv();
        row.push((a + b) * to_form);
        row.push((i * a - i * b) * to_form);
    }
    let lower = if omega == 0.0 {
        Complex64::new(0.0, 0.0)
    } else {
        (iw * iw).inv() * to_form
    };
    row.push(lower);
    row.push(to_form);
    row
}

/// Fit modal constants for `poles` to every row of `frf` sampled at `freq`
/// (Hz). `form` is the form the FRFs were measured in.
pub fn lsfd(
    frf: ArrayView2<Complex64>,
    freq: &[f64],
    poles: &[Complex64],
    form: FrfForm,
) -> Result<LsfdFit, EmaError> {
    let (n_out, n_freq) = frf.dim();
    if n_freq != freq.len() {
        return Err(LinalgError::Dimension(format!(
            "{} FRF bins but {} frequencies",
            n_freq,
            freq.len()
        ))
        .into());
    }
    let n_modes = poles.len();
    let n_unknowns = 2 * n_modes + 2;

    let basis: Vec<Vec<Complex64>> = freq
        .iter()
        .map(|f| basis_row(2.0 * PI * f, poles, form))
        .collect();
    // Real and imaginary parts stacked
    let system = Array2::from_shape_fn((2 * n_freq, n_unknowns), |(row, col)| {
        let c = basis[row % n_freq][col];
        if row < n_freq { c.re } else { c.im }
    });

    let mut h = Array2::zeros((n_out, n_freq));
    let mut a = Array2::zeros((n_out, n_modes));
    let mut lower_residual = Vec::with_capacity(n_out);
    let mut upper_residual = Vec::with_capacity(n_out);

    for o in 0..n_out {
        let target: Array1<f64> = (0..2 * n_freq)
            .map(|row| {
                let c = frf[[o, row % n_freq]];
                if row < n_freq { c.re } else { c.im }
            })
            .collect();
        let x = lstsq(&system, &target)?;

        for r in 0..n_modes {
            a[[o, r]] = Complex64::new(x[2 * r], x[2 * r + 1]);
        }
        lower_residual.push(x[2 * n_modes]);
        upper_residual.push(x[2 * n_modes + 1]);

        for k in 0..n_freq {
            h[[o, k]] = basis[k]
                .iter()
                .zip(x.iter())
                .map(|(b, &coef)| b * coef)
                .sum();
        }
    }

    Ok(LsfdFit {
        h,
        a,
        lower_residual,
        upper_residual,
    })
}
