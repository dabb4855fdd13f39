// src/core/measurement/frf.rs
//
// Frequency response function estimation from averaged impact blocks.

use log::{debug, warn};
use ndarray::{Array2, Array3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use super::impact::ImpactBlock;
use super::MeasurementError;
use crate::core::dsp::{inverse_one_sided, rfft_freqs, FrfWindow, SpectrumProcessor};
use crate::core::linalg::ComplexLu;

/// Estimator used for the FRF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrfKind {
    /// Noise on the response: `S_xf S_ff⁻¹` over the excitation cross spectra
    H1,
    /// Noise on the excitation: `S_xx / S_xf`, per excitation
    H2,
}

/// Physical form of an FRF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrfForm {
    /// displacement / force
    Receptance,
    /// velocity / force
    Mobility,
    /// acceleration / force
    Accelerance,
}

impl FrfForm {
    /// Power of `iω` relative to receptance
    pub fn order(&self) -> i32 {
        match self {
            FrfForm::Receptance => 0,
            FrfForm::Mobility => 1,
            FrfForm::Accelerance => 2,
        }
    }

    /// Form implied by a SEP-005 response quantity
    pub fn from_quantity(quantity: &str) -> Self {
        match quantity.to_ascii_lowercase().as_str() {
            "displacement" | "d" => FrfForm::Receptance,
            "velocity" | "v" => FrfForm::Mobility,
            "acceleration" | "a" => FrfForm::Accelerance,
            other => {
                warn!("Unknown response quantity '{}', assuming acceleration", other);
                FrfForm::Accelerance
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrfForm::Receptance => "receptance",
            FrfForm::Mobility => "mobility",
            FrfForm::Accelerance => "accelerance",
        }
    }

    /// Factor `(iω)^(to - from)` converting a value at angular frequency `omega`
    pub fn conversion(from: FrfForm, to: FrfForm, omega: f64) -> Complex64 {
        let power = to.order() - from.order();
        let iw = Complex64::new(0.0, omega);
        if power >= 0 {
            iw.powi(power)
        } else if omega == 0.0 {
            Complex64::new(0.0, 0.0)
        } else {
            iw.powi(power)
        }
    }
}

impl fmt::Display for FrfForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FrfForm {
    type Err = MeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "receptance" => Ok(FrfForm::Receptance),
            "mobility" => Ok(FrfForm::Mobility),
            "accelerance" => Ok(FrfForm::Accelerance),
            other => Err(MeasurementError::UnknownForm(other.to_string())),
        }
    }
}

/// Averaged spectra and the FRFs derived from them
#[derive(Debug, Clone)]
pub struct Frf {
    /// H1 estimate, shape `(n_resp, n_exc, n_freq)`
    h1: Array3<Complex64>,
    /// H2 estimate, shape `(n_resp, n_exc, n_freq)`
    h2: Array3<Complex64>,
    /// Coherence against the first excitation, shape `(n_resp, n_freq)`
    coherence: Array2<f64>,
    f_axis: Vec<f64>,
    form: FrfForm,
    averages: usize,
}

impl Frf {
    /// Estimate FRFs from matching excitation and response impact blocks
    pub fn estimate(
        exc: &[ImpactBlock],
        resp: &[ImpactBlock],
        sampling_freq: f64,
        window: FrfWindow,
        form: FrfForm,
    ) -> Result<Self, MeasurementError> {
        if exc.is_empty() || exc.len() != resp.len() {
            return Err(MeasurementError::Shape(format!(
                "{} excitation blocks vs {} response blocks",
                exc.len(),
                resp.len()
            )));
        }
        let (n_exc, fft_len) = exc[0].data.dim();
        let n_resp = resp[0].data.nrows();
        let n_freq = fft_len / 2 + 1;

        let mut processor = SpectrumProcessor::new(fft_len, window);
        let zero = Complex64::new(0.0, 0.0);
        // excitation cross spectra `S_ff[i, j] = Σ F_i F_j*`
        let mut s_ff = Array3::<Complex64>::from_elem((n_exc, n_exc, n_freq), zero);
        let mut s_xx = Array2::<f64>::zeros((n_resp, n_freq));
        let mut s_xf = Array3::<Complex64>::from_elem((n_resp, n_exc, n_freq), zero);

        for (e_block, r_block) in exc.iter().zip(resp.iter()) {
            if e_block.data.dim() != (n_exc, fft_len) || r_block.data.dim() != (n_resp, fft_len) {
                return Err(MeasurementError::Shape(
                    "impact blocks differ in shape".to_string(),
                ));
            }
            let x: Vec<Vec<Complex64>> = e_block
                .data
                .rows()
                .into_iter()
                .map(|row| processor.complex_spectrum(&row.to_vec()))
                .collect();
            let y: Vec<Vec<Complex64>> = r_block
                .data
                .rows()
                .into_iter()
                .map(|row| processor.complex_spectrum(&row.to_vec()))
                .collect();

            for (i, xi) in x.iter().enumerate() {
                for (j, xj) in x.iter().enumerate() {
                    for k in 0..n_freq {
                        s_ff[[i, j, k]] += xi[k] * xj[k].conj();
                    }
                }
            }
            for (r, yr) in y.iter().enumerate() {
                for k in 0..n_freq {
                    s_xx[[r, k]] += yr[k].norm_sqr();
                    for (e, xe) in x.iter().enumerate() {
                        s_xf[[r, e, k]] += yr[k] * xe[k].conj();
                    }
                }
            }
        }

        let h1 = if n_exc == 1 {
            Array3::from_shape_fn((n_resp, n_exc, n_freq), |(r, e, k)| {
                safe_div(s_xf[[r, e, k]], s_ff[[e, e, k]])
            })
        } else {
            solve_h1(&s_ff, &s_xf)
        };
        let h2 = Array3::from_shape_fn((n_resp, n_exc, n_freq), |(r, e, k)| {
            safe_div(Complex64::new(s_xx[[r, k]], 0.0), s_xf[[r, e, k]].conj())
        });
        let coherence = Array2::from_shape_fn((n_resp, n_freq), |(r, k)| {
            let denom = s_ff[[0, 0, k]].re * s_xx[[r, k]];
            if denom > 0.0 {
                (s_xf[[r, 0, k]].norm_sqr() / denom).min(1.0)
            } else {
                0.0
            }
        });

        debug!(
            "Estimated FRF: {} resp x {} exc, {} bins, {} averages",
            n_resp,
            n_exc,
            n_freq,
            exc.len()
        );

        Ok(Self {
            h1,
            h2,
            coherence,
            f_axis: rfft_freqs(fft_len, sampling_freq),
            form,
            averages: exc.len(),
        })
    }

    /// FRF of the requested kind converted to `form`
    pub fn get(&self, kind: FrfKind, form: FrfForm) -> Array3<Complex64> {
        let source = match kind {
            FrfKind::H1 => &self.h1,
            FrfKind::H2 => &self.h2,
        };
        if form == self.form {
            return source.clone();
        }
        let factors: Vec<Complex64> = self
            .f_axis
            .iter()
            .map(|f| FrfForm::conversion(self.form, form, 2.0 * PI * f))
            .collect();
        Array3::from_shape_fn(source.dim(), |(r, e, k)| source[[r, e, k]] * factors[k])
    }

    /// Impulse response of every FRF row, shape `(n_resp, n_exc, fft_len)`
    pub fn impulse_response(&self, kind: FrfKind, form: FrfForm) -> Array3<f64> {
        let frf = self.get(kind, form);
        let (n_resp, n_exc, n_freq) = frf.dim();
        let n_time = if n_freq < 2 { n_freq } else { 2 * (n_freq - 1) };
        let mut out = Array3::zeros((n_resp, n_exc, n_time));
        for r in 0..n_resp {
            for e in 0..n_exc {
                let row: Vec<Complex64> = (0..n_freq).map(|k| frf[[r, e, k]]).collect();
                for (t, v) in inverse_one_sided(&row).into_iter().enumerate() {
                    out[[r, e, t]] = v;
                }
            }
        }
        out
    }

    pub fn coherence(&self) -> &Array2<f64> {
        &self.coherence
    }

    pub fn f_axis(&self) -> &[f64] {
        &self.f_axis
    }

    /// Form of the measured response
    pub fn form(&self) -> FrfForm {
        self.form
    }

    pub fn averages(&self) -> usize {
        self.averages
    }

    pub fn n_resp(&self) -> usize {
        self.h1.dim().0
    }

    pub fn n_exc(&self) -> usize {
        self.h1.dim().1
    }
}

/// `H S_ff = S_xf` per frequency bin; singular bins stay zero
fn solve_h1(s_ff: &Array3<Complex64>, s_xf: &Array3<Complex64>) -> Array3<Complex64> {
    let (n_resp, n_exc, n_freq) = s_xf.dim();
    let mut h1 = Array3::from_elem((n_resp, n_exc, n_freq), Complex64::new(0.0, 0.0));
    let mut singular = 0;
    for k in 0..n_freq {
        // transposed system: S_ffᵀ hᵀ = S_xfᵀ for every response
        let g = Array2::from_shape_fn((n_exc, n_exc), |(i, j)| s_ff[[j, i, k]]);
        let lu = match ComplexLu::factor(&g) {
            Ok(lu) => lu,
            Err(_) => {
                singular += 1;
                continue;
            }
        };
        for r in 0..n_resp {
            let rhs: Vec<Complex64> = (0..n_exc).map(|e| s_xf[[r, e, k]]).collect();
            if let Ok(h) = lu.solve(&rhs) {
                for (e, v) in h.into_iter().enumerate() {
                    h1[[r, e, k]] = v;
                }
            }
        }
    }
    if singular > 0 {
        warn!(
            "Excitation cross spectra singular at {} of {} bins; average more impacts",
            singular, n_freq
        );
    }
    h1
}

fn safe_div(num: Complex64, den: Complex64) -> Complex64 {
    if den.norm_sqr() > 0.0 {
        num / den
    } else {
        Complex64::new(0.0, 0.0)
    }
}
