// src/core/ema/model.rs
//
// Modal model of a set of SIMO FRFs: pole estimation over model orders,
// pole selection and modal constants.

use log::{debug, info, warn};
use ndarray::{s, Array2, ArrayView2};
use num_complex::Complex64;
use std::ops::Range;

use super::stabilization::{self, Pole, Stability};
use super::{lsce, lscf, lsfd, EmaError, Solver};
use crate::core::dsp::inverse_one_sided;
use crate::core::measurement::FrfForm;

/// Default half width (Hz) of the pole search window around an estimate
pub const F_WINDOW: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct ModalModel {
    /// `(n_outputs, n_freq)`
    frf: Array2<Complex64>,
    f_axis: Vec<f64>,
    lower: f64,
    upper: f64,
    pol_order: usize,
    frf_form: FrfForm,
    driving_point: usize,
    band: Range<usize>,

    poles: Vec<Pole>,
    selected: Vec<Pole>,
    h: Option<Array2<Complex64>>,
    a: Option<Array2<Complex64>>,
    phi: Option<Array2<Complex64>>,
}

impl ModalModel {
    pub fn new(
        frf: Array2<Complex64>,
        f_axis: Vec<f64>,
        lower: f64,
        upper: f64,
        pol_order: usize,
        frf_form: FrfForm,
        driving_point: usize,
    ) -> Result<Self, EmaError> {
        if pol_order < 2 || pol_order % 2 != 0 {
            return Err(EmaError::InvalidOrder(pol_order));
        }
        if frf.ncols() != f_axis.len() {
            return Err(EmaError::Linalg(crate::core::linalg::LinalgError::Dimension(format!(
                "{} FRF bins but {} frequencies",
                frf.ncols(),
                f_axis.len()
            ))));
        }
        if frf.nrows() == 0 || driving_point >= frf.nrows() {
            return Err(EmaError::NoMeasurements);
        }

        let start = f_axis.iter().position(|&f| f >= lower);
        let end = f_axis.iter().rposition(|&f| f <= upper);
        let band = match (start, end) {
            (Some(s), Some(e)) if lower < upper && s <= e => s..e + 1,
            _ => return Err(EmaError::InvalidBand { lower, upper }),
        };
        debug!(
            "Modal model: {} outputs, band {:.1}..{:.1} Hz ({} bins), order {}",
            frf.nrows(),
            lower,
            upper,
            band.len(),
            pol_order
        );

        Ok(Self {
            frf,
            f_axis,
            lower,
            upper,
            pol_order,
            frf_form,
            driving_point,
            band,
            poles: Vec::new(),
            selected: Vec::new(),
            h: None,
            a: None,
            phi: None,
        })
    }

    fn band_frf(&self) -> ArrayView2<'_, Complex64> {
        self.frf.slice(s![.., self.band.clone()])
    }

    pub fn band_freqs(&self) -> &[f64] {
        &self.f_axis[self.band.clone()]
    }

    /// Impulse responses of the full FRFs (missing leading bins zeroed),
    /// first half only, plus their sampling time
    fn impulse_responses(&self) -> (Array2<f64>, f64) {
        let df = match self.f_axis.len() {
            0 => 1.0,
            1 => self.f_axis[0].max(f64::MIN_POSITIVE),
            _ => self.f_axis[1] - self.f_axis[0],
        };
        let skipped = (self.f_axis.first().copied().unwrap_or(0.0) / df).round() as usize;
        let rows: Vec<Vec<f64>> = self
            .frf
            .rows()
            .into_iter()
            .map(|row| {
                let mut spectrum = vec![Complex64::new(0.0, 0.0); skipped];
                spectrum.extend(row.iter().copied());
                let mut irf = inverse_one_sided(&spectrum);
                irf.truncate(irf.len() / 2);
                irf
            })
            .collect();
        let n_time = rows.first().map_or(0, Vec::len);
        let irf = Array2::from_shape_fn((rows.len(), n_time), |(o, t)| rows[o][t]);
        (irf, self.sampling_time())
    }

    /// `1 / (2 f_max)`
    fn sampling_time(&self) -> f64 {
        let f_max = self.f_axis.last().copied().unwrap_or(1.0);
        1.0 / (2.0 * f_max)
    }

    fn is_physical(&self, s: &Complex64) -> bool {
        let freq = s.norm() / (2.0 * std::f64::consts::PI);
        s.im > 0.0 && s.re < 0.0 && freq >= self.lower && freq <= self.upper
    }

    /// Estimate poles for orders `2, 4, .., pol_order` and stabilise them
    pub fn compute_poles(&mut self, solver: Solver) -> Result<&[Pole], EmaError> {
        let orders: Vec<usize> = (2..=self.pol_order).step_by(2).collect();
        let dt = self.sampling_time();
        let irf = match solver {
            Solver::Lsce => Some(self.impulse_responses()),
            Solver::Lscf => None,
        };

        let mut per_order = Vec::with_capacity(orders.len());
        let mut last_err = None;
        for &order in &orders {
            let roots = match &irf {
                Some((irf, irf_dt)) => lsce(irf.view(), *irf_dt, order),
                None => lscf(self.band_frf(), self.band_freqs(), dt, order),
            };
            match roots {
                Ok(roots) => {
                    let physical: Vec<Complex64> =
                        roots.into_iter().filter(|s| self.is_physical(s)).collect();
                    per_order.push((order, physical));
                }
                Err(e) => {
                    warn!("{} order {} failed: {}", solver, order, e);
                    last_err = Some(e);
                }
            }
        }
        if per_order.is_empty() {
            return Err(last_err.unwrap_or(EmaError::InvalidOrder(self.pol_order)));
        }

        self.poles = stabilization::stabilize(&per_order);
        self.selected.clear();
        info!(
            "{}: {} poles over {} orders ({} stable)",
            solver,
            self.poles.len(),
            per_order.len(),
            self.poles.iter().filter(|p| p.stability == Stability::Stable).count()
        );
        Ok(&self.poles)
    }

    /// For each estimate pick the pole within `f_window` Hz, preferring
    /// stable poles, then higher orders, then the closest frequency.
    /// A pole picked by an earlier estimate is kept only once.
    pub fn select_closest_poles(&mut self, estimates: &[f64], f_window: f64) -> Result<(), EmaError> {
        if self.poles.is_empty() {
            return Err(EmaError::NotComputed("Pole estimation"));
        }
        let mut selected = Vec::with_capacity(estimates.len());
        for &estimate in estimates {
            let best = self
                .poles
                .iter()
                .filter(|p| (p.freq - estimate).abs() <= f_window)
                .max_by(|a, b| {
                    a.stability
                        .cmp(&b.stability)
                        .then(a.order.cmp(&b.order))
                        .then((b.freq - estimate).abs().total_cmp(&(a.freq - estimate).abs()))
                })
                .ok_or(EmaError::NoPoleNear(estimate))?;
            if selected.contains(best) {
                warn!(
                    "Estimate {:.2} Hz selects the {:.3} Hz pole again, skipping",
                    estimate, best.freq
                );
                continue;
            }
            debug!(
                "Estimate {:.2} Hz -> {:.3} Hz (order {}, {:?})",
                estimate, best.freq, best.order, best.stability
            );
            selected.push(*best);
        }
        self.set_selected(selected);
        Ok(())
    }

    /// All stable poles of the highest order that has any, deduplicated
    pub fn select_stable_poles(&mut self) -> Result<(), EmaError> {
        let order = self
            .poles
            .iter()
            .filter(|p| p.stability == Stability::Stable)
            .map(|p| p.order)
            .max()
            .ok_or(EmaError::NoStablePoles)?;

        let mut candidates: Vec<Pole> = self
            .poles
            .iter()
            .filter(|p| p.order == order && p.stability == Stability::Stable)
            .copied()
            .collect();
        candidates.sort_by(|a, b| a.freq.total_cmp(&b.freq));

        let mut selected: Vec<Pole> = Vec::with_capacity(candidates.len());
        for pole in candidates {
            let duplicate = selected
                .last()
                .map_or(false, |last| (pole.freq - last.freq).abs() <= stabilization::FREQ_TOL * last.freq);
            if !duplicate {
                selected.push(pole);
            }
        }
        self.set_selected(selected);
        Ok(())
    }

    fn set_selected(&mut self, selected: Vec<Pole>) {
        self.selected = selected;
        self.h = None;
        self.a = None;
        self.phi = None;
    }

    /// Modal constants of the selected poles by LSFD.
    ///
    /// Returns the reconstructed FRFs over the band and the modal constants;
    /// mode shapes are scaled to the driving point.
    pub fn get_constants(&mut self) -> Result<(Array2<Complex64>, Array2<Complex64>), EmaError> {
        if self.selected.is_empty() {
            return Err(EmaError::NotComputed("Pole selection"));
        }
        let poles: Vec<Complex64> = self.selected.iter().map(|p| p.s).collect();
        let fit = lsfd(self.band_frf(), self.band_freqs(), &poles, self.frf_form)?;

        let dp = self.driving_point;
        let phi = Array2::from_shape_fn(fit.a.dim(), |(o, r)| {
            let scale = fit.a[[dp, r]].sqrt();
            if scale.norm() > 0.0 {
                fit.a[[o, r]] / scale
            } else {
                Complex64::new(0.0, 0.0)
            }
        });

        self.h = Some(fit.h.clone());
        self.a = Some(fit.a.clone());
        self.phi = Some(phi);
        Ok((fit.h, fit.a))
    }

    pub fn poles(&self) -> &[Pole] {
        &self.poles
    }

    pub fn selected(&self) -> &[Pole] {
        &self.selected
    }

    pub fn nat_freq(&self) -> Vec<f64> {
        self.selected.iter().map(|p| p.freq).collect()
    }

    pub fn nat_xi(&self) -> Vec<f64> {
        self.selected.iter().map(|p| p.xi).collect()
    }

    pub fn phi(&self) -> Option<&Array2<Complex64>> {
        self.phi.as_ref()
    }

    /// Reconstructed FRFs over the band
    pub fn h(&self) -> Option<&Array2<Complex64>> {
        self.h.as_ref()
    }

    /// Modal constants
    pub fn a(&self) -> Option<&Array2<Complex64>> {
        self.a.as_ref()
    }

    pub fn driving_point(&self) -> usize {
        self.driving_point
    }

    pub fn frf_form(&self) -> FrfForm {
        self.frf_form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const FS: f64 = 1024.0;

    fn pole(freq: f64, xi: f64) -> Complex64 {
        let omega = 2.0 * PI * freq;
        Complex64::new(-xi * omega, omega * (1.0 - xi * xi).sqrt())
    }

    /// Two outputs, two modes, spectra of sampled exponentials (DC dropped)
    fn model(pol_order: usize) -> ModalModel {
        let modes = [(pole(50.0, 0.02), [1.0, 1.0]), (pole(120.0, 0.01), [0.5, -0.5])];
        let f_axis: Vec<f64> = (1..=512).map(f64::from).collect();
        let frf = Array2::from_shape_fn((2, f_axis.len()), |(o, k)| {
            let z = Complex64::from_polar(1.0, 2.0 * PI * f_axis[k] / FS);
            let noise = 1e-4 * ((k * 7 + o * 3) as f64).sin();
            modes
                .iter()
                .map(|&(s, shape)| {
                    let p = (s / FS).exp();
                    let c = Complex64::new(0.0, -shape[o]);
                    c * z / (z - p) + c.conj() * z / (z - p.conj())
                })
                .sum::<Complex64>()
                + noise
        });
        ModalModel::new(frf, f_axis, 20.0, 200.0, pol_order, FrfForm::Accelerance, 0).unwrap()
    }

    #[test]
    fn test_invalid_settings() {
        let frf = Array2::<Complex64>::zeros((1, 10));
        let f_axis: Vec<f64> = (1..=10).map(f64::from).collect();
        assert!(matches!(
            ModalModel::new(frf.clone(), f_axis.clone(), 1.0, 5.0, 3, FrfForm::Accelerance, 0),
            Err(EmaError::InvalidOrder(3))
        ));
        assert!(matches!(
            ModalModel::new(frf, f_axis, 50.0, 80.0, 4, FrfForm::Accelerance, 0),
            Err(EmaError::InvalidBand { .. })
        ));
    }

    #[test]
    fn test_lscf_closest_poles() {
        let mut model = model(10);
        model.compute_poles(Solver::Lscf).unwrap();
        assert!(model.poles().iter().all(|p| p.freq >= 20.0 && p.freq <= 200.0));

        model.select_closest_poles(&[50.0, 120.0], F_WINDOW).unwrap();
        let freqs = model.nat_freq();
        assert!((freqs[0] - 50.0).abs() < 0.5);
        assert!((freqs[1] - 120.0).abs() < 0.5);
        let xi = model.nat_xi();
        assert!((xi[0] - 0.02).abs() < 0.005);

        let (h, a) = model.get_constants().unwrap();
        assert_eq!(h.dim(), (2, 181));
        assert_eq!(a.dim(), (2, 2));
        let phi = model.phi().unwrap();
        // first mode in phase, second out of phase between the outputs
        assert!((phi[[0, 0]] / phi[[1, 0]]).re > 0.0);
        assert!((phi[[0, 1]] / phi[[1, 1]]).re < 0.0);
    }

    #[test]
    fn test_nearby_estimates_share_a_pole() {
        let mut model = model(10);
        model.compute_poles(Solver::Lscf).unwrap();
        model.select_closest_poles(&[50.0, 50.2, 120.0], F_WINDOW).unwrap();
        assert_eq!(model.selected().len(), 2);

        let (_, a) = model.get_constants().unwrap();
        assert_eq!(a.dim(), (2, 2));
    }

    #[test]
    fn test_stable_selection() {
        let mut model = model(12);
        model.compute_poles(Solver::Lscf).unwrap();
        model.select_stable_poles().unwrap();
        let freqs = model.nat_freq();
        assert!(freqs.iter().any(|f| (f - 50.0).abs() < 0.5));
        assert!(freqs.iter().any(|f| (f - 120.0).abs() < 0.5));
        assert!(freqs.windows(2).all(|w| w[1] > w[0] * 1.01));
    }

    #[test]
    fn test_lsce_finds_modes() {
        let mut model = model(8);
        model.compute_poles(Solver::Lsce).unwrap();
        model.select_closest_poles(&[50.0, 120.0], F_WINDOW).unwrap();
        let freqs = model.nat_freq();
        assert!((freqs[0] - 50.0).abs() < 1.0);
        assert!((freqs[1] - 120.0).abs() < 1.0);
    }

    #[test]
    fn test_no_pole_near_estimate() {
        let mut model = model(4);
        model.compute_poles(Solver::Lscf).unwrap();
        assert!(matches!(
            model.select_closest_poles(&[50.0, 250.0], F_WINDOW),
            Err(EmaError::NoPoleNear(f)) if f == 250.0
        ));
    }

    #[test]
    fn test_constants_need_selection() {
        let mut model = model(4);
        assert!(matches!(model.get_constants(), Err(EmaError::NotComputed(_))));
    }
}
