// src/core/ema/session.rs
//
// EMA session: a set of roving-hammer measurements analysed together.

use log::{debug, info};
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::model::{ModalModel, F_WINDOW};
use super::stabilization::Pole;
use super::{EmaError, Solver};
use crate::config::AnalysisSettings;
use crate::core::measurement::{Direction, FrfForm, FrfKind, Measurement, MeasurementRecord};
use crate::store;

/// Modal parameters after pole selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalResults {
    pub nat_freq: Vec<f64>,
    pub nat_xi: Vec<f64>,
    /// Reconstructed FRFs `(outputs, band bins)`
    pub h: Array2<Complex64>,
    /// Modal constants `(outputs, modes)`
    pub a: Array2<Complex64>,
    /// Mode shapes `(outputs, modes)`
    pub phi: Array2<Complex64>,
}

/// Where a row of the stacked FRF matrix comes from
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRow {
    pub measurement: usize,
    /// Index of the response inside its measurement
    pub channel: usize,
    pub name: String,
    pub direction: Direction,
    pub reference: String,
    pub reference_direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmaRecord {
    lower: f64,
    upper: f64,
    pol_order: usize,
    solver: Solver,
    freq_estimates: Vec<f64>,
    results: Option<ModalResults>,
    measurements: Vec<MeasurementRecord>,
}

#[derive(Debug, Clone)]
pub struct Ema {
    lower: f64,
    upper: f64,
    pol_order: usize,
    solver: Solver,
    freq_estimates: Vec<f64>,
    measurements: Vec<Measurement>,

    frf_matrix: Option<Array2<Complex64>>,
    f_axis: Option<Vec<f64>>,
    coherence: Option<Array2<f64>>,
    driving_point: usize,
    model: Option<ModalModel>,
    results: Option<ModalResults>,
}

impl Ema {
    pub fn new(lower: f64, upper: f64, pol_order: usize, solver: Solver, freq_estimates: Vec<f64>) -> Self {
        Self {
            lower,
            upper,
            pol_order,
            solver,
            freq_estimates,
            measurements: Vec::new(),
            frf_matrix: None,
            f_axis: None,
            coherence: None,
            driving_point: 0,
            model: None,
            results: None,
        }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(
            settings.lower,
            settings.upper,
            settings.pol_order,
            settings.solver,
            settings.freq_estimates.clone(),
        )
    }

    pub fn add_measurement(&mut self, measurement: Measurement) {
        debug!("Adding measurement '{}'", measurement.name());
        self.measurements.push(measurement);
        self.invalidate();
    }

    /// Remove the measurement called `name`; returns whether one was removed
    pub fn remove_measurement(&mut self, name: &str) -> bool {
        let before = self.measurements.len();
        self.measurements.retain(|m| m.name() != name);
        let removed = self.measurements.len() != before;
        if removed {
            self.invalidate();
        }
        removed
    }

    fn invalidate(&mut self) {
        self.frf_matrix = None;
        self.f_axis = None;
        self.coherence = None;
        self.driving_point = 0;
        self.model = None;
        self.results = None;
    }

    /// Drop the model built by `calc` along with its poles and results
    fn reset_model(&mut self) {
        self.model = None;
        self.results = None;
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn pol_order(&self) -> usize {
        self.pol_order
    }

    pub fn solver(&self) -> Solver {
        self.solver
    }

    pub fn freq_estimates(&self) -> &[f64] {
        &self.freq_estimates
    }

    /// New analysis band; `calc` has to run again
    pub fn set_band(&mut self, lower: f64, upper: f64) {
        self.lower = lower;
        self.upper = upper;
        self.reset_model();
    }

    /// New highest model order; `calc` has to run again
    pub fn set_pol_order(&mut self, pol_order: usize) {
        self.pol_order = pol_order;
        self.reset_model();
    }

    pub fn set_solver(&mut self, solver: Solver) {
        self.solver = solver;
        self.reset_model();
    }

    /// New estimates only invalidate the selected modes
    pub fn set_freq_estimates(&mut self, freq_estimates: Vec<f64>) {
        self.freq_estimates = freq_estimates;
        self.results = None;
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Signal names in first-seen order
    pub fn unique_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for measurement in &self.measurements {
            let (exc, resp) = measurement.names();
            for name in exc.into_iter().chain(resp) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Origin of every row of the FRF matrix, in stacking order
    pub fn response_rows(&self) -> Vec<ResponseRow> {
        self.measurements
            .iter()
            .enumerate()
            .flat_map(|(m, measurement)| {
                let reference = &measurement.exc()[0];
                measurement.resp().iter().enumerate().map(move |(channel, resp)| ResponseRow {
                    measurement: m,
                    channel,
                    name: resp.name.clone(),
                    direction: resp.direction,
                    reference: reference.name.clone(),
                    reference_direction: reference.direction,
                })
            })
            .collect()
    }

    /// Stack the H1 accelerances (DC dropped) of all measurements and build
    /// the modal model
    pub fn calc(&mut self) -> Result<(), EmaError> {
        if self.measurements.is_empty() {
            return Err(EmaError::NoMeasurements);
        }

        let mut rows: Vec<Complex64> = Vec::new();
        let mut coherence: Vec<f64> = Vec::new();
        let mut f_axis: Option<Vec<f64>> = None;
        let mut n_rows = 0;
        let mut driving_point = None;

        for measurement in &self.measurements {
            let frf = measurement.frf();
            if frf.n_exc() != 1 {
                return Err(EmaError::NotSimo {
                    name: measurement.name().to_string(),
                    n_exc: frf.n_exc(),
                });
            }
            let axis = &frf.f_axis()[1..];
            match &f_axis {
                None => f_axis = Some(axis.to_vec()),
                Some(reference) => {
                    let same = reference.len() == axis.len()
                        && reference.iter().zip(axis).all(|(a, b)| (a - b).abs() <= 1e-9 * a.abs().max(1.0));
                    if !same {
                        return Err(EmaError::FrequencyAxisMismatch(measurement.name().to_string()));
                    }
                }
            }

            let h1 = frf.get(FrfKind::H1, FrfForm::Accelerance);
            let exc_name = &measurement.exc()[0].name;
            for (r, resp) in measurement.resp().iter().enumerate() {
                if driving_point.is_none() && &resp.name == exc_name {
                    driving_point = Some(n_rows);
                }
                rows.extend((1..h1.dim().2).map(|k| h1[[r, 0, k]]));
                coherence.extend((1..h1.dim().2).map(|k| frf.coherence()[[r, k]]));
                n_rows += 1;
            }
        }

        let f_axis = f_axis.unwrap_or_default();
        let n_freq = f_axis.len();
        let frf_matrix = Array2::from_shape_vec((n_rows, n_freq), rows)
            .map_err(|e| crate::core::linalg::LinalgError::Dimension(e.to_string()))?;
        let coherence = Array2::from_shape_vec((n_rows, n_freq), coherence)
            .map_err(|e| crate::core::linalg::LinalgError::Dimension(e.to_string()))?;
        let driving_point = driving_point.unwrap_or_else(|| {
            debug!("No response at the excitation point, using row 0 as driving point");
            0
        });

        let model = ModalModel::new(
            frf_matrix.clone(),
            f_axis.clone(),
            self.lower,
            self.upper,
            self.pol_order,
            FrfForm::Accelerance,
            driving_point,
        )?;
        info!(
            "EMA: {} measurements, {} responses, driving point {}",
            self.measurements.len(),
            n_rows,
            driving_point
        );

        self.frf_matrix = Some(frf_matrix);
        self.f_axis = Some(f_axis);
        self.coherence = Some(coherence);
        self.driving_point = driving_point;
        self.model = Some(model);
        self.results = None;
        Ok(())
    }

    /// Run the configured solver over all model orders
    pub fn get_poles(&mut self) -> Result<&[Pole], EmaError> {
        let solver = self.solver;
        let model = self.model.as_mut().ok_or(EmaError::NotComputed("calc"))?;
        model.compute_poles(solver)
    }

    /// Pick poles (closest to the estimates, or all stable ones) and fit
    /// the modal constants
    pub fn select_poles(&mut self) -> Result<&ModalResults, EmaError> {
        let model = self.model.as_mut().ok_or(EmaError::NotComputed("calc"))?;
        if self.freq_estimates.is_empty() {
            model.select_stable_poles()?;
        } else {
            model.select_closest_poles(&self.freq_estimates, F_WINDOW)?;
        }
        let (h, a) = model.get_constants()?;
        let phi = model
            .phi()
            .cloned()
            .ok_or(EmaError::NotComputed("Modal constants"))?;

        let results = ModalResults {
            nat_freq: model.nat_freq(),
            nat_xi: model.nat_xi(),
            h,
            a,
            phi,
        };
        Ok(self.results.insert(results))
    }

    pub fn results(&self) -> Option<&ModalResults> {
        self.results.as_ref()
    }

    pub fn model(&self) -> Option<&ModalModel> {
        self.model.as_ref()
    }

    pub fn frf_matrix(&self) -> Option<&Array2<Complex64>> {
        self.frf_matrix.as_ref()
    }

    pub fn f_axis(&self) -> Option<&[f64]> {
        self.f_axis.as_deref()
    }

    pub fn coherence(&self) -> Option<&Array2<f64>> {
        self.coherence.as_ref()
    }

    pub fn driving_point(&self) -> usize {
        self.driving_point
    }

    /// Write settings, results and measurements; returns the written path
    pub fn export_to_file(&self, path: &Path) -> Result<PathBuf, EmaError> {
        let record = EmaRecord {
            lower: self.lower,
            upper: self.upper,
            pol_order: self.pol_order,
            solver: self.solver,
            freq_estimates: self.freq_estimates.clone(),
            results: self.results.clone(),
            measurements: self.measurements.iter().map(Measurement::to_record).collect(),
        };
        Ok(store::save(path, &record)?)
    }

    /// Load a session; FRFs are recomputed, stored results restored as is
    pub fn import_from_file(path: &Path) -> Result<Self, EmaError> {
        let record: EmaRecord = store::load(path)?;
        let mut ema = Self::new(
            record.lower,
            record.upper,
            record.pol_order,
            record.solver,
            record.freq_estimates,
        );
        for measurement in record.measurements {
            ema.measurements.push(Measurement::from_record(measurement)?);
        }
        ema.results = record.results;
        Ok(ema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::measurement::TimeSeries;
    use std::f64::consts::PI;

    const FS: u32 = 256;

    fn measurement(name: &str, exc: &str, resp: &[&str], fs: u32) -> Measurement {
        let n = fs as usize;
        let mut force = vec![0.0; n];
        force[0] = 1.0;
        let exc = vec![TimeSeries::new(force, "N", fs, "force", exc, Direction::MinusZ)];
        let resp = resp
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let data = (0..n)
                    .map(|t| {
                        let time = t as f64 / f64::from(fs);
                        (1.0 + i as f64) * (-10.0 * time).exp() * (2.0 * PI * 40.0 * time).sin()
                    })
                    .collect();
                TimeSeries::new(data, "m/s^2", fs, "acceleration", *name, Direction::PlusZ)
            })
            .collect();
        Measurement::new(name, n, fs, exc, resp, "").unwrap()
    }

    #[test]
    fn test_unique_names_and_remove() {
        let mut ema = Ema::new(10.0, 100.0, 4, Solver::Lscf, Vec::new());
        ema.add_measurement(measurement("m1", "p1", &["p1", "p2"], FS));
        ema.add_measurement(measurement("m2", "p3", &["p2"], FS));
        assert_eq!(ema.unique_names(), vec!["p1", "p2", "p3"]);

        ema.calc().unwrap();
        assert!(ema.remove_measurement("m2"));
        assert!(ema.frf_matrix().is_none());
        assert!(!ema.remove_measurement("m2"));
        assert_eq!(ema.measurements().len(), 1);
    }

    #[test]
    fn test_calc_stacks_rows() {
        let mut ema = Ema::new(10.0, 100.0, 4, Solver::Lscf, Vec::new());
        ema.add_measurement(measurement("m1", "p2", &["p1"], FS));
        ema.add_measurement(measurement("m2", "p2", &["p3", "p2"], FS));
        ema.calc().unwrap();

        let frf = ema.frf_matrix().unwrap();
        assert_eq!(frf.dim(), (3, 128));
        assert_eq!(ema.f_axis().unwrap()[0], 1.0);
        assert_eq!(ema.coherence().unwrap().dim(), (3, 128));
        // p2 responds at the excitation point in the second measurement
        assert_eq!(ema.driving_point(), 2);

        let rows = ema.response_rows();
        assert_eq!(rows[1].name, "p3");
        assert_eq!(rows[1].measurement, 1);
        assert_eq!(rows[1].channel, 0);
        assert_eq!(rows[1].reference, "p2");
    }

    #[test]
    fn test_calc_errors() {
        let mut ema = Ema::new(10.0, 100.0, 4, Solver::Lscf, Vec::new());
        assert!(matches!(ema.calc(), Err(EmaError::NoMeasurements)));
        assert!(matches!(ema.get_poles(), Err(EmaError::NotComputed(_))));

        ema.add_measurement(measurement("m1", "p1", &["p1"], FS));
        ema.add_measurement(measurement("m2", "p1", &["p2"], 2 * FS));
        assert!(matches!(ema.calc(), Err(EmaError::FrequencyAxisMismatch(name)) if name == "m2"));
    }

    #[test]
    fn test_single_mode_session() {
        let mut ema = Ema::new(10.0, 100.0, 6, Solver::Lscf, vec![40.0]);
        ema.add_measurement(measurement("m1", "p1", &["p1", "p2"], FS));
        ema.calc().unwrap();
        ema.get_poles().unwrap();
        let results = ema.select_poles().unwrap();
        assert_eq!(results.nat_freq.len(), 1);
        assert!((results.nat_freq[0] - 40.0).abs() < 1.0);
        assert_eq!(results.phi.dim(), (2, 1));
        // the second response is twice the first
        let ratio = results.phi[[1, 0]] / results.phi[[0, 0]];
        assert!((ratio - Complex64::new(2.0, 0.0)).norm() < 0.05);
    }

    #[test]
    fn test_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut ema = Ema::new(10.0, 100.0, 6, Solver::Lsce, vec![40.0]);
        ema.add_measurement(measurement("m1", "p1", &["p1"], FS));
        ema.calc().unwrap();
        ema.get_poles().unwrap();
        ema.select_poles().unwrap();

        let path = ema.export_to_file(&dir.path().join("session")).unwrap();
        let back = Ema::import_from_file(&path).unwrap();
        assert_eq!(back.solver(), Solver::Lsce);
        assert_eq!(back.freq_estimates(), &[40.0]);
        assert_eq!(back.measurements().len(), 1);
        assert_eq!(back.results(), ema.results());
    }

    #[test]
    fn test_settings_changes_drop_stale_model() {
        let mut ema = Ema::new(10.0, 100.0, 6, Solver::Lscf, vec![40.0]);
        ema.add_measurement(measurement("m1", "p1", &["p1"], FS));
        ema.calc().unwrap();
        ema.get_poles().unwrap();
        ema.select_poles().unwrap();

        ema.set_freq_estimates(vec![40.5]);
        assert!(ema.results().is_none());
        assert!(ema.model().is_some());
        ema.select_poles().unwrap();

        ema.set_band(20.0, 80.0);
        assert_eq!((ema.lower(), ema.upper()), (20.0, 80.0));
        assert!(ema.model().is_none());
        assert!(ema.results().is_none());
        assert!(matches!(ema.get_poles(), Err(EmaError::NotComputed(_))));
        // measured FRFs are kept
        assert!(ema.frf_matrix().is_some());

        ema.calc().unwrap();
        ema.set_pol_order(8);
        assert_eq!(ema.pol_order(), 8);
        assert!(ema.model().is_none());
        ema.calc().unwrap();
        ema.set_solver(Solver::Lsce);
        assert!(ema.model().is_none());
    }
}
