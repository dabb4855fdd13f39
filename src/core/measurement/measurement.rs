// src/core/measurement/measurement.rs
//
// A roving-hammer measurement: excitation and response records plus the
// FRF computed from them.

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::frf::{Frf, FrfForm};
use super::impact::{check_impact, prepare_time_series};
use super::series::TimeSeries;
use super::MeasurementError;
use crate::core::dsp::FrfWindow;
use crate::store;

/// Serialized form of a measurement; the FRF is recomputed on load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MeasurementRecord {
    name: String,
    window_len: usize,
    sampling_freq: u32,
    comment: String,
    #[serde(default)]
    window: FrfWindow,
    exc: Vec<TimeSeries>,
    resp: Vec<TimeSeries>,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    name: String,
    window_len: usize,
    sampling_freq: u32,
    exc: Vec<TimeSeries>,
    resp: Vec<TimeSeries>,
    comment: String,
    window: FrfWindow,
    frf: Frf,
}

impl Measurement {
    pub fn new(
        name: impl Into<String>,
        window_len: usize,
        sampling_freq: u32,
        exc: Vec<TimeSeries>,
        resp: Vec<TimeSeries>,
        comment: impl Into<String>,
    ) -> Result<Self, MeasurementError> {
        Self::with_window(
            name,
            window_len,
            sampling_freq,
            exc,
            resp,
            comment,
            FrfWindow::default(),
        )
    }

    /// Like [`Measurement::new`] with a window applied before the FFT
    pub fn with_window(
        name: impl Into<String>,
        window_len: usize,
        sampling_freq: u32,
        exc: Vec<TimeSeries>,
        resp: Vec<TimeSeries>,
        comment: impl Into<String>,
        window: FrfWindow,
    ) -> Result<Self, MeasurementError> {
        let name = name.into();
        validate(window_len, sampling_freq, &exc, &resp)?;

        let exc_blocks = prepare_time_series(&exc, window_len)?;
        let resp_blocks = prepare_time_series(&resp, window_len)?;
        let form = FrfForm::from_quantity(&resp[0].quantity);
        let frf = Frf::estimate(
            &exc_blocks,
            &resp_blocks,
            f64::from(sampling_freq),
            window,
            form,
        )?;
        debug!(
            "Measurement '{}': {} impacts, {} exc, {} resp",
            name,
            exc_blocks.len(),
            exc.len(),
            resp.len()
        );

        Ok(Self {
            name,
            window_len,
            sampling_freq,
            exc,
            resp,
            comment: comment.into(),
            window,
            frf,
        })
    }

    /// Same records split into `window_len` sample impacts with another window
    pub fn rewindowed(&self, window_len: usize, window: FrfWindow) -> Result<Self, MeasurementError> {
        Self::with_window(
            self.name.clone(),
            window_len,
            self.sampling_freq,
            self.exc.clone(),
            self.resp.clone(),
            self.comment.clone(),
            window,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn sampling_freq(&self) -> u32 {
        self.sampling_freq
    }

    pub fn exc(&self) -> &[TimeSeries] {
        &self.exc
    }

    pub fn resp(&self) -> &[TimeSeries] {
        &self.resp
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn window(&self) -> FrfWindow {
        self.window
    }

    pub fn frf(&self) -> &Frf {
        &self.frf
    }

    pub fn num_impacts(&self) -> usize {
        self.exc[0].len() / self.window_len
    }

    /// Excitation and response channel names
    pub fn names(&self) -> (Vec<String>, Vec<String>) {
        (
            self.exc.iter().map(|s| s.name.clone()).collect(),
            self.resp.iter().map(|s| s.name.clone()).collect(),
        )
    }

    /// Indices of impacts that overflow or contain a double hit
    pub fn check_double_impact(
        &self,
        overflow_samples: usize,
        double_impact_limit: f64,
    ) -> Result<Vec<usize>, MeasurementError> {
        let exc_blocks = prepare_time_series(&self.exc, self.window_len)?;
        let resp_blocks = prepare_time_series(&self.resp, self.window_len)?;

        let mut bad: Vec<usize> = exc_blocks
            .par_iter()
            .zip(resp_blocks.par_iter())
            .enumerate()
            .filter(|(_, (e, r))| !check_impact(e, r, overflow_samples, double_impact_limit).is_ok())
            .map(|(i, _)| i)
            .collect();
        bad.sort_unstable();

        if !bad.is_empty() {
            info!("Measurement '{}': rejected impacts {:?}", self.name, bad);
        }
        Ok(bad)
    }

    pub(crate) fn to_record(&self) -> MeasurementRecord {
        MeasurementRecord {
            name: self.name.clone(),
            window_len: self.window_len,
            sampling_freq: self.sampling_freq,
            comment: self.comment.clone(),
            window: self.window,
            exc: self.exc.clone(),
            resp: self.resp.clone(),
        }
    }

    pub(crate) fn from_record(record: MeasurementRecord) -> Result<Self, MeasurementError> {
        Self::with_window(
            record.name,
            record.window_len,
            record.sampling_freq,
            record.exc,
            record.resp,
            record.comment,
            record.window,
        )
    }

    /// Write the measurement datastore; returns the path actually written
    pub fn export_to_file(&self, path: &Path) -> Result<PathBuf, MeasurementError> {
        Ok(store::save(path, &self.to_record())?)
    }

    pub fn import_from_file(path: &Path) -> Result<Self, MeasurementError> {
        Self::from_record(store::load(path)?)
    }
}

fn validate(
    window_len: usize,
    sampling_freq: u32,
    exc: &[TimeSeries],
    resp: &[TimeSeries],
) -> Result<(), MeasurementError> {
    let first = exc.first().ok_or(MeasurementError::MissingSignals("excitation"))?;
    if resp.is_empty() {
        return Err(MeasurementError::MissingSignals("response"));
    }
    let samples = first.len();
    if window_len == 0 || samples == 0 || samples % window_len != 0 {
        return Err(MeasurementError::InvalidWindow { window_len, samples });
    }
    for series in exc.iter().chain(resp.iter()) {
        if series.len() != samples {
            return Err(MeasurementError::LengthMismatch {
                name: series.name.clone(),
                expected: samples,
                found: series.len(),
            });
        }
        if series.fs != sampling_freq {
            return Err(MeasurementError::SamplingMismatch {
                name: series.name.clone(),
                expected: sampling_freq,
                found: series.fs,
            });
        }
    }
    Ok(())
}
