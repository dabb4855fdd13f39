// src/config/settings.rs
//
// Analysis settings shared by the CLI commands

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::dsp::FrfWindow;
use crate::core::ema::Solver;
use crate::core::measurement::{Measurement, MeasurementError};
use crate::store::{self, StoreError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Settings for FRF estimation, impact screening and EMA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Samples per impact (FFT length); `None` keeps each measurement's own
    pub window_len: Option<usize>,
    /// Lower band limit for EMA (Hz)
    pub lower: f64,
    /// Upper band limit for EMA (Hz)
    pub upper: f64,
    /// Highest polynomial order of the pole estimation
    pub pol_order: usize,
    pub solver: Solver,
    /// Natural frequency estimates; empty selects all stable poles
    pub freq_estimates: Vec<f64>,
    /// Samples at the peak that flag an overflow
    pub overflow_samples: usize,
    /// Normalised force spectrum level that flags a double impact
    pub double_impact_limit: f64,
    /// Window before the FFT; `None` keeps each measurement's own
    pub window: Option<FrfWindow>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            window_len: None,
            lower: 10.0,
            upper: 500.0,
            pol_order: 30,
            solver: Solver::Lscf,
            freq_estimates: Vec::new(),
            overflow_samples: 3,
            double_impact_limit: 1e-3,
            window: None,
        }
    }
}

impl AnalysisSettings {
    /// `<config dir>/sdlma/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sdlma").join("settings.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings: Self = store::load(path)?;
        settings.validate()?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Settings from `path`, else the default file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(store::save(path, self)?)
    }

    /// Re-estimate the FRF of `meas` when the impact length or window is overridden
    pub fn reanalyse(&self, meas: Measurement) -> Result<Measurement, MeasurementError> {
        let window_len = self.window_len.unwrap_or_else(|| meas.window_len());
        let window = self.window.unwrap_or_else(|| meas.window());
        if window_len == meas.window_len() && window == meas.window() {
            return Ok(meas);
        }
        debug!(
            "Re-estimating '{}' with {} samples per impact, {:?} window",
            meas.name(),
            window_len,
            window
        );
        meas.rewindowed(window_len, window)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_len == Some(0) {
            return Err(ConfigError::Invalid("window_len must be positive".into()));
        }
        if !(self.lower >= 0.0 && self.lower < self.upper) {
            return Err(ConfigError::Invalid(format!(
                "band {}..{} Hz is empty",
                self.lower, self.upper
            )));
        }
        if self.pol_order < 2 || self.pol_order % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "pol_order {} must be even and at least 2",
                self.pol_order
            )));
        }
        if self.double_impact_limit <= 0.0 {
            return Err(ConfigError::Invalid("double_impact_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Builder for overriding individual settings
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: AnalysisSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    pub fn window_len(mut self, window_len: usize) -> Self {
        self.settings.window_len = Some(window_len);
        self
    }

    pub fn band(mut self, lower: f64, upper: f64) -> Self {
        self.settings.lower = lower;
        self.settings.upper = upper;
        self
    }

    pub fn lower(mut self, lower: f64) -> Self {
        self.settings.lower = lower;
        self
    }

    pub fn upper(mut self, upper: f64) -> Self {
        self.settings.upper = upper;
        self
    }

    pub fn pol_order(mut self, order: usize) -> Self {
        self.settings.pol_order = order;
        self
    }

    pub fn solver(mut self, solver: Solver) -> Self {
        self.settings.solver = solver;
        self
    }

    pub fn freq_estimates(mut self, estimates: Vec<f64>) -> Self {
        self.settings.freq_estimates = estimates;
        self
    }

    pub fn overflow_samples(mut self, samples: usize) -> Self {
        self.settings.overflow_samples = samples;
        self
    }

    pub fn double_impact_limit(mut self, limit: f64) -> Self {
        self.settings.double_impact_limit = limit;
        self
    }

    pub fn window(mut self, window: FrfWindow) -> Self {
        self.settings.window = Some(window);
        self
    }

    pub fn build(self) -> Result<AnalysisSettings, ConfigError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
