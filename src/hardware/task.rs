// src/hardware/task.rs
//
// Vendor independent acquisition task description

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::HardwareError;
use crate::store::{self, StoreError};

/// Target number of samples between two callbacks
pub const CALLBACK_TARGET: usize = 2000;

/// Persisted parameters of a measurement task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    pub name: String,
    /// Measurement time in seconds
    pub meas_time: f64,
    pub sampling_freq: u32,
}

impl TaskSettings {
    pub fn new(name: impl Into<String>, meas_time: f64, sampling_freq: u32) -> Self {
        Self {
            name: name.into(),
            meas_time,
            sampling_freq,
        }
    }

    pub fn num_samples(&self) -> usize {
        (self.meas_time * self.sampling_freq as f64).max(0.0) as usize
    }

    /// Samples per callback for this task
    pub fn callback_interval(&self) -> usize {
        nearest_even_divisor(self.num_samples(), CALLBACK_TARGET)
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        store::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<PathBuf, StoreError> {
        store::save(path, self)
    }

    /// Remove a task file; a missing file is not an error
    pub fn delete_file(path: &Path) -> Result<(), HardwareError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HardwareError::Io(e)),
        }
    }
}

/// A running or runnable acquisition
pub trait AcquisitionTask {
    fn settings(&self) -> &TaskSettings;

    fn start(&mut self) -> Result<(), HardwareError>;

    /// Read `n` samples per channel, shape `(channels, n)`
    fn read(&mut self, n: usize) -> Result<Array2<f64>, HardwareError>;

    fn stop(&mut self) -> Result<(), HardwareError>;
}

/// Divisor of `n` closest to `target`; the smaller one wins a tie
pub fn nearest_even_divisor(n: usize, target: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut best: usize = 1;
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            for d in [i, n / i] {
                let (dist, best_dist) = (d.abs_diff(target), best.abs_diff(target));
                if dist < best_dist || (dist == best_dist && d < best) {
                    best = d;
                }
            }
        }
        i += 1;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_nearest_even_divisor() {
        assert_eq!(nearest_even_divisor(10240, 2000), 2048);
        assert_eq!(nearest_even_divisor(1000, 2000), 1000);
        assert_eq!(nearest_even_divisor(12, 5), 4);
        assert_eq!(nearest_even_divisor(13, 5), 1);
        assert_eq!(nearest_even_divisor(0, 2000), 0);
    }

    #[test]
    fn test_num_samples() {
        let settings = TaskSettings::new("impact", 2.5, 25600);
        assert_eq!(settings.num_samples(), 64000);
        assert_eq!(settings.callback_interval(), 2000);
    }

    #[test]
    fn test_settings_file() {
        let dir = tempdir().unwrap();
        let settings = TaskSettings::new("impact", 1.0, 1024);
        let path = settings.save(&dir.path().join("task")).unwrap();
        assert_eq!(TaskSettings::from_file(&path).unwrap(), settings);

        TaskSettings::delete_file(&path).unwrap();
        assert!(!path.exists());
        TaskSettings::delete_file(&path).unwrap();
    }
}
