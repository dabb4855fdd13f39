//! Impact measurements and FRF estimation

mod frf;
mod impact;
#[allow(clippy::module_inception)]
mod measurement;
mod series;

pub use frf::{Frf, FrfForm, FrfKind};
pub use impact::{check_impact, prepare_time_series, ImpactBlock, ImpactCheck};
pub use measurement::Measurement;
pub(crate) use measurement::MeasurementRecord;
pub use series::{Direction, TimeSeries};

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("A measurement needs at least one {0} signal")]
    MissingSignals(&'static str),

    #[error("No signals given")]
    NoSignals,

    #[error("Signal '{name}' has {found} samples, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{samples} samples cannot be split into windows of {window_len}")]
    InvalidWindow { window_len: usize, samples: usize },

    #[error("Signal '{name}' is sampled at {found} Hz, measurement at {expected} Hz")]
    SamplingMismatch {
        name: String,
        expected: u32,
        found: u32,
    },

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Unknown direction '{0}'")]
    UnknownDirection(String),

    #[error("Unknown FRF form '{0}'")]
    UnknownForm(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
