//! Experimental modal analysis
//!
//! Pole estimation (LSCF in the frequency domain, LSCE in the time domain),
//! stabilisation across model orders, pole selection and modal constants by
//! least-squares frequency domain fitting (LSFD).

mod lsce;
mod lscf;
mod lsfd;
mod model;
mod session;
mod stabilization;

pub use lsce::lsce;
pub use lscf::lscf;
pub use lsfd::{lsfd, LsfdFit};
pub use model::{ModalModel, F_WINDOW};
pub use session::{Ema, ModalResults, ResponseRow};
pub use stabilization::{stabilize, Pole, Stability};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::linalg::LinalgError;
use super::measurement::MeasurementError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EmaError {
    #[error("No measurements in the session")]
    NoMeasurements,

    #[error("Measurement '{name}' has {n_exc} excitations; only SIMO is supported")]
    NotSimo { name: String, n_exc: usize },

    #[error("Measurement '{0}' uses a different frequency axis")]
    FrequencyAxisMismatch(String),

    #[error("Frequency band {lower}..{upper} Hz is empty or outside the data")]
    InvalidBand { lower: f64, upper: f64 },

    #[error("Polynomial order {0} must be even and at least 2")]
    InvalidOrder(usize),

    #[error("Unknown solver '{0}' (expected lscf or lsce)")]
    UnknownSolver(String),

    #[error("{0} has not been run yet")]
    NotComputed(&'static str),

    #[error("No pole within the search window around {0} Hz")]
    NoPoleNear(f64),

    #[error("No stable poles found")]
    NoStablePoles,

    #[error(transparent)]
    Linalg(#[from] LinalgError),

    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pole estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    /// Least-squares complex frequency domain
    #[default]
    Lscf,
    /// Least-squares complex exponential
    Lsce,
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Solver::Lscf => write!(f, "lscf"),
            Solver::Lsce => write!(f, "lsce"),
        }
    }
}

impl FromStr for Solver {
    type Err = EmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lscf" => Ok(Solver::Lscf),
            "lsce" => Ok(Solver::Lsce),
            other => Err(EmaError::UnknownSolver(other.to_string())),
        }
    }
}

/// Map a discrete root `z = exp(s dt)` back to the Laplace domain
pub(crate) fn root_to_pole(z: num_complex::Complex64, dt: f64) -> num_complex::Complex64 {
    z.ln() / dt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_parse() {
        assert_eq!("LSCF".parse::<Solver>().unwrap(), Solver::Lscf);
        assert_eq!(" lsce".parse::<Solver>().unwrap(), Solver::Lsce);
        assert!(matches!("ssi".parse::<Solver>(), Err(EmaError::UnknownSolver(_))));
        assert_eq!(Solver::default().to_string(), "lscf");
    }
}
