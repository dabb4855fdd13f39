//! Core numerics: DSP, linear algebra, measurements and modal analysis

pub mod dsp;
pub mod ema;
pub mod linalg;
pub mod measurement;

pub use ema::{Ema, ModalModel, ModalResults, Pole, Solver, Stability};
pub use measurement::{Direction, Frf, FrfForm, Measurement, TimeSeries};
