//! sdlma-core - Experimental modal analysis from impact hammer tests
//!
//! Takes a roving hammer (or roving sensor) test from raw time signals to
//! modal parameters and exports the results for third party modal tools.
//!
//! ## Features
//!
//! - **TEDS**: Decode and encode IEEE 1451.4 sensor data sheets (templates 25 and 36)
//! - **Measurements**: Split impacts, check overflow and double hits, estimate H1 FRFs
//! - **Modal analysis**: LSCF or LSCE poles, stabilization, pole selection, LSFD constants
//! - **UFF export**: Geometry, units, FRFs (dataset 58) and mode shapes (dataset 55)
//! - **Hardware seam**: Vendor independent channels, tasks and a replay backend
//!
//! ## Module Structure
//!
//! - `teds` - TEDS bit codec and templates
//! - `core` - DSP, linear algebra, measurements and the EMA pipeline
//! - `uff` - Universal File Format writer and reader
//! - `hardware` - DAQ backends, channels and acquisition tasks
//! - `config` - Analysis settings
//! - `store` - JSON datastore shared by measurements, sessions and tasks
//! - `cli` - Command-line interface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdlma_core::{Ema, Measurement, Solver};
//!
//! let meas = Measurement::import_from_file(path)?;
//! let mut ema = Ema::new(10.0, 500.0, 30, Solver::Lscf, vec![52.0, 121.0]);
//! ema.add_measurement(meas);
//! ema.calc()?;
//! ema.get_poles()?;
//! let results = ema.select_poles()?;
//!
//! for (f, xi) in results.nat_freq.iter().zip(&results.nat_xi) {
//!     println!("{:.2} Hz  {:.3} %", f, xi * 100.0);
//! }
//! ```
//!
//! ## Solvers
//!
//! | Solver | Domain    | Notes                                   |
//! |--------|-----------|-----------------------------------------|
//! | LSCF   | Frequency | Default, clean stabilization diagrams   |
//! | LSCE   | Time      | Works on the impulse response functions |

// Numerics and the analysis pipeline
pub mod core;

// Command-line interface
pub mod cli;

// Analysis settings
pub mod config;

// DAQ abstraction
pub mod hardware;

// JSON datastore
pub mod store;

// Sensor data sheets
pub mod teds;

// Universal File Format
pub mod uff;

// Re-export commonly used types at crate root for convenience
pub use config::{AnalysisSettings, SettingsBuilder};
pub use core::{
    Direction, Ema, Frf, FrfForm, Measurement, ModalModel, ModalResults, Pole, Solver,
    Stability, TimeSeries,
};
pub use core::dsp::FrfWindow;
pub use hardware::{AcquisitionTask, Channel, DaqBackend, Hardware, ReplayTask, TaskSettings};
pub use teds::Teds;
pub use uff::{UffReader, UffWriter};
