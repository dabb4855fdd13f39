//! Universal File Format (UFF) export
//!
//! Geometry (datasets 15, 2412, 2420), units (164), measured FRFs (58) and
//! mode shapes (55) for post-processing in third party modal tools.

mod format;
mod reader;
mod writer;

pub use format::{e13, e20, fmt_e};
pub use reader::{UffReader, UffSet};
pub use writer::{direction_to_int, UffWriter};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Measurement point '{0}' has no node assigned")]
    UnknownPoint(String),

    #[error("No modal results to export; select poles first")]
    NoResults,

    #[error("Mode shapes are {found:?}, expected {expected:?} (responses x modes)")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
}
