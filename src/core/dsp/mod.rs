//! Digital Signal Processing utilities

mod fft;
mod stats;
mod windows;

pub use fft::{inverse_one_sided, rfft_freqs, SpectrumProcessor};
pub use stats::{max_abs, mean, samples_near_peak};
pub use windows::FrfWindow;
