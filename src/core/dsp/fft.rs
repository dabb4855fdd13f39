//! FFT processing with windowing

use num_complex::Complex64;
use realfft::RealFftPlanner;
use rustfft::FftPlanner;

use super::windows::FrfWindow;

/// Real-input FFT of fixed size with a precomputed window
pub struct SpectrumProcessor {
    planner: RealFftPlanner<f64>,
    window: Vec<f64>,
    fft_size: usize,
}

impl SpectrumProcessor {
    pub fn new(fft_size: usize, window: FrfWindow) -> Self {
        Self {
            planner: RealFftPlanner::new(),
            window: window.generate(fft_size),
            fft_size,
        }
    }

    /// One-sided complex spectrum (`fft_size / 2 + 1` bins)
    pub fn complex_spectrum(&mut self, samples: &[f64]) -> Vec<Complex64> {
        let fft = self.planner.plan_fft_forward(self.fft_size);

        let mut input: Vec<f64> = samples
            .iter()
            .take(self.fft_size)
            .zip(self.window.iter())
            .map(|(&s, &w)| s * w)
            .collect();
        // Zero-pad short blocks
        input.resize(self.fft_size, 0.0);

        let mut output = fft.make_output_vec();
        // lengths always match the plan
        if fft.process(&mut input, &mut output).is_err() {
            return vec![Complex64::new(0.0, 0.0); self.fft_size / 2 + 1];
        }
        output
    }

    /// Magnitude spectrum normalised to its largest bin
    pub fn normalized_magnitude(&mut self, samples: &[f64]) -> Vec<f64> {
        let mags: Vec<f64> = self.complex_spectrum(samples).iter().map(|c| c.norm()).collect();
        let peak = mags.iter().cloned().fold(0.0, f64::max);
        if peak > 0.0 {
            mags.iter().map(|m| m / peak).collect()
        } else {
            mags
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

/// Frequency axis of a one-sided spectrum, like numpy's `rfftfreq`
pub fn rfft_freqs(fft_size: usize, sampling_freq: f64) -> Vec<f64> {
    let df = sampling_freq / fft_size as f64;
    (0..fft_size / 2 + 1).map(|k| k as f64 * df).collect()
}

/// Inverse of a one-sided spectrum back to `2 * (bins - 1)` real samples.
///
/// The spectrum is extended with its Hermitian mirror and transformed with a
/// full complex IFFT, so non-zero imaginary parts at DC or Nyquist are
/// tolerated (they are dropped).
pub fn inverse_one_sided(spectrum: &[Complex64]) -> Vec<f64> {
    if spectrum.len() < 2 {
        return spectrum.iter().map(|c| c.re).collect();
    }
    let n = 2 * (spectrum.len() - 1);
    let mut buffer: Vec<Complex64> = Vec::with_capacity(n);
    buffer.extend_from_slice(spectrum);
    buffer.extend(spectrum[1..spectrum.len() - 1].iter().rev().map(|c| c.conj()));
    buffer[0].im = 0.0;
    buffer[spectrum.len() - 1].im = 0.0;

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_inverse(n).process(&mut buffer);
    buffer.iter().map(|c| c.re / n as f64).collect()
}
