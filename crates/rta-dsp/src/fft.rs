use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use std::sync::Arc;
use thiserror::Error;

use super::config::FftSize;
use super::constants::MAGNITUDE_EPSILON;

#[derive(Error, Debug)]
#[error("forward FFT failed: {0}")]
pub struct FftError(#[from] realfft::FftError);

/// Hann window + real FFT producing `fft_size / 2` dB magnitudes.
///
/// Plan, window and scratch buffers are allocated once per FFT size; a size
/// change means building a new engine, which the worker only ever does
/// between ticks.
pub struct SpectrumEngine {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    magnitudes_db: Vec<f32>,
    size: usize,
}

impl SpectrumEngine {
    pub fn new(fft_size: FftSize) -> Self {
        let size = fft_size.as_usize();
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            fft,
            window: hann_window(size),
            input: vec![0.0; size],
            spectrum,
            scratch,
            magnitudes_db: vec![0.0; size / 2],
            size,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.size
    }

    /// Window the input block and return its magnitude spectrum in dB.
    ///
    /// `samples` must hold exactly `fft_size` values. Magnitudes are
    /// amplitude-normalized (2/N) so a fixed-amplitude sine reads the same
    /// dB value at every FFT size; the Nyquist bin is dropped to keep the
    /// N/2-bin output contract.
    pub fn magnitudes_db(&mut self, samples: &[f32]) -> Result<&[f32], FftError> {
        debug_assert_eq!(samples.len(), self.size);
        for ((out, &sample), &coeff) in self.input.iter_mut().zip(samples).zip(&self.window) {
            *out = sample * coeff;
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let norm = 2.0 / self.size as f32;
        for (db, complex) in self.magnitudes_db.iter_mut().zip(&self.spectrum) {
            let magnitude = complex.norm() * norm;
            *db = 20.0 * magnitude.max(MAGNITUDE_EPSILON).log10();
        }
        Ok(&self.magnitudes_db)
    }
}

/// Linearly spaced bin center frequencies for the first `fft_size / 2` bins.
pub fn bin_frequencies(sample_rate: f32, fft_size: FftSize) -> Vec<f32> {
    let size = fft_size.as_usize();
    let bin_hz = sample_rate / size as f32;
    (0..size / 2).map(|i| i as f32 * bin_hz).collect()
}

fn hann_window(size: usize) -> Vec<f32> {
    let denom = (size - 1) as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
        .collect()
}
