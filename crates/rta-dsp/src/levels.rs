//! RMS, SPL and Leq math for the level estimation path.

use std::collections::VecDeque;

use super::constants::{MAGNITUDE_EPSILON, POWER_EPSILON, SPL_REFERENCE_DB};

/// RMS of a sample block, accumulated in f64.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Instantaneous calibrated SPL. Silence bottoms out at -106 dB plus the
/// calibration offset, never -inf.
pub fn spl_db(rms: f32, calibration_offset_db: f32) -> f32 {
    20.0 * rms.max(MAGNITUDE_EPSILON).log10() + SPL_REFERENCE_DB + calibration_offset_db
}

#[derive(Debug, Clone, Copy)]
struct LeqEntry {
    mean_square: f64,
    samples: usize,
}

/// Sliding window of per-tick mean-square entries, bounded by the total
/// number of samples covered.
///
/// The window mean is maintained incrementally (add on push, subtract on
/// evict) in f64 rather than re-summed each tick; both converge to the same
/// value and the incremental form stays cheap at high update rates. Entries
/// carry their own sample counts, so update-rate changes need no resizing.
#[derive(Debug)]
pub struct LeqAccumulator {
    entries: VecDeque<LeqEntry>,
    window_samples: usize,
    total_samples: usize,
    weighted_sum: f64,
}

impl LeqAccumulator {
    /// `window_samples` is the integration window expressed in samples at
    /// the actual sample rate.
    pub fn new(window_samples: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            window_samples: window_samples.max(1),
            total_samples: 0,
            weighted_sum: 0.0,
        }
    }

    /// Push one tick's mean-square pressure covering `samples` samples,
    /// evicting the oldest entries once the window is exceeded.
    pub fn push(&mut self, mean_square: f64, samples: usize) {
        if samples == 0 {
            return;
        }
        self.entries.push_back(LeqEntry {
            mean_square,
            samples,
        });
        self.weighted_sum += mean_square * samples as f64;
        self.total_samples += samples;

        while self.total_samples > self.window_samples {
            let Some(oldest) = self.entries.pop_front() else {
                break;
            };
            self.weighted_sum -= oldest.mean_square * oldest.samples as f64;
            self.total_samples -= oldest.samples;
        }
        // Subtraction can leave a tiny negative residue.
        if self.weighted_sum < 0.0 {
            self.weighted_sum = 0.0;
        }
    }

    /// Calibrated Leq over the currently valid window. Uses factor 10, the
    /// pressure is already squared.
    pub fn leq_db(&self, calibration_offset_db: f32) -> f32 {
        let mean = if self.total_samples == 0 {
            0.0
        } else {
            self.weighted_sum / self.total_samples as f64
        };
        (10.0 * mean.max(POWER_EPSILON).log10()) as f32
            + SPL_REFERENCE_DB
            + calibration_offset_db
    }

    /// Samples currently covered by the window; saturates at capacity.
    pub fn sample_count(&self) -> usize {
        self.total_samples
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    pub fn is_full(&self) -> bool {
        self.total_samples >= self.window_samples
    }
}
