use super::config::ResponseTime;
use super::constants::{FAST_ALPHA_FLOOR, SLOW_ALPHA};

/// Effective EMA factor for the configured smoothing and response setting.
/// Slow pins the factor regardless of the configured smoothing; Fast floors
/// it to keep the display stable.
pub fn effective_smoothing(smoothing: f32, response_time: ResponseTime) -> f32 {
    match response_time {
        ResponseTime::Slow => SLOW_ALPHA,
        ResponseTime::Fast => smoothing.max(FAST_ALPHA_FLOOR),
    }
}

/// Per-bin exponential smoothing of the dB spectrum.
///
/// The first spectrum after a (re)start seeds the state directly with no
/// blending, so a fresh stream shows real data immediately.
#[derive(Debug, Default)]
pub struct SpectrumSmoother {
    smoothed: Vec<f32>,
}

impl SpectrumSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, magnitudes_db: &[f32], alpha: f32) -> &[f32] {
        if self.smoothed.len() != magnitudes_db.len() {
            self.smoothed.clear();
            self.smoothed.extend_from_slice(magnitudes_db);
        } else {
            for (smoothed, &new) in self.smoothed.iter_mut().zip(magnitudes_db) {
                *smoothed = alpha * *smoothed + (1.0 - alpha) * new;
            }
        }
        &self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed.clear();
    }
}
