/// Immutable per-tick analysis snapshot.
///
/// Produced by the analysis worker, shipped upward as `Arc<FrequencyData>`
/// and replaced wholesale each tick; consumers only ever read.
#[derive(Debug, Clone)]
pub struct FrequencyData {
    /// Linearly spaced bin centers, length = fft_size / 2.
    pub frequencies: Vec<f32>,
    /// Smoothed dB magnitude per bin.
    pub magnitudes: Vec<f32>,
    pub sample_rate: f32,
    /// Seconds of audio processed, derived from sample counts.
    pub timestamp: f64,
    /// Instantaneous calibrated SPL in dB.
    pub spl: f32,
    /// Windowed calibrated Leq in dB.
    pub leq: f32,
}

impl FrequencyData {
    /// Frequency and dB value of the loudest bin.
    pub fn peak(&self) -> Option<(f32, f32)> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .and_then(|(idx, &db)| self.frequencies.get(idx).map(|&f| (f, db)))
    }
}
