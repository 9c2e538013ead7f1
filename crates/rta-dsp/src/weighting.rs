//! A-weighting, both flavors used by the analyzer:
//!
//! - [`a_weight_db`] gives per-bin dB offsets from the analytic IEC 61672-1
//!   transfer function, applied to the displayed spectrum.
//! - [`AWeightingFilter`] is a stateful time-domain cascade feeding the
//!   SPL/Leq path, applied unconditionally.

use std::f64::consts::PI;

use super::constants::{A_WEIGHT_DC_DB, WEIGHTING_REFERENCE_RATE_HZ};

// IEC 61672-1:2013 pole frequencies, squared.
const C1: f64 = 20.598_997 * 20.598_997;
const C2: f64 = 107.652_65 * 107.652_65;
const C3: f64 = 737.862_23 * 737.862_23;
const C4: f64 = 12_194.217 * 12_194.217;

/// Analytic A-weighting offset in dB at `freq_hz`. The +2.00 term normalizes
/// the curve to 0 dB at 1 kHz. The 0 Hz bin gets a fixed attenuation because
/// the transfer function is singular there.
pub fn a_weight_db(freq_hz: f32) -> f32 {
    if freq_hz <= 0.0 {
        return A_WEIGHT_DC_DB;
    }

    let f = freq_hz as f64;
    let f2 = f * f;
    let numerator = C4 * f2 * f2;
    let denom = (f2 + C1) * ((f2 + C2) * (f2 + C3)).sqrt() * (f2 + C4);

    if denom <= 0.0 || numerator <= 0.0 {
        return A_WEIGHT_DC_DB;
    }

    let ra = numerator / denom;
    let db = 20.0 * ra.log10() + 2.0;
    db.max(A_WEIGHT_DC_DB as f64) as f32
}

/// Second-order section with transposed direct-form II state.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// High-pass section from a bilinear transform at `fs`.
    fn highpass(f0: f64, q: f64, fs: f64) -> Self {
        let k = (PI * f0 / fs).tan();
        let norm = 1.0 / (1.0 + k / q + k * k);
        Self {
            b0: norm,
            b1: -2.0 * norm,
            b2: norm,
            a1: 2.0 * (k * k - 1.0) * norm,
            a2: (1.0 - k / q + k * k) * norm,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline(always)]
    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Magnitude response at `freq` for sample rate `fs`.
    fn magnitude_at(&self, freq: f64, fs: f64) -> f64 {
        let w = 2.0 * PI * freq / fs;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }

    fn scale(mut self, s: f64) -> Self {
        self.b0 *= s;
        self.b1 *= s;
        self.b2 *= s;
        self
    }
}

/// Time-domain A-weighting: two cascaded high-pass-characteristic biquads
/// covering the IEC 61672-1 low-frequency pole pairs (a double pole at
/// 20.598997 Hz, and the 107.65265 / 737.86223 Hz pair collapsed into one
/// section), with unity gain at 1 kHz.
///
/// Coefficients are fixed at the 48 kHz reference rate; at other device
/// rates the curve shifts slightly, which is accepted. Filter state persists
/// across blocks and is owned by a single processing call site.
pub struct AWeightingFilter {
    stages: [Biquad; 2],
}

impl AWeightingFilter {
    pub fn new() -> Self {
        let fs = WEIGHTING_REFERENCE_RATE_HZ;
        let low = Biquad::highpass(20.598_997, 0.5, fs);

        let f_mid = (107.652_65f64 * 737.862_23).sqrt();
        let q_mid = f_mid / (107.652_65 + 737.862_23);
        let mid = Biquad::highpass(f_mid, q_mid, fs);

        // Unity gain at the 1 kHz reference.
        let gain = low.magnitude_at(1000.0, fs) * mid.magnitude_at(1000.0, fs);
        let low = low.scale(1.0 / gain);

        Self { stages: [low, mid] }
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let mut acc = sample as f64;
        for stage in &mut self.stages {
            acc = stage.process(acc);
        }
        acc as f32
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.z1 = 0.0;
            stage.z2 = 0.0;
        }
    }
}

impl Default for AWeightingFilter {
    fn default() -> Self {
        Self::new()
    }
}
