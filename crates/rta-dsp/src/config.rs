use serde::{Deserialize, Serialize};

use rta_foundation::ConfigError;

use super::constants::MAX_UPDATE_RATE_HZ;

/// Supported FFT sizes. Invalid sizes are unrepresentable; `TryFrom<usize>`
/// is the validation point at the configuration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum FftSize {
    N256 = 256,
    N512 = 512,
    N1024 = 1024,
    N2048 = 2048,
    N4096 = 4096,
    N8192 = 8192,
}

impl FftSize {
    pub fn as_usize(self) -> usize {
        self as usize
    }

    /// Number of output spectrum bins (fft_size / 2).
    pub fn bins(self) -> usize {
        self.as_usize() / 2
    }
}

impl Default for FftSize {
    fn default() -> Self {
        Self::N2048
    }
}

impl TryFrom<usize> for FftSize {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            256 => Ok(Self::N256),
            512 => Ok(Self::N512),
            1024 => Ok(Self::N1024),
            2048 => Ok(Self::N2048),
            4096 => Ok(Self::N4096),
            8192 => Ok(Self::N8192),
            other => Err(ConfigError::UnsupportedFftSize(other)),
        }
    }
}

impl From<FftSize> for usize {
    fn from(value: FftSize) -> Self {
        value.as_usize()
    }
}

/// Display response. Slow pins the smoothing factor for meter-style ballistics;
/// Fast keeps the configured factor, floored against flicker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTime {
    Fast,
    Slow,
}

impl Default for ResponseTime {
    fn default() -> Self {
        Self::Fast
    }
}

/// Analyzer configuration. Owned by the controller; changes travel to the
/// running worker as discrete messages, never as shared mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub fft_size: FftSize,
    /// Target analysis ticks per second.
    pub update_rate: f32,
    /// Temporal blend factor for the displayed spectrum, 0..=1.
    pub smoothing: f32,
    /// Apply A-weighting to the displayed spectrum. SPL/Leq are always
    /// A-weighted regardless of this flag.
    pub use_a_weighting: bool,
    pub response_time: ResponseTime,
    /// Additive dB offset applied to reported SPL and Leq.
    pub calibration_offset_db: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: FftSize::default(),
            update_rate: 30.0,
            smoothing: 0.8,
            use_a_weighting: true,
            response_time: ResponseTime::default(),
            calibration_offset_db: 0.0,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_smoothing(self.smoothing)?;
        validate_update_rate(self.update_rate)?;
        Ok(())
    }
}

/// All-`Option` mirror of [`AnalysisConfig`] for partial updates. Unset
/// fields leave the current values untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfigPatch {
    pub fft_size: Option<FftSize>,
    pub update_rate: Option<f32>,
    pub smoothing: Option<f32>,
    pub use_a_weighting: Option<bool>,
    pub response_time: Option<ResponseTime>,
    pub calibration_offset_db: Option<f32>,
}

impl AnalysisConfigPatch {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(s) = self.smoothing {
            validate_smoothing(s)?;
        }
        if let Some(r) = self.update_rate {
            validate_update_rate(r)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, config: &AnalysisConfig) -> AnalysisConfig {
        AnalysisConfig {
            fft_size: self.fft_size.unwrap_or(config.fft_size),
            update_rate: self.update_rate.unwrap_or(config.update_rate),
            smoothing: self.smoothing.unwrap_or(config.smoothing),
            use_a_weighting: self.use_a_weighting.unwrap_or(config.use_a_weighting),
            response_time: self.response_time.unwrap_or(config.response_time),
            calibration_offset_db: self
                .calibration_offset_db
                .unwrap_or(config.calibration_offset_db),
        }
    }
}

fn validate_smoothing(smoothing: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&smoothing) || smoothing.is_nan() {
        return Err(ConfigError::SmoothingOutOfRange(smoothing));
    }
    Ok(())
}

fn validate_update_rate(rate: f32) -> Result<(), ConfigError> {
    if !(rate > 0.0 && rate <= MAX_UPDATE_RATE_HZ) {
        return Err(ConfigError::UpdateRateOutOfRange(rate));
    }
    Ok(())
}
