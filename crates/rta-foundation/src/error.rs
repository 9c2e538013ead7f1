use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Input device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("No input device available")]
    NoInputDevice,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("No device configuration within {timeout:?}")]
    HandshakeTimeout { timeout: Duration },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Devices error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Failure surfaced by `Analyzer::start()`. State stays Idle; the caller
/// decides whether to retry.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Real-time context unavailable: {0}")]
    ContextUnavailable(String),
}

/// Failure surfaced by `Analyzer::update_config()`: either the patch was
/// rejected up front, or the stop+restart an FFT size change goes through
/// failed and the analyzer is now idle.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Restart after FFT size change failed: {0}")]
    Restart(#[from] StartError),
}

/// Rejected before any message reaches the running worker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unsupported FFT size: {0} (expected a power of two in 256..=8192)")]
    UnsupportedFftSize(usize),

    #[error("Smoothing out of range: {0} (expected 0.0..=1.0)")]
    SmoothingOutOfRange(f32),

    #[error("Update rate out of range: {0} (expected 0 < rate <= 120 Hz)")]
    UpdateRateOutOfRange(f32),
}
