use std::sync::Arc;

use rta_dsp::config::ResponseTime;
use rta_dsp::types::FrequencyData;

/// Configuration changes applied in place by the running analysis worker,
/// each independently applicable at any time.
///
/// `fft_size` is deliberately absent: changing it resizes every analysis
/// buffer, so it only travels through worker construction and the controller
/// performs the change as a stop+restart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigUpdate {
    SetUpdateRate(f32),
    SetAWeighting(bool),
    SetSmoothing(f32),
    SetResponseTime(ResponseTime),
    SetCalibrationOffset(f32),
}

/// Results flowing up from the worker and the capture thread. Errors travel
/// as data; no panic crosses the real-time boundary in either direction.
#[derive(Debug, Clone)]
pub enum AnalyzerEvent {
    FrequencyData(Arc<FrequencyData>),
    Error(String),
}
