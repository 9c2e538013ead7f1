pub mod config;
pub mod constants;
pub mod fft;
pub mod levels;
pub mod smoothing;
pub mod types;
pub mod weighting;

// Core exports - grouped and sorted alphabetically
pub use config::{AnalysisConfig, AnalysisConfigPatch, FftSize, ResponseTime};
pub use fft::SpectrumEngine;
pub use levels::LeqAccumulator;
pub use smoothing::SpectrumSmoother;
pub use types::FrequencyData;
pub use weighting::AWeightingFilter;
