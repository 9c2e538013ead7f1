//! Numeric reference constants for the analysis pipeline.

/// Floor applied to linear magnitudes and RMS before the 20*log10 conversion.
/// Keeps silence at a finite dB value instead of -inf.
pub const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Floor applied to mean-square pressure before the 10*log10 conversion.
pub const POWER_EPSILON: f64 = 1e-20;

/// dB-SPL reference: 94 dB corresponds to 1 Pa at the assumed full-scale
/// mapping of the input signal.
pub const SPL_REFERENCE_DB: f32 = 94.0;

/// Default Leq integration window (30 minutes).
pub const DEFAULT_LEQ_WINDOW_SECS: u64 = 30 * 60;

/// Smoothing factor forced by the Slow response setting.
pub const SLOW_ALPHA: f32 = 0.95;

/// Minimum smoothing factor under the Fast response setting. Anything lower
/// flickers visibly at display update rates.
pub const FAST_ALPHA_FLOOR: f32 = 0.3;

/// Display weighting assigned to the 0 Hz bin, where the analytic A-weighting
/// transfer function is singular.
pub const A_WEIGHT_DC_DB: f32 = -80.0;

/// Reference sample rate the time-domain A-weighting cascade is tuned for.
pub const WEIGHTING_REFERENCE_RATE_HZ: f64 = 48_000.0;

/// Upper bound for the analysis update rate (Hz).
pub const MAX_UPDATE_RATE_HZ: f32 = 120.0;
