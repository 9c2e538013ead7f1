pub mod metrics;

pub use metrics::{AnalyzerMetrics, FpsTracker};
