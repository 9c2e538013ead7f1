use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared metrics for cross-thread pipeline monitoring.
///
/// The capture callback and the analysis worker only touch atomics here, so
/// updates are safe from the real-time edge.
#[derive(Clone)]
pub struct AnalyzerMetrics {
    // Capture side
    pub capture_callbacks: Arc<AtomicU64>,
    pub samples_captured: Arc<AtomicU64>,
    pub samples_dropped: Arc<AtomicU64>,

    // Analysis side
    pub ticks: Arc<AtomicU64>,
    pub tick_errors: Arc<AtomicU64>,
    pub tick_fps: Arc<AtomicU64>,    // ticks per second * 10
    pub ring_fill: Arc<AtomicUsize>, // transport ring fill %

    // Latest levels, dB * 10 for fixed-point storage
    pub spl_db: Arc<AtomicI64>,
    pub leq_db: Arc<AtomicI64>,

    pub last_tick_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for AnalyzerMetrics {
    fn default() -> Self {
        Self {
            capture_callbacks: Arc::new(AtomicU64::new(0)),
            samples_captured: Arc::new(AtomicU64::new(0)),
            samples_dropped: Arc::new(AtomicU64::new(0)),

            ticks: Arc::new(AtomicU64::new(0)),
            tick_errors: Arc::new(AtomicU64::new(0)),
            tick_fps: Arc::new(AtomicU64::new(0)),
            ring_fill: Arc::new(AtomicUsize::new(0)),

            spl_db: Arc::new(AtomicI64::new(-1060)),
            leq_db: Arc::new(AtomicI64::new(-1060)),

            last_tick_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl AnalyzerMetrics {
    pub fn increment_callbacks(&self) {
        self.capture_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_samples_captured(&self, count: u64) {
        self.samples_captured.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_samples_dropped(&self, count: u64) {
        self.samples_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick_time.write() = Some(Instant::now());
    }

    pub fn increment_tick_errors(&self) {
        self.tick_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_tick_fps(&self, fps: f64) {
        self.tick_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn update_ring_fill(&self, fill_percent: usize) {
        self.ring_fill.store(fill_percent.min(100), Ordering::Relaxed);
    }

    pub fn update_levels(&self, spl_db: f32, leq_db: f32) {
        self.spl_db.store((spl_db * 10.0) as i64, Ordering::Relaxed);
        self.leq_db.store((leq_db * 10.0) as i64, Ordering::Relaxed);
    }

    pub fn current_spl_db(&self) -> f32 {
        self.spl_db.load(Ordering::Relaxed) as f32 / 10.0
    }

    pub fn current_leq_db(&self) -> f32 {
        self.leq_db.load(Ordering::Relaxed) as f32 / 10.0
    }
}

#[derive(Debug)]
pub struct FpsTracker {
    last_update: Instant,
    frame_count: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    /// Count one frame; returns the measured rate once per second.
    pub fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.frame_count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}
