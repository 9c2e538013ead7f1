use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use rta_dsp::config::AnalysisConfig;
use rta_dsp::constants::DEFAULT_LEQ_WINDOW_SECS;
use rta_dsp::fft::{bin_frequencies, SpectrumEngine};
use rta_dsp::levels::{spl_db, LeqAccumulator};
use rta_dsp::smoothing::{effective_smoothing, SpectrumSmoother};
use rta_dsp::types::FrequencyData;
use rta_dsp::weighting::{a_weight_db, AWeightingFilter};
use rta_telemetry::{AnalyzerMetrics, FpsTracker};

use crate::capture::DeviceConfig;
use crate::protocol::{AnalyzerEvent, ConfigUpdate};
use crate::ring_buffer::AudioConsumer;
use crate::sample_ring::SampleRing;

/// How many samples we pull from the transport ring per drain pass.
const DRAIN_CHUNK: usize = 4096;

/// Sleep when the ring is empty; keeps worst-case added latency around one
/// poll at the default update rate.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// The streaming analysis worker. Drains the capture ring, folds frames to
/// mono, maintains the analysis window and level accumulators, and publishes
/// one `FrequencyData` snapshot per tick on the broadcast channel.
///
/// All fields that depend on `fft_size` are built in the worker from the
/// config it was constructed with; the in-place updates on `config_rx` never
/// resize anything.
pub struct AnalysisProcessor {
    consumer: AudioConsumer,
    config_rx: Receiver<ConfigUpdate>,
    event_tx: broadcast::Sender<AnalyzerEvent>,
    config: AnalysisConfig,
    device: DeviceConfig,
    leq_window: Duration,
    metrics: Option<Arc<AnalyzerMetrics>>,
}

impl AnalysisProcessor {
    pub fn new(
        consumer: AudioConsumer,
        config_rx: Receiver<ConfigUpdate>,
        event_tx: broadcast::Sender<AnalyzerEvent>,
        config: AnalysisConfig,
        device: DeviceConfig,
    ) -> Self {
        Self {
            consumer,
            config_rx,
            event_tx,
            config,
            device,
            leq_window: Duration::from_secs(DEFAULT_LEQ_WINDOW_SECS),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AnalyzerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_leq_window(mut self, window: Duration) -> Self {
        self.leq_window = window;
        self
    }

    /// Spawn the worker on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut worker = ProcessorWorker::new(
                self.consumer,
                self.config_rx,
                self.event_tx,
                self.config,
                self.device,
                self.leq_window,
                self.metrics,
            );
            tracing::info!(
                fft_size = worker.config.fft_size.as_usize(),
                sample_rate = worker.device.sample_rate,
                update_rate = worker.config.update_rate,
                "Analysis worker started"
            );
            worker.run().await;
        })
    }
}

struct ProcessorWorker {
    consumer: AudioConsumer,
    config_rx: Receiver<ConfigUpdate>,
    event_tx: broadcast::Sender<AnalyzerEvent>,
    config: AnalysisConfig,
    device: DeviceConfig,
    metrics: Option<Arc<AnalyzerMetrics>>,

    engine: SpectrumEngine,
    smoother: SpectrumSmoother,
    weighting: AWeightingFilter,
    /// Per-bin A-weighting offsets in dB, added to the raw spectrum when
    /// weighting is enabled.
    weight_offsets: Vec<f32>,
    /// Bin center frequencies, cloned into every published snapshot.
    frequencies: Vec<f32>,
    ring: SampleRing,
    leq: LeqAccumulator,

    /// Scratch for the drain pass and for carrying a partial interleaved
    /// frame across reads.
    drain_buf: Vec<f32>,
    interleaved: Vec<f32>,
    scratch_db: Vec<f32>,

    /// Samples per analysis tick at the device rate.
    tick_interval: usize,
    samples_since_tick: usize,
    /// Sum of squared A-weighted samples over the current tick interval.
    interval_sumsq: f64,
    interval_count: usize,
    /// Total mono samples ingested; the snapshot timestamp derives from this
    /// so it is monotone even when wall-clock scheduling jitters.
    samples_total: u64,
    fps: FpsTracker,
}

impl ProcessorWorker {
    fn new(
        consumer: AudioConsumer,
        config_rx: Receiver<ConfigUpdate>,
        event_tx: broadcast::Sender<AnalyzerEvent>,
        config: AnalysisConfig,
        device: DeviceConfig,
        leq_window: Duration,
        metrics: Option<Arc<AnalyzerMetrics>>,
    ) -> Self {
        let fft_size = config.fft_size.as_usize();
        let sample_rate = device.sample_rate as f32;
        let frequencies = bin_frequencies(sample_rate, config.fft_size);
        let weight_offsets: Vec<f32> = frequencies.iter().map(|&f| a_weight_db(f)).collect();
        let window_samples = (leq_window.as_secs_f64() * device.sample_rate as f64) as usize;

        Self {
            consumer,
            config_rx,
            event_tx,
            config,
            device,
            metrics,
            engine: SpectrumEngine::new(config.fft_size),
            smoother: SpectrumSmoother::new(),
            weighting: AWeightingFilter::new(),
            weight_offsets,
            frequencies,
            ring: SampleRing::new(fft_size * 2),
            leq: LeqAccumulator::new(window_samples),
            drain_buf: vec![0.0; DRAIN_CHUNK],
            interleaved: Vec::with_capacity(DRAIN_CHUNK),
            scratch_db: vec![0.0; fft_size / 2],
            tick_interval: tick_interval(device.sample_rate, config.update_rate),
            samples_since_tick: 0,
            interval_sumsq: 0.0,
            interval_count: 0,
            samples_total: 0,
            fps: FpsTracker::new(),
        }
    }

    async fn run(&mut self) {
        loop {
            self.apply_config_updates();

            let read = self.consumer.read(&mut self.drain_buf);
            if read == 0 {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            self.ingest(read);

            if let Some(metrics) = &self.metrics {
                let fill = (self.consumer.slots() * 100) / self.consumer.capacity().max(1);
                metrics.update_ring_fill(fill);
            }

            if self.samples_since_tick >= self.tick_interval {
                self.tick();
            }
        }
    }

    fn apply_config_updates(&mut self) {
        while let Ok(update) = self.config_rx.try_recv() {
            tracing::debug!(?update, "Applying config update");
            match update {
                ConfigUpdate::SetUpdateRate(rate) => {
                    self.config.update_rate = rate;
                    self.tick_interval = tick_interval(self.device.sample_rate, rate);
                }
                ConfigUpdate::SetAWeighting(enabled) => {
                    self.config.use_a_weighting = enabled;
                }
                ConfigUpdate::SetSmoothing(smoothing) => {
                    self.config.smoothing = smoothing;
                }
                ConfigUpdate::SetResponseTime(response) => {
                    self.config.response_time = response;
                }
                ConfigUpdate::SetCalibrationOffset(offset) => {
                    self.config.calibration_offset_db = offset;
                }
            }
        }
    }

    /// Fold the freshly drained interleaved frames to mono, push them into
    /// the analysis window, and run each through the time-domain weighting
    /// filter for the level path.
    fn ingest(&mut self, read: usize) {
        self.interleaved.extend_from_slice(&self.drain_buf[..read]);

        let channels = self.device.channels.max(1) as usize;
        let frames = self.interleaved.len() / channels;
        if frames == 0 {
            return;
        }
        let consumed = frames * channels;

        for frame in self.interleaved[..consumed].chunks_exact(channels) {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            self.ring.push(&[mono]);

            let weighted = self.weighting.process(mono) as f64;
            self.interval_sumsq += weighted * weighted;
            self.interval_count += 1;

            self.samples_since_tick += 1;
            self.samples_total += 1;
        }
        // Keep the partial frame (if any) for the next drain.
        self.interleaved.drain(..consumed);
    }

    /// Runs at most once per drain pass. The counter resets to zero rather
    /// than carrying a remainder: a backlogged drain spanning several
    /// intervals yields one tick covering all of it, and every tick covers
    /// at least one sample.
    fn tick(&mut self) {
        self.samples_since_tick = 0;

        match self.analyze() {
            Ok(data) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_ticks();
                    metrics.update_levels(data.spl, data.leq);
                    if let Some(fps) = self.fps.tick() {
                        metrics.update_tick_fps(fps);
                    }
                }
                // No subscribers is not an error; snapshots are fire-and-forget.
                let _ = self.event_tx.send(AnalyzerEvent::FrequencyData(data));
            }
            Err(msg) => {
                tracing::warn!("Analysis tick failed: {}", msg);
                if let Some(metrics) = &self.metrics {
                    metrics.increment_tick_errors();
                }
                let _ = self.event_tx.send(AnalyzerEvent::Error(msg));
            }
        }

        self.interval_sumsq = 0.0;
        self.interval_count = 0;
    }

    fn analyze(&mut self) -> Result<Arc<FrequencyData>, String> {
        let fft_size = self.config.fft_size.as_usize();
        let mut samples = vec![0.0f32; fft_size];
        self.ring.copy_latest(&mut samples);

        let raw = self
            .engine
            .magnitudes_db(&samples)
            .map_err(|e| e.to_string())?;
        self.scratch_db.copy_from_slice(raw);

        if self.config.use_a_weighting {
            for (db, offset) in self.scratch_db.iter_mut().zip(&self.weight_offsets) {
                *db += offset;
            }
        }

        let alpha = effective_smoothing(self.config.smoothing, self.config.response_time);
        let magnitudes = self.smoother.apply(&self.scratch_db, alpha).to_vec();

        // Level path: interval-wide RMS of the weighted signal, so slow
        // update rates still account for every sample.
        let count = self.interval_count.max(1);
        let mean_square = self.interval_sumsq / count as f64;
        let rms = mean_square.sqrt() as f32;
        let spl = spl_db(rms, self.config.calibration_offset_db);

        self.leq.push(mean_square, self.interval_count);
        let leq = self.leq.leq_db(self.config.calibration_offset_db);

        Ok(Arc::new(FrequencyData {
            frequencies: self.frequencies.clone(),
            magnitudes,
            sample_rate: self.device.sample_rate as f32,
            timestamp: self.samples_total as f64 / self.device.sample_rate as f64,
            spl,
            leq,
        }))
    }
}

fn tick_interval(sample_rate: u32, update_rate: f32) -> usize {
    ((sample_rate as f32 / update_rate).round() as usize).max(1)
}
