//! Analyzer lifecycle controller: owns the capture thread, the analysis
//! worker and the channels between them, and exposes the start / stop /
//! update-config / observe surface the binary (or an embedding) drives.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use rta_audio::{
    AnalysisProcessor, AnalyzerEvent, AudioRingBuffer, CaptureThread, ConfigUpdate, DeviceConfig,
};
use rta_dsp::config::{AnalysisConfig, AnalysisConfigPatch};
use rta_dsp::constants::DEFAULT_LEQ_WINDOW_SECS;
use rta_dsp::types::FrequencyData;
use rta_foundation::{AnalyzerState, ConfigError, StartError, StateManager, UpdateError};
use rta_telemetry::AnalyzerMetrics;

/// Transport ring between the capture callback and the worker; ~1.4 s of
/// headroom at 48 kHz mono.
const TRANSPORT_RING_CAPACITY: usize = 1 << 16;

/// Broadcast depth for analyzer events. A slow subscriber lags rather than
/// backpressuring the worker.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Pipeline {
    capture: CaptureThread,
    worker: JoinHandle<()>,
    bridge: JoinHandle<()>,
    config_tx: crossbeam_channel::Sender<ConfigUpdate>,
    device: DeviceConfig,
}

/// The analyzer runtime. One instance manages at most one running pipeline;
/// `start` after `start` recycles the previous one.
///
/// The event channel is created once per instance, so subscriptions survive
/// the stop+restart an FFT size change goes through.
pub struct Analyzer {
    config: AnalysisConfig,
    leq_window: Duration,
    device_name: Option<String>,
    state: StateManager,
    metrics: Arc<AnalyzerMetrics>,
    event_tx: broadcast::Sender<AnalyzerEvent>,
    latest: watch::Sender<Option<Arc<FrequencyData>>>,
    last_error: Arc<RwLock<Option<String>>>,
    pipeline: Option<Pipeline>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (latest, _) = watch::channel(None);
        Ok(Self {
            config,
            leq_window: Duration::from_secs(DEFAULT_LEQ_WINDOW_SECS),
            device_name: None,
            state: StateManager::new(),
            metrics: Arc::new(AnalyzerMetrics::default()),
            event_tx,
            latest,
            last_error: Arc::new(RwLock::new(None)),
            pipeline: None,
        })
    }

    /// Capture from the named device instead of the host default.
    pub fn with_device(mut self, name: Option<String>) -> Self {
        self.device_name = name;
        self
    }

    pub fn with_leq_window(mut self, window: Duration) -> Self {
        self.leq_window = window;
        self
    }

    /// Open the device, spawn the capture thread and the analysis worker,
    /// and transition to Running. Restarts cleanly if already running.
    pub async fn start(&mut self) -> Result<(), StartError> {
        if self.pipeline.is_some() {
            tracing::info!("Analyzer already running, restarting");
            self.stop();
        }
        *self.last_error.write() = None;

        let (producer, consumer) = AudioRingBuffer::new(TRANSPORT_RING_CAPACITY).split();

        // The capture handshake blocks on device acquisition for up to its
        // timeout; keep that off the async workers.
        let device_name = self.device_name.clone();
        let event_tx = self.event_tx.clone();
        let metrics = self.metrics.clone();
        let (capture, device) = tokio::task::spawn_blocking(move || {
            CaptureThread::spawn(device_name, producer, event_tx, metrics)
        })
        .await
        .map_err(|e| StartError::ContextUnavailable(format!("capture spawn task failed: {e}")))??;

        let (config_tx, config_rx) = crossbeam_channel::unbounded();
        let worker = AnalysisProcessor::new(
            consumer,
            config_rx,
            self.event_tx.clone(),
            self.config,
            device,
        )
        .with_metrics(self.metrics.clone())
        .with_leq_window(self.leq_window)
        .spawn();

        let bridge = spawn_bridge(
            self.event_tx.subscribe(),
            self.latest.clone(),
            self.last_error.clone(),
        );

        self.pipeline = Some(Pipeline {
            capture,
            worker,
            bridge,
            config_tx,
            device,
        });

        if let Err(e) = self.state.transition(AnalyzerState::Running) {
            tracing::warn!("Unexpected state on start: {}", e);
        }
        Ok(())
    }

    /// Tear the pipeline down synchronously. Safe to call at any time, in
    /// any order, any number of times.
    pub fn stop(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        pipeline.worker.abort();
        pipeline.bridge.abort();
        pipeline.capture.stop();
        let _ = self.latest.send(None);
        if let Err(e) = self.state.transition(AnalyzerState::Idle) {
            tracing::warn!("Unexpected state on stop: {}", e);
        }
        tracing::info!("Analyzer stopped");
    }

    /// Merge a partial configuration change. In-place parameters reach the
    /// running worker as messages; an FFT size change rebuilds the pipeline.
    /// While idle this only updates the stored config for the next start.
    ///
    /// A failed restart leaves the analyzer idle with the merged config
    /// kept, so a later `start()` retries with the requested FFT size.
    pub async fn update_config(&mut self, patch: AnalysisConfigPatch) -> Result<(), UpdateError> {
        patch.validate()?;
        let previous = self.config;
        let next = patch.apply_to(&previous);
        if next == previous {
            return Ok(());
        }
        self.config = next;

        let fft_changed = next.fft_size != previous.fft_size;
        if fft_changed {
            if self.pipeline.is_some() {
                tracing::info!(
                    fft_size = next.fft_size.as_usize(),
                    "FFT size changed, restarting pipeline"
                );
                self.stop();
                if let Err(e) = self.start().await {
                    tracing::error!("Restart after FFT size change failed: {}", e);
                    *self.last_error.write() = Some(e.to_string());
                    return Err(UpdateError::Restart(e));
                }
            }
        } else if let Some(pipeline) = &self.pipeline {
            for update in in_place_updates(&previous, &next) {
                // The worker hanging up is handled via its own teardown.
                let _ = pipeline.config_tx.send(update);
            }
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state.current() == AnalyzerState::Running
    }

    pub fn state(&self) -> AnalyzerState {
        self.state.current()
    }

    pub fn state_changes(&self) -> crossbeam_channel::Receiver<AnalyzerState> {
        self.state.subscribe()
    }

    /// Latest published snapshot, if any arrived since the last start.
    pub fn frequency_data(&self) -> Option<Arc<FrequencyData>> {
        self.latest.borrow().clone()
    }

    /// Live event stream; every snapshot and error from the current and any
    /// future pipeline of this instance.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.event_tx.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn config(&self) -> AnalysisConfig {
        self.config
    }

    pub fn metrics(&self) -> Arc<AnalyzerMetrics> {
        self.metrics.clone()
    }

    /// Negotiated device parameters of the running pipeline.
    pub fn current_device(&self) -> Option<DeviceConfig> {
        self.pipeline.as_ref().map(|p| p.device)
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forward worker events into the observable surface: snapshots into the
/// watch cell, errors into `last_error`.
fn spawn_bridge(
    mut events: broadcast::Receiver<AnalyzerEvent>,
    latest: watch::Sender<Option<Arc<FrequencyData>>>,
    last_error: Arc<RwLock<Option<String>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AnalyzerEvent::FrequencyData(data)) => {
                    let _ = latest.send(Some(data));
                }
                Ok(AnalyzerEvent::Error(message)) => {
                    tracing::warn!("Analyzer error event: {}", message);
                    *last_error.write() = Some(message);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn in_place_updates(previous: &AnalysisConfig, next: &AnalysisConfig) -> Vec<ConfigUpdate> {
    let mut updates = Vec::new();
    if next.update_rate != previous.update_rate {
        updates.push(ConfigUpdate::SetUpdateRate(next.update_rate));
    }
    if next.use_a_weighting != previous.use_a_weighting {
        updates.push(ConfigUpdate::SetAWeighting(next.use_a_weighting));
    }
    if next.smoothing != previous.smoothing {
        updates.push(ConfigUpdate::SetSmoothing(next.smoothing));
    }
    if next.response_time != previous.response_time {
        updates.push(ConfigUpdate::SetResponseTime(next.response_time));
    }
    if next.calibration_offset_db != previous.calibration_offset_db {
        updates.push(ConfigUpdate::SetCalibrationOffset(next.calibration_offset_db));
    }
    updates
}
