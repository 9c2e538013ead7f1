use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;

use rta_foundation::AudioError;
use rta_telemetry::AnalyzerMetrics;

use crate::device::open_input_device;
use crate::protocol::AnalyzerEvent;
use crate::ring_buffer::AudioProducer;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Negotiated device parameters; these size every downstream buffer.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to the dedicated capture thread. The thread owns the `cpal::Stream`
/// (it is !Send); the callback is the hard-real-time edge and only converts
/// the device sample format to f32 and writes into the transport ring. No
/// locks, no allocation, no audible output.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureThread {
    /// Spawn the capture thread and wait for its device handshake. Returns
    /// the actual negotiated configuration, or the startup error if the
    /// device could not be opened within the timeout.
    pub fn spawn(
        device_name: Option<String>,
        producer: AudioProducer,
        event_tx: broadcast::Sender<AnalyzerEvent>,
        metrics: Arc<AnalyzerMetrics>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();
        let (ready_tx, ready_rx) = bounded::<Result<DeviceConfig, AudioError>>(1);

        let handle = thread::Builder::new()
            .name("rta-capture".to_string())
            .spawn(move || {
                match build_and_play(
                    device_name.as_deref(),
                    producer,
                    event_tx,
                    metrics,
                    shutdown_flag.clone(),
                ) {
                    Ok((stream, config)) => {
                        let _ = ready_tx.send(Ok(config));
                        // Park until shutdown; the stream keeps running on
                        // its own callback thread.
                        while !shutdown_flag.load(Ordering::SeqCst) {
                            thread::sleep(Duration::from_millis(100));
                        }
                        drop(stream);
                        tracing::info!("Capture thread shutting down");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv_timeout(HANDSHAKE_TIMEOUT) {
            Ok(Ok(config)) => {
                tracing::info!(
                    sample_rate = config.sample_rate,
                    channels = config.channels,
                    "Capture stream started"
                );
                Ok((Self { handle, shutdown }, config))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::HandshakeTimeout {
                    timeout: HANDSHAKE_TIMEOUT,
                })
            }
        }
    }

    /// Flip the shutdown flag and join, releasing the stream synchronously
    /// so a subsequent start does not race a lingering teardown.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn build_and_play(
    device_name: Option<&str>,
    mut producer: AudioProducer,
    event_tx: broadcast::Sender<AnalyzerEvent>,
    metrics: Arc<AnalyzerMetrics>,
    shutdown: Arc<AtomicBool>,
) -> Result<(Stream, DeviceConfig), AudioError> {
    let device = open_input_device(device_name)?;
    if let Ok(name) = device.name() {
        tracing::info!("Selected input device: {}", name);
    }

    let (config, sample_format) = negotiate_config(&device)?;
    let device_config = DeviceConfig {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let err_fn = {
        let event_tx = event_tx.clone();
        move |err: cpal::StreamError| {
            tracing::error!("Audio stream error: {}", err);
            let _ = event_tx.send(AnalyzerEvent::Error(format!("audio stream error: {}", err)));
        }
    };

    // Common handler once samples are f32
    let mut handle_f32 = move |data: &[f32]| {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        metrics.increment_callbacks();
        match producer.write(data) {
            Ok(written) => metrics.add_samples_captured(written as u64),
            Err(()) => metrics.add_samples_dropped(data.len() as u64),
        }
    };

    // Use thread-local buffers to avoid allocations in the audio callback
    thread_local! {
        static CONVERT_BUFFER: std::cell::RefCell<Vec<f32>> = const { std::cell::RefCell::new(Vec::new()) };
    }

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| {
                handle_f32(data);
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| {
                CONVERT_BUFFER.with(|buf| {
                    let mut converted = buf.borrow_mut();
                    converted.clear();
                    converted.reserve(data.len());
                    for &s in data {
                        converted.push(s as f32 / 32768.0);
                    }
                    handle_f32(&converted);
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &_| {
                CONVERT_BUFFER.with(|buf| {
                    let mut converted = buf.borrow_mut();
                    converted.clear();
                    converted.reserve(data.len());
                    // Convert unsigned [0,65535] to [-1.0,1.0)
                    for &s in data {
                        converted.push((s as f32 - 32768.0) / 32768.0);
                    }
                    handle_f32(&converted);
                });
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    stream.play()?;
    Ok((stream, device_config))
}

fn negotiate_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), AudioError> {
    // Prefer the device's default input config: its sample rate is the one
    // the rest of the pipeline sizes itself to.
    if let Ok(default_config) = device.default_input_config() {
        return Ok((
            StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }

    // Fallback to the first supported config
    if let Ok(configs) = device.supported_input_configs() {
        if let Some(config) = configs.into_iter().next() {
            return Ok((config.with_max_sample_rate().into(), config.sample_format()));
        }
    }

    Err(AudioError::FormatNotSupported {
        format: "No supported audio formats".to_string(),
    })
}
