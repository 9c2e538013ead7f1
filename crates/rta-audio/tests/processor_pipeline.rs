//! End-to-end worker tests driven through the transport ring, no audio
//! hardware involved. A synthetic capture side writes samples into the ring
//! and the assertions run against the published snapshots.
//!
//! Bulk writes deliberately back the worker up: a single drain pass then
//! spans several tick intervals, so snapshot counts vary with scheduling.
//! Tests therefore select snapshots by `timestamp` (seconds of ingested
//! audio), never by position in the stream.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use rta_audio::{
    AnalysisProcessor, AnalyzerEvent, AudioProducer, AudioRingBuffer, ConfigUpdate, DeviceConfig,
};
use rta_dsp::config::{AnalysisConfig, FftSize};
use rta_dsp::types::FrequencyData;

const SAMPLE_RATE: u32 = 48_000;
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        fft_size: FftSize::N256,
        update_rate: 50.0,
        ..AnalysisConfig::default()
    }
}

struct TestPipeline {
    producer: AudioProducer,
    config_tx: Sender<ConfigUpdate>,
    events: broadcast::Receiver<AnalyzerEvent>,
    worker: JoinHandle<()>,
}

fn spawn_pipeline(config: AnalysisConfig, channels: u16) -> TestPipeline {
    let (producer, consumer) = AudioRingBuffer::new(1 << 18).split();
    let (config_tx, config_rx) = unbounded();
    let (event_tx, events) = broadcast::channel(512);
    let worker = AnalysisProcessor::new(
        consumer,
        config_rx,
        event_tx,
        config,
        DeviceConfig {
            sample_rate: SAMPLE_RATE,
            channels,
        },
    )
    .spawn();
    TestPipeline {
        producer,
        config_tx,
        events,
        worker,
    }
}

fn sine(freq: f32, amplitude: f32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
        })
        .collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap()
}

async fn next_data(rx: &mut broadcast::Receiver<AnalyzerEvent>) -> Arc<FrequencyData> {
    loop {
        match timeout(RECV_TIMEOUT, rx.recv()).await {
            Ok(Ok(AnalyzerEvent::FrequencyData(data))) => return data,
            Ok(Ok(AnalyzerEvent::Error(e))) => panic!("unexpected error event: {e}"),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(e)) => panic!("event channel closed: {e}"),
            Err(_) => panic!("timed out waiting for a snapshot"),
        }
    }
}

/// Consume snapshots until one covers at least `at_secs` of ingested audio.
async fn data_at(rx: &mut broadcast::Receiver<AnalyzerEvent>, at_secs: f64) -> Arc<FrequencyData> {
    loop {
        let data = next_data(rx).await;
        if data.timestamp >= at_secs {
            return data;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sine_tone_peaks_at_its_bin() {
    let config = AnalysisConfig {
        use_a_weighting: false,
        ..test_config()
    };
    let mut pipeline = spawn_pipeline(config, 1);

    // 1 s of a 3 kHz tone: bin width 187.5 Hz, so the peak lands on bin 16.
    pipeline
        .producer
        .write(&sine(3_000.0, 0.5, SAMPLE_RATE as usize))
        .unwrap();

    let last = data_at(&mut pipeline.events, 0.9).await;

    assert_eq!(last.frequencies.len(), 128);
    assert_eq!(last.magnitudes.len(), 128);
    assert_eq!(last.sample_rate, SAMPLE_RATE as f32);
    assert_eq!(argmax(&last.magnitudes), 16);
    assert!((last.frequencies[16] - 3_000.0).abs() < 1e-3);

    pipeline.worker.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_timestamps_never_go_back() {
    let mut pipeline = spawn_pipeline(test_config(), 1);
    pipeline
        .producer
        .write(&sine(1_000.0, 0.5, SAMPLE_RATE as usize))
        .unwrap();

    let mut previous = next_data(&mut pipeline.events).await.timestamp;
    loop {
        let data = next_data(&mut pipeline.events).await;
        assert!(data.timestamp >= previous, "timestamps must not go back");
        previous = data.timestamp;
        if data.timestamp >= 0.9 {
            break;
        }
    }

    pipeline.worker.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn levels_settle_at_the_tone_spl() {
    let mut pipeline = spawn_pipeline(test_config(), 1);

    // Amplitude 0.5 at 1 kHz: rms 0.354, A-weighting is unity there, so SPL
    // and Leq both settle near 84.97 dB. Selecting by timestamp skips the
    // weighting filter transient.
    pipeline
        .producer
        .write(&sine(1_000.0, 0.5, 2 * SAMPLE_RATE as usize))
        .unwrap();

    let last = data_at(&mut pipeline.events, 1.5).await;

    assert!(
        (last.spl - 84.97).abs() < 1.0,
        "spl {} not near 84.97",
        last.spl
    );
    assert!(
        (last.leq - 84.97).abs() < 1.0,
        "leq {} not near 84.97",
        last.leq
    );
    assert!((last.spl - last.leq).abs() < 1.0);

    pipeline.worker.abort();
}

/// A single write far larger than the 960-sample tick interval backs the
/// worker up across many intervals. Every published snapshot of a loud tone
/// must still report a loud level; the silence floor may never appear.
#[tokio::test(flavor = "multi_thread")]
async fn backlogged_input_never_publishes_floor_levels() {
    let mut pipeline = spawn_pipeline(test_config(), 1);

    pipeline
        .producer
        .write(&sine(1_000.0, 0.5, SAMPLE_RATE as usize))
        .unwrap();

    let mut snapshots = 0;
    loop {
        let data = next_data(&mut pipeline.events).await;
        assert!(
            data.spl > 40.0,
            "snapshot at {:.3}s reported {} dB during loud input",
            data.timestamp,
            data.spl
        );
        assert!(data.leq > 40.0);
        snapshots += 1;
        if data.timestamp >= 0.9 {
            break;
        }
    }
    assert!(snapshots >= 5, "only {snapshots} snapshots for 1 s of audio");

    pipeline.worker.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn calibration_update_applies_without_restart() {
    let mut pipeline = spawn_pipeline(test_config(), 1);

    pipeline
        .producer
        .write(&sine(1_000.0, 0.5, 2 * SAMPLE_RATE as usize))
        .unwrap();
    let baseline = data_at(&mut pipeline.events, 1.5).await.spl;

    pipeline
        .config_tx
        .send(ConfigUpdate::SetCalibrationOffset(10.0))
        .unwrap();
    pipeline
        .producer
        .write(&sine(1_000.0, 0.5, 2 * SAMPLE_RATE as usize))
        .unwrap();

    // Snapshots keep flowing while the update lands; wait for the shift.
    let mut shifted = None;
    for _ in 0..100 {
        let data = next_data(&mut pipeline.events).await;
        if (data.spl - baseline - 10.0).abs() < 0.5 {
            shifted = Some(data);
            break;
        }
    }
    let shifted = shifted.expect("calibration offset never reached the output");
    assert!((shifted.spl - 94.97).abs() < 1.5);

    pipeline.worker.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn silence_reports_the_numeric_floor() {
    let config = AnalysisConfig {
        use_a_weighting: false,
        ..test_config()
    };
    let mut pipeline = spawn_pipeline(config, 1);

    pipeline
        .producer
        .write(&vec![0.0f32; SAMPLE_RATE as usize])
        .unwrap();

    let data = next_data(&mut pipeline.events).await;
    assert!((data.spl - (-106.0)).abs() < 1e-2);
    assert!((data.leq - (-106.0)).abs() < 1e-2);
    for &db in &data.magnitudes {
        assert!(db.is_finite());
        assert!((db - (-200.0)).abs() < 1e-2, "floor bin read {db}");
    }

    pipeline.worker.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn stereo_frames_are_averaged_to_mono() {
    let mut pipeline = spawn_pipeline(test_config(), 2);

    // Interleave [s, -s]: the channel average cancels to digital silence.
    let tone = sine(440.0, 0.8, SAMPLE_RATE as usize);
    let mut interleaved = Vec::with_capacity(tone.len() * 2);
    for s in tone {
        interleaved.push(s);
        interleaved.push(-s);
    }
    pipeline.producer.write(&interleaved).unwrap();

    let last = data_at(&mut pipeline.events, 0.8).await;
    assert!((last.spl - (-106.0)).abs() < 1e-2);

    pipeline.worker.abort();
}
