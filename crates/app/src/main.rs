use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use rta_app::config_file::Settings;
use rta_app::runtime::Analyzer;
use rta_audio::{list_input_devices, AnalyzerEvent};
use rta_dsp::config::{AnalysisConfig, FftSize, ResponseTime};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResponseArg {
    Fast,
    Slow,
}

impl From<ResponseArg> for ResponseTime {
    fn from(value: ResponseArg) -> Self {
        match value {
            ResponseArg::Fast => ResponseTime::Fast,
            ResponseArg::Slow => ResponseTime::Slow,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rta", about = "Real-time audio analyzer: spectrum, SPL and Leq")]
struct Cli {
    /// Input device name (as shown by --list-devices)
    #[arg(short = 'D', long, env = "RTA_DEVICE")]
    device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// FFT size (256, 512, 1024, 2048, 4096 or 8192)
    #[arg(long)]
    fft_size: Option<usize>,

    /// Analysis ticks per second
    #[arg(long)]
    update_rate: Option<f32>,

    /// Spectrum smoothing factor, 0..=1
    #[arg(long)]
    smoothing: Option<f32>,

    /// Apply A-weighting to the displayed spectrum
    #[arg(long)]
    a_weighting: Option<bool>,

    /// Display response ballistics
    #[arg(long, value_enum)]
    response: Option<ResponseArg>,

    /// Calibration offset in dB added to SPL and Leq
    #[arg(long)]
    calibration: Option<f32>,

    /// Stop after this many seconds (runs until Ctrl-C when absent)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "rta.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(_guard);
    Ok(())
}

/// Settings file first, CLI flags on top.
fn resolve_config(cli: &Cli, settings: &Settings) -> Result<AnalysisConfig, anyhow::Error> {
    let mut config = settings.analysis;
    if let Some(size) = cli.fft_size {
        config.fft_size = FftSize::try_from(size)?;
    }
    if let Some(rate) = cli.update_rate {
        config.update_rate = rate;
    }
    if let Some(smoothing) = cli.smoothing {
        config.smoothing = smoothing;
    }
    if let Some(weighting) = cli.a_weighting {
        config.use_a_weighting = weighting;
    }
    if let Some(response) = cli.response {
        config.response_time = response.into();
    }
    if let Some(offset) = cli.calibration {
        config.calibration_offset_db = offset;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let cli = Cli::parse();

    if cli.list_devices {
        for device in list_input_devices()? {
            let marker = if device.is_default { "*" } else { " " };
            match &device.default_config {
                Some(cfg) => println!("{} {}  [{}]", marker, device.name, cfg),
                None => println!("{} {}", marker, device.name),
            }
        }
        return Ok(());
    }

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let config = resolve_config(&cli, &settings)?;
    let device_name = cli.device.clone().or_else(|| settings.device.clone());

    tracing::info!("Starting rta");
    let mut analyzer = Analyzer::new(config)?.with_device(device_name);
    analyzer.start().await?;

    if let Some(device) = analyzer.current_device() {
        tracing::info!(
            sample_rate = device.sample_rate,
            channels = device.channels,
            fft_size = config.fft_size.as_usize(),
            "Analyzer running"
        );
    }

    let deadline = cli
        .duration
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut events = analyzer.subscribe();
    let mut display = tokio::time::interval(Duration::from_millis(250));
    let mut stats = tokio::time::interval(Duration::from_secs(30));
    let metrics = analyzer.metrics();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down");
                break;
            }
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                tracing::info!("Duration elapsed, shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(AnalyzerEvent::Error(message)) => {
                        tracing::warn!("Analyzer error: {}", message);
                    }
                    Ok(AnalyzerEvent::FrequencyData(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Display fell behind the event stream");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        tracing::error!("Event stream closed unexpectedly");
                        break;
                    }
                }
            }
            _ = display.tick() => {
                match analyzer.frequency_data() {
                    Some(data) => {
                        let peak = data
                            .peak()
                            .map(|(freq, db)| format!("{:7.1} Hz {:6.1} dB", freq, db))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "SPL {:6.1} dB  Leq {:6.1} dB  peak {}",
                            data.spl, data.leq, peak
                        );
                    }
                    None => match analyzer.last_error() {
                        Some(message) => println!("no signal ({})", message),
                        None => println!("no signal"),
                    },
                }
            }
            _ = stats.tick() => {
                use std::sync::atomic::Ordering;
                tracing::info!(
                    callbacks = metrics.capture_callbacks.load(Ordering::Relaxed),
                    captured = metrics.samples_captured.load(Ordering::Relaxed),
                    dropped = metrics.samples_dropped.load(Ordering::Relaxed),
                    ticks = metrics.ticks.load(Ordering::Relaxed),
                    tick_errors = metrics.tick_errors.load(Ordering::Relaxed),
                    ring_fill = metrics.ring_fill.load(Ordering::Relaxed),
                    spl = metrics.current_spl_db(),
                    leq = metrics.current_leq_db(),
                    "Pipeline stats"
                );
            }
        }
    }

    analyzer.stop();
    Ok(())
}
