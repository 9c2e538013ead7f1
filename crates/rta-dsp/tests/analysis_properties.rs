//! End-to-end properties of the DSP stack: FFT amplitude anchors, level
//! floors, smoothing ballistics, Leq windowing and calibration.

use rand::{Rng, SeedableRng};

use rta_dsp::config::{FftSize, ResponseTime};
use rta_dsp::fft::{bin_frequencies, SpectrumEngine};
use rta_dsp::levels::{rms, spl_db, LeqAccumulator};
use rta_dsp::smoothing::{effective_smoothing, SpectrumSmoother};
use rta_dsp::weighting::{a_weight_db, AWeightingFilter};

fn sine(freq: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
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

// ─── FFT correctness ────────────────────────────────────────────────────────

#[test]
fn sine_peak_lands_on_its_bin_for_every_size() {
    for fft_size in [FftSize::N256, FftSize::N1024, FftSize::N4096] {
        let n = fft_size.as_usize();
        let sample_rate = 48_000.0;
        // Exact-bin sine: frequency = 10 bins worth of resolution.
        let freq = 10.0 * sample_rate / n as f32;
        let block = sine(freq, 1.0, sample_rate, n);

        let mut engine = SpectrumEngine::new(fft_size);
        let mags = engine.magnitudes_db(&block).unwrap();

        assert_eq!(mags.len(), n / 2);
        assert_eq!(argmax(mags), 10, "peak bin wrong for fft_size {n}");

        // Amplitude 1.0 minus the Hann coherent-gain loss (~6.02 dB), the
        // same at every FFT size thanks to amplitude normalization.
        let peak_db = mags[10];
        assert!(
            (peak_db - (-6.02)).abs() < 0.2,
            "fft_size {n}: expected about -6.02 dB, got {peak_db}"
        );
    }
}

#[test]
fn scenario_1khz_tone_2048_at_48khz() {
    let sample_rate = 48_000.0;
    let fft_size = FftSize::N2048;
    let block = sine(1000.0, 0.5, sample_rate, fft_size.as_usize());

    let mut engine = SpectrumEngine::new(fft_size);
    let mags = engine.magnitudes_db(&block).unwrap();

    // round(1000 * 2048 / 48000) = 43
    assert_eq!(argmax(mags), 43);

    let freqs = bin_frequencies(sample_rate, fft_size);
    assert!((freqs[43] - 1007.8).abs() < 1.0);
}

#[test]
fn scenario_1khz_spl_and_leq_agree() {
    let sample_rate = 48_000.0;
    let signal = sine(1000.0, 0.5, sample_rate, 96_000);

    // SPL/Leq path: A-weighting first (roughly transparent at 1 kHz).
    let mut filter = AWeightingFilter::new();
    let weighted: Vec<f32> = signal.iter().map(|&s| filter.process(s)).collect();

    // Skip the filter transient, then evaluate in tick-sized chunks.
    let mut acc = LeqAccumulator::new(48_000 * 10);
    let mut last_spl = 0.0f32;
    for chunk in weighted[4800..].chunks(1600) {
        let r = rms(chunk);
        last_spl = spl_db(r, 0.0);
        acc.push((r as f64) * (r as f64), chunk.len());
    }
    let leq = acc.leq_db(0.0);

    // 20*log10(0.5 / sqrt(2)) + 94 = 84.97 dB.
    assert!((last_spl - 84.97).abs() < 0.5, "spl was {last_spl}");
    assert!((leq - 84.97).abs() < 0.5, "leq was {leq}");
    assert!((last_spl - leq).abs() < 0.5);
}

// ─── Silence and floors ─────────────────────────────────────────────────────

#[test]
fn all_zero_input_respects_the_numeric_floor() {
    let silence = vec![0.0f32; 2048];

    let spl = spl_db(rms(&silence), 0.0);
    assert!(spl.is_finite());
    assert!((spl - (-106.0)).abs() < 1e-3);

    let mut acc = LeqAccumulator::new(48_000);
    let r = rms(&silence);
    acc.push((r as f64) * (r as f64), silence.len());
    let leq = acc.leq_db(0.0);
    assert!(leq.is_finite());
    assert!((leq - (-106.0)).abs() < 1e-3);

    let mut engine = SpectrumEngine::new(FftSize::N2048);
    for &db in engine.magnitudes_db(&silence).unwrap() {
        assert!(db.is_finite());
    }
}

// ─── Smoothing ──────────────────────────────────────────────────────────────

#[test]
fn constant_input_converges_without_overshoot() {
    let sample_rate = 48_000.0;
    let fft_size = FftSize::N1024;
    let block = sine(3000.0, 0.8, sample_rate, fft_size.as_usize());

    let mut engine = SpectrumEngine::new(fft_size);
    let mut smoother = SpectrumSmoother::new();
    let alpha = effective_smoothing(0.8, ResponseTime::Fast);

    let raw = engine.magnitudes_db(&block).unwrap().to_vec();
    let bin = argmax(&raw);
    let target = raw[bin];

    // Seed well below the raw value, then feed the same spectrum repeatedly.
    smoother.apply(&vec![-120.0; raw.len()], alpha);
    let mut previous = -120.0f32;
    for _ in 0..100 {
        let current = smoother.apply(&raw, alpha)[bin];
        assert!(current >= previous, "smoothed value must not move away");
        assert!(current <= target + 1e-4, "smoothed value must not overshoot");
        previous = current;
    }
    assert!((previous - target).abs() < 0.5);
}

// ─── Calibration ────────────────────────────────────────────────────────────

#[test]
fn calibration_offset_is_exactly_linear() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let noise: Vec<f32> = (0..4800).map(|_| rng.gen_range(-0.5..0.5)).collect();

    let r = rms(&noise);
    for offset in [1.0f32, 7.5, -12.0] {
        assert!((spl_db(r, offset) - spl_db(r, 0.0) - offset).abs() < 1e-4);
    }

    let mut acc = LeqAccumulator::new(48_000);
    acc.push((r as f64) * (r as f64), noise.len());
    for offset in [1.0f32, 7.5, -12.0] {
        assert!((acc.leq_db(offset) - acc.leq_db(0.0) - offset).abs() < 1e-4);
    }
}

// ─── Display weighting ──────────────────────────────────────────────────────

#[test]
fn weighting_toggle_is_transparent_at_1khz_but_not_100hz() {
    // The display path adds the per-bin offset; the toggle delta at a bin is
    // exactly the offset there.
    assert!(a_weight_db(1000.0).abs() < 1.0);
    assert!(a_weight_db(100.0) < -5.0);
    // Attenuation keeps increasing as frequency drops.
    assert!(a_weight_db(50.0) < a_weight_db(100.0));
    assert!(a_weight_db(20.0) < a_weight_db(50.0));
}

#[test]
fn weighting_toggle_delta_per_tone() {
    let sample_rate = 48_000.0;
    let fft_size = FftSize::N2048;
    let freqs = bin_frequencies(sample_rate, fft_size);
    let mut engine = SpectrumEngine::new(fft_size);

    let toggle_delta_at_peak = |engine: &mut SpectrumEngine, tone_hz: f32| {
        let block = sine(tone_hz, 0.5, sample_rate, fft_size.as_usize());
        let raw = engine.magnitudes_db(&block).unwrap().to_vec();
        let bin = argmax(&raw);
        let weighted = raw[bin] + a_weight_db(freqs[bin]);
        raw[bin] - weighted
    };

    // Near-transparent at 1 kHz, several dB of attenuation at 100 Hz.
    assert!(toggle_delta_at_peak(&mut engine, 1000.0).abs() < 1.0);
    assert!(toggle_delta_at_peak(&mut engine, 100.0) > 5.0);
}
