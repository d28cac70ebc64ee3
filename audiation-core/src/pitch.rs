//! # Pitch Detection Module
//!
//! Monophonic fundamental-frequency estimation from a time-domain buffer.
//!
//! ## Features
//! - Lag-domain autocorrelation over `[min_lag, len)`
//! - RMS noise gate so silence never locks onto a spurious period
//! - Parabolic interpolation for sub-sample period accuracy
//!
//! Concurrent notes bias the correlation peak toward the loudest component,
//! so this path only serves single-note consumers. Chords go through the
//! spectral peak picker in [`crate::fft`].

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`detect_pitch_autocorrelation`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationConfig {
    /// Smallest lag considered. Bounds the highest detectable frequency to
    /// `sample_rate / min_lag` (about 1100 Hz at 44.1 kHz).
    pub min_lag: usize,
    /// Buffers whose RMS falls below this are treated as silence
    pub silence_rms: f32,
}

impl Default for AutocorrelationConfig {
    fn default() -> Self {
        Self {
            min_lag: 40,
            silence_rms: 0.01,
        }
    }
}

/// Root-mean-square level of a buffer.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Estimates the fundamental frequency of `signal`.
///
/// # Arguments
/// * `signal` - Time-domain samples (typically 2048)
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Lag bound and silence gate
///
/// # Returns
/// * `Some(frequency)` - Estimated fundamental in Hz
/// * `None` - Silence, or no positive correlation at any lag
///
/// The correlation is not normalised by overlap length, so short lags are
/// favoured. Tones at or below roughly 110 Hz can lock onto `min_lag` and
/// read near `sample_rate / min_lag` instead.
pub fn detect_pitch_autocorrelation(
    signal: &[f32],
    sample_rate: u32,
    config: &AutocorrelationConfig,
) -> Option<f32> {
    let len = signal.len();
    let min_lag = config.min_lag.max(1);
    if len <= min_lag + 1 || sample_rate == 0 {
        return None;
    }

    // --- Noise Gate ---
    if rms(signal) < config.silence_rms {
        return None;
    }

    // --- Correlation for every candidate lag ---
    let correlations: Vec<f32> = (min_lag..len)
        .map(|lag| {
            signal[..len - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect();

    let (best_offset, best_correlation) = correlations
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0.0_f32), |best, (i, c)| if c > best.1 { (i, c) } else { best });

    if best_correlation <= 0.0 {
        return None;
    }

    // --- Parabolic interpolation around the peak ---
    let mut period = (best_offset + min_lag) as f32;
    if best_offset > 0 && best_offset + 1 < correlations.len() {
        let y1 = correlations[best_offset - 1];
        let y2 = correlations[best_offset];
        let y3 = correlations[best_offset + 1];
        let denominator = y1 - 2.0 * y2 + y3;
        if denominator.abs() > f32::EPSILON {
            period += 0.5 * (y1 - y3) / denominator;
        }
    }

    let frequency = sample_rate as f32 / period;
    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(freq: f32, sample_rate: u32, num_samples: usize, amplitude: f32) -> Vec<f32> {
        (0..num_samples)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn detects_a440() {
        let samples = generate_sine(440.0, 44100, 2048, 0.5);
        let freq = detect_pitch_autocorrelation(&samples, 44100, &AutocorrelationConfig::default())
            .expect("pitch expected");
        assert!((freq - 440.0).abs() < 3.0, "Expected ~440 Hz, got {}", freq);
    }

    #[test]
    fn detects_low_c() {
        let samples = generate_sine(130.81, 44100, 2048, 0.5);
        let freq = detect_pitch_autocorrelation(&samples, 44100, &AutocorrelationConfig::default())
            .expect("pitch expected");
        assert!((freq - 130.81).abs() < 1.5, "Expected ~131 Hz, got {}", freq);
    }

    #[test]
    fn silence_is_gated() {
        let quiet = generate_sine(440.0, 44100, 2048, 0.001);
        assert_eq!(
            detect_pitch_autocorrelation(&quiet, 44100, &AutocorrelationConfig::default()),
            None
        );
        let zeros = vec![0.0; 2048];
        assert_eq!(
            detect_pitch_autocorrelation(&zeros, 44100, &AutocorrelationConfig::default()),
            None
        );
    }

    #[test]
    fn short_buffers_yield_nothing() {
        let samples = generate_sine(440.0, 44100, 32, 0.5);
        assert_eq!(
            detect_pitch_autocorrelation(&samples, 44100, &AutocorrelationConfig::default()),
            None
        );
    }

    #[test]
    fn rms_of_full_scale_sine() {
        let samples = generate_sine(441.0, 44100, 4410, 1.0);
        assert!((rms(&samples) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert_eq!(rms(&[]), 0.0);
    }
}
