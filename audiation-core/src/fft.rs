//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency-domain analysis for the multi-note (chord) path.
//!
//! ## Features
//! - High-performance FFT using RustFFT, plan cached per analyser
//! - DC offset removal and Hann windowing
//! - Decibel mapping onto a 0-255 byte scale, so amplitude thresholds are
//!   independent of buffer size and input gain staging
//! - Spectral peak picking (local maxima above a threshold, minimum bin
//!   separation)

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Frequency in Hz at the centre of `bin`, for a spectrum of `bin_count`
/// bins spanning DC to Nyquist.
pub fn bin_frequency(bin: usize, sample_rate: u32, bin_count: usize) -> f32 {
    if bin_count == 0 {
        return 0.0;
    }
    bin as f32 * (sample_rate as f32 / 2.0) / bin_count as f32
}

/// Forward FFT with a cached plan.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            fft,
            fft_size,
            scratch: Vec::with_capacity(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced (DC up to, not including, Nyquist).
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Normalised magnitude spectrum of `signal`.
    ///
    /// The signal is DC-corrected and Hann-windowed first. Magnitudes are
    /// scaled by `1 / fft_size`. Short inputs are zero-padded, long inputs
    /// use their most recent `fft_size` samples.
    pub fn magnitudes(&mut self, signal: &[f32]) -> Vec<f32> {
        let start = signal.len().saturating_sub(self.fft_size);
        let mut processed = signal[start..].to_vec();
        processed.resize(self.fft_size, 0.0);
        remove_dc_offset(&mut processed);
        apply_hann_window(&mut processed);

        self.scratch.clear();
        self.scratch
            .extend(processed.into_iter().map(|sample| Complex { re: sample, im: 0.0 }));
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        self.scratch
            .iter()
            .take(self.bin_count())
            .map(|c| c.norm() * scale)
            .collect()
    }
}

/// Maps linear magnitudes onto 0-255 through a decibel window.
///
/// `min_db` maps to 0 and `max_db` to 255; values outside are clamped.
pub fn magnitudes_to_bytes(magnitudes: &[f32], min_db: f32, max_db: f32) -> Vec<u8> {
    let range = (max_db - min_db).max(f32::EPSILON);
    magnitudes
        .iter()
        .map(|&m| {
            let db = 20.0 * m.max(1e-12).log10();
            let scaled = (db - min_db) / range * 255.0;
            scaled.clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Settings for [`pick_peaks`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakPickConfig {
    /// Minimum byte amplitude for a bin to count as a peak
    pub threshold: u8,
    /// A peak must be strictly louder than every bin within this distance
    pub min_distance: usize,
    /// Peaks below this frequency are discarded
    pub min_frequency: f32,
    /// Peaks above this frequency are discarded
    pub max_frequency: f32,
    /// Only the loudest peaks are kept
    pub max_peaks: usize,
}

impl Default for PeakPickConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            min_distance: 10,
            min_frequency: 80.0,
            max_frequency: 2000.0,
            max_peaks: 5,
        }
    }
}

/// A dominant component in a byte-scaled spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    pub bin: usize,
    pub frequency: f32,
    pub amplitude: u8,
}

/// Finds dominant frequency components, loudest first.
pub fn pick_peaks(spectrum: &[u8], sample_rate: u32, config: &PeakPickConfig) -> Vec<SpectralPeak> {
    let len = spectrum.len();
    let distance = config.min_distance.max(1);
    if len <= 2 * distance {
        return Vec::new();
    }

    let mut peaks: Vec<SpectralPeak> = (distance..len - distance)
        .filter(|&i| spectrum[i] > config.threshold)
        .filter(|&i| {
            (i - distance..=i + distance).all(|j| j == i || spectrum[j] < spectrum[i])
        })
        .map(|i| SpectralPeak {
            bin: i,
            frequency: bin_frequency(i, sample_rate, len),
            amplitude: spectrum[i],
        })
        .filter(|p| p.frequency >= config.min_frequency && p.frequency <= config.max_frequency)
        .collect();

    // Stable sort keeps lower bins first among equal amplitudes.
    peaks.sort_by(|a, b| b.amplitude.cmp(&a.amplitude));
    peaks.truncate(config.max_peaks);
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freqs: &[f32], amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                freqs
                    .iter()
                    .map(|f| amplitude * (2.0 * std::f32::consts::PI * f * i as f32 / sample_rate as f32).sin())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn magnitude_peak_lands_on_expected_bin() {
        let mut analyzer = SpectrumAnalyzer::new(2048);
        let mags = analyzer.magnitudes(&tone(&[1000.0], 0.3, 44100, 2048));
        assert_eq!(mags.len(), 1024);
        let (peak_bin, _) = mags
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        let expected = (1000.0 / bin_frequency(1, 44100, 1024)).round() as usize;
        assert!((peak_bin as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn byte_scale_clamps_to_window() {
        let bytes = magnitudes_to_bytes(&[0.0, 1e-5, 1.0], -100.0, -30.0);
        assert_eq!(bytes[0], 0);
        // -100 dB is the floor exactly.
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2], 255);
    }

    #[test]
    fn picks_separated_peaks_loudest_first() {
        let mut spectrum = vec![0u8; 2048];
        spectrum[40] = 120;
        spectrum[41] = 90;
        spectrum[100] = 200;
        spectrum[105] = 150; // within min_distance of the louder bin 100
        let peaks = pick_peaks(&spectrum, 44100, &PeakPickConfig::default());
        let bins: Vec<usize> = peaks.iter().map(|p| p.bin).collect();
        assert_eq!(bins, vec![100, 40]);
        assert!(peaks[0].frequency > peaks[1].frequency);
    }

    #[test]
    fn plateaus_and_quiet_bins_are_not_peaks() {
        let mut spectrum = vec![0u8; 2048];
        spectrum[60] = 100;
        spectrum[61] = 100;
        spectrum[200] = 40;
        assert!(pick_peaks(&spectrum, 44100, &PeakPickConfig::default()).is_empty());
    }

    #[test]
    fn chord_tones_produce_distinct_peaks() {
        let sample_rate = 44100;
        let mut analyzer = SpectrumAnalyzer::new(8192);
        // Bin-centred approximations of C4, E4 and G4.
        let targets: Vec<f32> = [49, 61, 73]
            .iter()
            .map(|&bin| bin_frequency(bin, sample_rate, 4096))
            .collect();
        let mags = analyzer.magnitudes(&tone(&targets, 0.002, sample_rate, 8192));
        let bytes = magnitudes_to_bytes(&mags, -100.0, -30.0);
        let config = PeakPickConfig {
            min_distance: 4,
            ..PeakPickConfig::default()
        };
        let peaks = pick_peaks(&bytes, sample_rate, &config);
        assert_eq!(peaks.len(), 3, "{:?}", peaks);
        for target in targets {
            assert!(
                peaks.iter().any(|p| (p.frequency - target).abs() < 1.0),
                "no peak near {} in {:?}",
                target,
                peaks
            );
        }
    }
}
