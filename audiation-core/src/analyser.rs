//! # Analyser Module
//!
//! Per-tick view of the live input. The capture callback pushes sample
//! blocks over a channel; each tick the session drains the channel into a
//! fixed-size window and reads either the raw time-domain window (pitch
//! path) or a smoothed, byte-scaled magnitude spectrum (chord path).

use crate::fft::{magnitudes_to_bytes, SpectrumAnalyzer};
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyserConfig {
    /// Window length in samples; a power of two
    pub fft_size: usize,
    /// Floor of the byte-scaled spectrum
    pub min_decibels: f32,
    /// Ceiling of the byte-scaled spectrum
    pub max_decibels: f32,
    /// Weight of the previous spectrum when averaging, `[0, 1)`
    pub smoothing_time_constant: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing_time_constant: 0.8,
        }
    }
}

pub struct Analyser {
    config: AnalyserConfig,
    samples: Receiver<Vec<f32>>,
    sample_rate: u32,
    window: Vec<f32>,
    spectrum: SpectrumAnalyzer,
    smoothed: Vec<f32>,
    closed: bool,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("config", &self.config)
            .field("sample_rate", &self.sample_rate)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Analyser {
    pub fn new(samples: Receiver<Vec<f32>>, sample_rate: u32, config: AnalyserConfig) -> Self {
        let fft_size = config.fft_size.max(2);
        Self {
            config: AnalyserConfig { fft_size, ..config },
            samples,
            sample_rate,
            window: vec![0.0; fft_size],
            spectrum: SpectrumAnalyzer::new(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Moves every queued block into the window. Returns the number of new
    /// samples. A disconnected sender closes the analyser.
    pub fn poll(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        let mut received = 0;
        loop {
            match self.samples.try_recv() {
                Ok(block) => {
                    received += block.len();
                    self.window.extend_from_slice(&block);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Sample channel disconnected, closing analyser");
                    self.closed = true;
                    break;
                }
            }
        }
        let excess = self.window.len().saturating_sub(self.config.fft_size);
        if excess > 0 {
            self.window.drain(..excess);
        }
        trace!("Analyser received {} samples", received);
        received
    }

    /// Most recent `fft_size` samples, oldest first.
    pub fn time_domain(&self) -> &[f32] {
        &self.window
    }

    /// Time-averaged spectrum mapped onto 0-255 through the decibel window.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let current = self.spectrum.magnitudes(&self.window);
        let tau = self.config.smoothing_time_constant.clamp(0.0, 0.999);
        for (avg, mag) in self.smoothed.iter_mut().zip(current) {
            *avg = tau * *avg + (1.0 - tau) * mag;
        }
        magnitudes_to_bytes(&self.smoothed, self.config.min_decibels, self.config.max_decibels)
    }

    /// Stops reading and clears the window. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.window.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        while self.samples.try_recv().is_ok() {}
    }
}
