//! # Tone Playback Module
//!
//! Plays reference notes. A tone is rendered up front into a sample buffer
//! (oscillator times envelope) and handed to the output stream, which
//! replaces whatever it was playing.

use crate::audio::find_supported_config;
use crate::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;

/// Oscillator shape, selectable as the "instrument".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    /// Value at `phase` in cycles; only the fractional part matters.
    pub fn sample(&self, phase: f32) -> f32 {
        let p = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (2.0 * PI * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Sawtooth => "Sawtooth",
            Waveform::Triangle => "Triangle",
        };
        f.write_str(name)
    }
}

/// Linear attack to `peak_gain`, then exponential decay reaching
/// `floor_gain` at the end of the tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneEnvelope {
    pub attack_ms: f32,
    pub peak_gain: f32,
    pub floor_gain: f32,
}

impl Default for ToneEnvelope {
    fn default() -> Self {
        Self {
            attack_ms: 100.0,
            peak_gain: 0.3,
            floor_gain: 0.01,
        }
    }
}

impl ToneEnvelope {
    pub fn gain_at(&self, t_ms: f32, duration_ms: f32) -> f32 {
        if t_ms < 0.0 || t_ms > duration_ms {
            return 0.0;
        }
        let attack = self.attack_ms.min(duration_ms).max(0.0);
        if t_ms < attack {
            return self.peak_gain * t_ms / attack;
        }
        let decay_span = duration_ms - attack;
        if decay_span <= 0.0 || self.peak_gain <= 0.0 {
            return self.peak_gain;
        }
        let progress = (t_ms - attack) / decay_span;
        let ratio = (self.floor_gain / self.peak_gain).max(f32::MIN_POSITIVE);
        self.peak_gain * ratio.powf(progress)
    }
}

/// Renders a mono tone.
pub fn render_tone(
    frequency: f32,
    duration_ms: f32,
    waveform: Waveform,
    envelope: &ToneEnvelope,
    sample_rate: u32,
) -> Vec<f32> {
    if frequency <= 0.0 || duration_ms <= 0.0 || sample_rate == 0 {
        return Vec::new();
    }
    let len = (duration_ms / 1000.0 * sample_rate as f32).round() as usize;
    let ms_per_sample = 1000.0 / sample_rate as f32;
    (0..len)
        .map(|i| {
            let phase = frequency * i as f32 / sample_rate as f32;
            waveform.sample(phase) * envelope.gain_at(i as f32 * ms_per_sample, duration_ms)
        })
        .collect()
}

/// Something that can sound a reference tone.
pub trait TonePlayer {
    fn play_tone(&mut self, frequency: f32, duration_ms: f32, waveform: Waveform) -> AudioResult<()>;
    /// Silences playback and releases the output. Safe to call more than once.
    fn stop(&mut self) -> AudioResult<()>;
}

/// Plays tones on the default output device. The stream opens on first use.
pub struct CpalTonePlayer {
    envelope: ToneEnvelope,
    output: Option<ToneOutput>,
}

struct ToneOutput {
    stream: cpal::Stream,
    sample_rate: u32,
    tones: Sender<Vec<f32>>,
}

impl Default for CpalTonePlayer {
    fn default() -> Self {
        Self::new(ToneEnvelope::default())
    }
}

impl CpalTonePlayer {
    pub fn new(envelope: ToneEnvelope) -> Self {
        Self {
            envelope,
            output: None,
        }
    }

    fn output(&mut self) -> AudioResult<&ToneOutput> {
        if self.output.is_none() {
            self.output = Some(open_output()?);
        }
        self.output
            .as_ref()
            .ok_or_else(|| AudioError::Stream("output stream unavailable".to_string()))
    }
}

impl TonePlayer for CpalTonePlayer {
    fn play_tone(&mut self, frequency: f32, duration_ms: f32, waveform: Waveform) -> AudioResult<()> {
        let envelope = self.envelope;
        let output = self.output()?;
        let buffer = render_tone(frequency, duration_ms, waveform, &envelope, output.sample_rate);
        debug!("Playing {:.2} Hz {} for {} ms", frequency, waveform, duration_ms);
        output
            .tones
            .try_send(buffer)
            .map_err(|e| AudioError::Stream(e.to_string()))
    }

    fn stop(&mut self) -> AudioResult<()> {
        match self.output.take() {
            Some(output) => output.stream.pause().map_err(AudioError::from),
            None => Ok(()),
        }
    }
}

fn open_output() -> AudioResult<ToneOutput> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::Stream("No output device available".to_string()))?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!("Using audio output device: {}", device_name);

    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::Stream(e.to_string()))?
        .collect::<Vec<_>>();
    let supported = find_supported_config(configs, crate::audio::TARGET_SAMPLE_RATE)
        .ok_or_else(|| AudioError::UnsupportedConfig(device_name.clone()))?;
    let rate = crate::audio::TARGET_SAMPLE_RATE
        .clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
    let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();
    let channels = config.channels.max(1) as usize;

    let (tones, incoming): (Sender<Vec<f32>>, Receiver<Vec<f32>>) = bounded(4);
    let mut current: Vec<f32> = Vec::new();
    let mut cursor = 0;
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            while let Ok(next) = incoming.try_recv() {
                current = next;
                cursor = 0;
            }
            for frame in data.chunks_mut(channels) {
                let value = current.get(cursor).copied().unwrap_or(0.0);
                cursor += 1;
                frame.iter_mut().for_each(|s| *s = value);
            }
        },
        |err| warn!("An error occurred on the output stream: {}", err),
        None,
    )?;
    stream.play()?;

    Ok(ToneOutput {
        stream,
        sample_rate: rate,
        tones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn envelope_ramps_up_then_decays_to_floor() {
        let env = ToneEnvelope::default();
        assert_eq!(env.gain_at(0.0, 1000.0), 0.0);
        assert_relative_eq!(env.gain_at(50.0, 1000.0), 0.15);
        assert_relative_eq!(env.gain_at(100.0, 1000.0), 0.3);
        assert_relative_eq!(env.gain_at(1000.0, 1000.0), 0.01, epsilon = 1e-5);
        assert!(env.gain_at(550.0, 1000.0) < 0.3);
        assert!(env.gain_at(550.0, 1000.0) > 0.01);
        assert_eq!(env.gain_at(1001.0, 1000.0), 0.0);
    }

    #[test]
    fn waveforms_stay_in_unit_range() {
        for waveform in Waveform::ALL {
            for i in 0..100 {
                let v = waveform.sample(i as f32 / 37.0);
                assert!((-1.0..=1.0).contains(&v), "{} gave {}", waveform, v);
            }
        }
        assert_eq!(Waveform::Square.sample(0.25), 1.0);
        assert_eq!(Waveform::Triangle.sample(0.5), 1.0);
        assert_eq!(Waveform::Sawtooth.sample(0.0), -1.0);
    }

    #[test]
    fn rendered_tone_has_expected_length_and_peak() {
        let buffer = render_tone(440.0, 1000.0, Waveform::Sine, &ToneEnvelope::default(), 44100);
        assert_eq!(buffer.len(), 44100);
        let peak = buffer.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.3 + 1e-6 && peak > 0.25);
        assert!(render_tone(0.0, 1000.0, Waveform::Sine, &ToneEnvelope::default(), 44100).is_empty());
    }

    #[test]
    fn waveform_names_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Waveform::Sawtooth).unwrap(), "\"sawtooth\"");
    }
}
