//! # Audio Capture Module
//!
//! Microphone input behind two small traits so sessions never touch the
//! platform directly:
//!
//! - [`AudioBackend`] enumerates input devices and opens a constrained
//!   capture.
//! - [`InputStream`] is the live capture handle: suspend, resume, close.
//!
//! [`CpalBackend`] implements both over CPAL. Samples leave the audio
//! callback in fixed-size mono blocks over a bounded channel; when the UI
//! falls behind, blocks are dropped rather than queued.

use crate::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Samples per block sent from the capture callback.
pub const CAPTURE_BLOCK_SIZE: usize = 1024;

/// Preferred capture rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Blocks buffered between the callback and the analyser.
const CHANNEL_CAPACITY: usize = 32;

/// A selectable capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    pub id: String,
    pub label: String,
}

/// Capture constraints. Analysis needs the raw signal, so every
/// processing stage is off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Specific device to open; `None` uses the host default
    pub device_id: Option<String>,
}

impl CaptureConstraints {
    pub fn with_device(device_id: Option<String>) -> Self {
        Self {
            device_id,
            ..Self::default()
        }
    }
}

/// A live capture.
pub trait InputStream {
    fn sample_rate(&self) -> u32;
    fn is_active(&self) -> bool;
    /// Pauses delivery without releasing the device.
    fn suspend(&mut self) -> AudioResult<()>;
    fn resume(&mut self) -> AudioResult<()>;
    /// Releases the device. Safe to call more than once.
    fn close(&mut self) -> AudioResult<()>;
}

/// An opened capture: the stream handle plus the sample blocks it produces.
pub struct Capture {
    pub stream: Box<dyn InputStream>,
    pub samples: Receiver<Vec<f32>>,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("sample_rate", &self.stream.sample_rate())
            .field("queued_blocks", &self.samples.len())
            .finish()
    }
}

pub trait AudioBackend {
    fn enumerate_inputs(&self) -> AudioResult<Vec<InputDevice>>;
    /// Opens and starts a capture. On failure nothing stays open.
    fn open_input(&mut self, constraints: &CaptureConstraints) -> AudioResult<Capture>;
}

/// CPAL-backed capture on the default host.
pub struct CpalBackend {
    host: cpal::Host,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn select_device(&self, device_id: Option<&str>) -> AudioResult<cpal::Device> {
        match device_id {
            None => self
                .host
                .default_input_device()
                .ok_or(AudioError::NoInputDevice),
            Some(id) => self
                .host
                .input_devices()
                .map_err(|e| AudioError::Stream(e.to_string()))?
                .find(|device| device.name().map(|name| name == id).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound(id.to_string())),
        }
    }
}

impl AudioBackend for CpalBackend {
    fn enumerate_inputs(&self) -> AudioResult<Vec<InputDevice>> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        Ok(devices
            .filter_map(|device| match device.name() {
                Ok(name) => Some(InputDevice {
                    id: name.clone(),
                    label: name,
                }),
                Err(e) => {
                    warn!("Skipping input device without a name: {}", e);
                    None
                }
            })
            .collect())
    }

    fn open_input(&mut self, constraints: &CaptureConstraints) -> AudioResult<Capture> {
        if constraints.echo_cancellation || constraints.noise_suppression || constraints.auto_gain_control {
            warn!("Capture is always unprocessed; ignoring processing constraints");
        }
        let device = self.select_device(constraints.device_id.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let (sender, samples) = bounded(CHANNEL_CAPACITY);
        let stream = start_capture(&device, &device_name, sender)?;
        Ok(Capture {
            stream: Box::new(stream),
            samples,
        })
    }
}

/// Builds and starts an input stream that sends mono blocks to `sender`.
fn start_capture(
    device: &cpal::Device,
    device_name: &str,
    sender: Sender<Vec<f32>>,
) -> AudioResult<CpalInputStream> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| AudioError::Stream(e.to_string()))?
        .collect::<Vec<_>>();
    let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| AudioError::UnsupportedConfig(device_name.to_string()))?;

    let rate = nearest_rate(&supported, TARGET_SAMPLE_RATE);
    let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();
    let channels = config.channels.max(1) as usize;
    debug!("Selected {} Hz, {} channel(s)", rate, channels);

    let mut pending = Vec::with_capacity(CAPTURE_BLOCK_SIZE * 2);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            downmix_into(data, channels, &mut pending);
            while pending.len() >= CAPTURE_BLOCK_SIZE {
                let block: Vec<f32> = pending.drain(..CAPTURE_BLOCK_SIZE).collect();
                // A full channel means the consumer is behind; drop the block.
                let _ = sender.try_send(block);
            }
        },
        |err| warn!("An error occurred on the audio stream: {}", err),
        None,
    )?;
    stream.play()?;

    Ok(CpalInputStream {
        stream: Some(stream),
        sample_rate: rate,
        suspended: false,
    })
}

pub struct CpalInputStream {
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    suspended: bool,
}

impl InputStream for CpalInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.stream.is_some() && !self.suspended
    }

    fn suspend(&mut self) -> AudioResult<()> {
        if let Some(stream) = &self.stream {
            stream.pause()?;
            self.suspended = true;
        }
        Ok(())
    }

    fn resume(&mut self) -> AudioResult<()> {
        if let Some(stream) = &self.stream {
            stream.play()?;
            self.suspended = false;
        }
        Ok(())
    }

    fn close(&mut self) -> AudioResult<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        // Dropping the stream releases the device even if pausing fails.
        let result = stream.pause().map_err(AudioError::from);
        drop(stream);
        debug!("Input stream closed");
        result
    }
}

/// Picks the f32 configuration closest to `target_rate`, preferring mono.
pub(crate) fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (rate_distance, c.channels() != 1, c.channels())
        })
}

/// Target rate when the range covers it, otherwise the closer bound.
fn nearest_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}

/// Averages interleaved frames down to mono, appending to `out`.
fn downmix_into(data: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }
    out.extend(
        data.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}
