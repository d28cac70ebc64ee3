//! Fake collaborators for driving sessions without audio hardware.

#![allow(dead_code)]

use audiation_core::audio::{AudioBackend, Capture, CaptureConstraints, InputDevice, InputStream};
use audiation_core::error::{AudioError, AudioResult};
use audiation_core::tone::{TonePlayer, Waveform};
use crossbeam_channel::{unbounded, Sender};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const SAMPLE_RATE: u32 = 44100;

/// What the fake microphone has been asked to do.
#[derive(Clone, Default)]
pub struct Mic {
    pub opened: Rc<Cell<usize>>,
    pub released: Rc<Cell<usize>>,
    feed: Rc<RefCell<Option<Sender<Vec<f32>>>>>,
}

impl Mic {
    pub fn sing(&self, frequency: f32) {
        self.feed_block(tone(frequency, 2048));
    }

    pub fn silence(&self) {
        self.feed_block(vec![0.0; 2048]);
    }

    pub fn feed_block(&self, block: Vec<f32>) {
        if let Some(tx) = self.feed.borrow().as_ref() {
            let _ = tx.send(block);
        }
    }
}

pub struct FakeMicBackend {
    mic: Mic,
    deny: bool,
}

impl FakeMicBackend {
    pub fn new() -> (Self, Mic) {
        let mic = Mic::default();
        (Self { mic: mic.clone(), deny: false }, mic)
    }

    pub fn denied() -> (Self, Mic) {
        let mic = Mic::default();
        (Self { mic: mic.clone(), deny: true }, mic)
    }
}

impl AudioBackend for FakeMicBackend {
    fn enumerate_inputs(&self) -> AudioResult<Vec<InputDevice>> {
        Ok(vec![InputDevice {
            id: "test-mic".into(),
            label: "Test Mic".into(),
        }])
    }

    fn open_input(&mut self, _constraints: &CaptureConstraints) -> AudioResult<Capture> {
        if self.deny {
            return Err(AudioError::PermissionDenied);
        }
        let (tx, rx) = unbounded();
        *self.mic.feed.borrow_mut() = Some(tx);
        self.mic.opened.set(self.mic.opened.get() + 1);
        Ok(Capture {
            stream: Box::new(FakeMicStream {
                mic: self.mic.clone(),
                live: true,
            }),
            samples: rx,
        })
    }
}

struct FakeMicStream {
    mic: Mic,
    live: bool,
}

impl InputStream for FakeMicStream {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn is_active(&self) -> bool {
        self.live
    }

    fn suspend(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn resume(&mut self) -> AudioResult<()> {
        Ok(())
    }

    fn close(&mut self) -> AudioResult<()> {
        if self.live {
            self.live = false;
            self.mic.released.set(self.mic.released.get() + 1);
            self.mic.feed.borrow_mut().take();
        }
        Ok(())
    }
}

/// Tone player that plays nothing.
#[derive(Default)]
pub struct MutePlayer;

impl TonePlayer for MutePlayer {
    fn play_tone(&mut self, _frequency: f32, _duration_ms: f32, _waveform: Waveform) -> AudioResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        Ok(())
    }
}

pub fn tone(frequency: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

/// Several sines summed, starting at sample `start` so consecutive blocks
/// join without a phase jump.
pub fn mix(frequencies: &[f32], amplitude: f32, start: usize, len: usize) -> Vec<f32> {
    (start..start + len)
        .map(|i| {
            frequencies
                .iter()
                .map(|f| amplitude * (2.0 * std::f32::consts::PI * f * i as f32 / SAMPLE_RATE as f32).sin())
                .sum()
        })
        .collect()
}
