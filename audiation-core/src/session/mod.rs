//! Practice sessions.
//!
//! Each session owns its capture and analysis handles and is driven by the
//! host calling `tick(now)` once per display refresh. Nothing here blocks or
//! spawns: opening the microphone is the only fallible step, and a failure
//! leaves the session idle.

pub mod detection;
pub mod training;

use crate::analyser::{Analyser, AnalyserConfig};
use crate::audio::{AudioBackend, CaptureConstraints, InputStream};
use crate::error::AudioResult;
use log::{debug, warn};

pub use detection::{
    ChordReading, DetectionConfig, DetectionState, DisplayUpdate, NoteDetectionSession, NoteReading,
};
pub use training::{
    AccuracyZone, ArcadeTally, Feedback, PitchReading, PitchTrainingSession, TargetNote, TrainingConfig,
    TrainingLevel, TrainingState, TrainingStats,
};

/// Live capture plus the analyser reading from it.
pub(crate) struct AudioPipeline {
    stream: Box<dyn InputStream>,
    analyser: Analyser,
}

impl AudioPipeline {
    pub(crate) fn open(
        backend: &mut dyn AudioBackend,
        constraints: &CaptureConstraints,
        config: AnalyserConfig,
    ) -> AudioResult<Self> {
        let capture = backend.open_input(constraints)?;
        let sample_rate = capture.stream.sample_rate();
        debug!("Capture opened at {} Hz", sample_rate);
        Ok(Self {
            analyser: Analyser::new(capture.samples, sample_rate, config),
            stream: capture.stream,
        })
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.analyser.sample_rate()
    }

    pub(crate) fn analyser(&mut self) -> &mut Analyser {
        &mut self.analyser
    }

    pub(crate) fn suspend(&mut self) {
        if let Err(e) = self.stream.suspend() {
            warn!("Could not suspend capture: {}", e);
        }
    }

    pub(crate) fn resume(&mut self) {
        if let Err(e) = self.stream.resume() {
            warn!("Could not resume capture: {}", e);
        }
    }

    /// Releases the microphone and closes the analyser. A failure in one
    /// step is logged and does not skip the other.
    pub(crate) fn teardown(mut self) {
        if let Err(e) = self.stream.close() {
            warn!("{}", e);
        }
        self.analyser.close();
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use crate::audio::{AudioBackend, Capture, CaptureConstraints, InputDevice, InputStream};
    use crate::error::{AudioError, AudioResult};
    use crate::tone::{TonePlayer, Waveform};
    use crossbeam_channel::{unbounded, Sender};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Shared view into what a [`FakeBackend`] did.
    #[derive(Clone, Default)]
    pub struct Probe {
        pub opened: Rc<Cell<usize>>,
        pub closed: Rc<Cell<usize>>,
        pub suspended: Rc<Cell<bool>>,
        pub last_constraints: Rc<RefCell<Option<CaptureConstraints>>>,
        pub sender: Rc<RefCell<Option<Sender<Vec<f32>>>>>,
    }

    impl Probe {
        pub fn push(&self, block: Vec<f32>) {
            if let Some(sender) = self.sender.borrow().as_ref() {
                sender.send(block).unwrap();
            }
        }
    }

    pub struct FakeBackend {
        pub probe: Probe,
        pub fail_with: Option<AudioError>,
    }

    impl FakeBackend {
        pub fn new() -> (Self, Probe) {
            let probe = Probe::default();
            (
                Self {
                    probe: probe.clone(),
                    fail_with: None,
                },
                probe,
            )
        }

        pub fn failing(error: AudioError) -> (Self, Probe) {
            let (mut backend, probe) = Self::new();
            backend.fail_with = Some(error);
            (backend, probe)
        }
    }

    impl AudioBackend for FakeBackend {
        fn enumerate_inputs(&self) -> AudioResult<Vec<InputDevice>> {
            Ok(vec![InputDevice {
                id: "fake".into(),
                label: "Fake Mic".into(),
            }])
        }

        fn open_input(&mut self, constraints: &CaptureConstraints) -> AudioResult<Capture> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            let (tx, rx) = unbounded();
            *self.probe.sender.borrow_mut() = Some(tx);
            *self.probe.last_constraints.borrow_mut() = Some(constraints.clone());
            self.probe.opened.set(self.probe.opened.get() + 1);
            Ok(Capture {
                stream: Box::new(FakeStream {
                    probe: self.probe.clone(),
                    open: true,
                }),
                samples: rx,
            })
        }
    }

    struct FakeStream {
        probe: Probe,
        open: bool,
    }

    impl InputStream for FakeStream {
        fn sample_rate(&self) -> u32 {
            44100
        }

        fn is_active(&self) -> bool {
            self.open && !self.probe.suspended.get()
        }

        fn suspend(&mut self) -> AudioResult<()> {
            self.probe.suspended.set(true);
            Ok(())
        }

        fn resume(&mut self) -> AudioResult<()> {
            self.probe.suspended.set(false);
            Ok(())
        }

        fn close(&mut self) -> AudioResult<()> {
            if self.open {
                self.open = false;
                self.probe.closed.set(self.probe.closed.get() + 1);
                self.probe.sender.borrow_mut().take();
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeTones {
        pub played: Rc<RefCell<Vec<(f32, Waveform)>>>,
    }

    impl TonePlayer for FakeTones {
        fn play_tone(&mut self, frequency: f32, _duration_ms: f32, waveform: Waveform) -> AudioResult<()> {
            self.played.borrow_mut().push((frequency, waveform));
            Ok(())
        }

        fn stop(&mut self) -> AudioResult<()> {
            Ok(())
        }
    }

    pub fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / 44100.0).sin())
            .collect()
    }
}
