//! Live note and chord detection: Idle -> Detecting -> Idle.
//!
//! Each tick runs two independent paths over the same capture. The
//! autocorrelation path names the sung or played note and drives the melody
//! and keyboard highlights. The spectral path picks FFT peaks for chord
//! naming on every tick, falling back to the notes heard within the decay
//! window. A chord with no single note still reaches the display.

use super::AudioPipeline;
use crate::analyser::AnalyserConfig;
use crate::audio::{AudioBackend, CaptureConstraints, InputDevice};
use crate::chord::{infer_chord, ChordLabel};
use crate::error::{AudioResult, SessionResult};
use crate::fft::{pick_peaks, PeakPickConfig};
use crate::pitch::{detect_pitch_autocorrelation, AutocorrelationConfig};
use crate::scheduler::{FrameScheduler, Timeout};
use crate::tuning::{frequency_to_note, note_octave, PitchOptions};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Waveform colours cycled on every note change.
pub const WAVEFORM_COLORS: [&str; 5] = ["#ff00ff", "#00ffff", "#ffff00", "#00ff00", "#ff6600"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub pitch_options: PitchOptions,
    pub autocorrelation: AutocorrelationConfig,
    pub analyser: AnalyserConfig,
    pub peaks: PeakPickConfig,
    /// How long a heard note counts toward chord inference
    pub note_decay_ms: f64,
    /// Display hold after the signal is lost
    pub linger_ms: f64,
    /// Notes shown in the melody line
    pub melody_display_len: usize,
    /// How long a keyboard key stays lit
    pub key_linger_ms: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pitch_options: PitchOptions {
                min_frequency: 70.0,
                max_frequency: 2000.0,
                max_cent_error: 70.0,
            },
            autocorrelation: AutocorrelationConfig::default(),
            analyser: AnalyserConfig::default(),
            peaks: PeakPickConfig::default(),
            note_decay_ms: 1000.0,
            linger_ms: 2000.0,
            melody_display_len: 12,
            key_linger_ms: 1500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    Idle,
    Detecting,
}

/// Everything the display shows for a recognized note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReading {
    pub note: String,
    pub frequency: f32,
    pub cents: f32,
    pub octave: Option<i32>,
    pub chord: Option<ChordLabel>,
    pub scale: &'static str,
    pub melody_text: String,
    pub highlight_intensity: f32,
}

/// A chord picked out of the spectrum on a tick with no single note.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordReading {
    pub chord: ChordLabel,
    pub scale: &'static str,
}

/// Pending display change. Only the latest one per frame is kept.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    Note(NoteReading),
    Chord(ChordReading),
    /// The signal dropped this tick; the last note stays up until cleared
    SignalOff,
    Clear,
}

/// Note name -> last time it was heard.
#[derive(Debug, Clone, Default)]
struct ActiveNoteSet {
    notes: HashMap<String, f64>,
}

impl ActiveNoteSet {
    fn touch(&mut self, note: &str, now: f64) {
        self.notes.insert(note.to_string(), now);
    }

    fn expire(&mut self, now: f64, window_ms: f64) {
        self.notes.retain(|_, seen| now - *seen <= window_ms);
    }

    fn names(&self) -> Vec<&str> {
        self.notes.keys().map(String::as_str).collect()
    }

    fn clear(&mut self) {
        self.notes.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyHighlight {
    intensity: f32,
    expiry: Timeout,
}

pub struct NoteDetectionSession {
    backend: Box<dyn AudioBackend>,
    config: DetectionConfig,
    state: DetectionState,
    pipeline: Option<AudioPipeline>,
    frames: FrameScheduler,
    hidden: bool,

    last_note: Option<String>,
    melody: Vec<String>,
    active_notes: ActiveNoteSet,
    color_index: usize,
    linger: Timeout,
    keys: HashMap<String, KeyHighlight>,
    pending: Option<DisplayUpdate>,

    waveform: Vec<f32>,
    spectrum: Vec<u8>,
    sample_rate: u32,
    last_error: Option<String>,
}

impl NoteDetectionSession {
    pub fn new(backend: Box<dyn AudioBackend>, config: DetectionConfig) -> Self {
        Self {
            backend,
            config,
            state: DetectionState::Idle,
            pipeline: None,
            frames: FrameScheduler::new(),
            hidden: false,
            last_note: None,
            melody: Vec::new(),
            active_notes: ActiveNoteSet::default(),
            color_index: 0,
            linger: Timeout::new(),
            keys: HashMap::new(),
            pending: None,
            waveform: Vec::new(),
            spectrum: Vec::new(),
            sample_rate: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn is_detecting(&self) -> bool {
        self.state == DetectionState::Detecting
    }

    pub fn input_devices(&self) -> AudioResult<Vec<InputDevice>> {
        self.backend.enumerate_inputs()
    }

    /// Opens the microphone and starts the detect loop. Already detecting
    /// is a no-op; a capture failure leaves the session idle.
    pub fn start(&mut self, device_id: Option<String>) -> SessionResult<()> {
        if self.is_detecting() {
            return Ok(());
        }
        let constraints = CaptureConstraints::with_device(device_id);
        let pipeline = match AudioPipeline::open(self.backend.as_mut(), &constraints, self.config.analyser) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Note detection could not start: {}", e);
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };
        self.sample_rate = pipeline.sample_rate();
        self.pipeline = Some(pipeline);
        self.last_error = None;
        self.state = DetectionState::Detecting;
        self.frames.request();
        if self.hidden {
            self.suspend_capture();
        }
        info!("Note detection started");
        Ok(())
    }

    /// Cancels the loop and every timer, releases the microphone and closes
    /// the analyser. Safe to call repeatedly or before `start`.
    pub fn stop(&mut self) {
        self.frames.cancel();
        self.linger.cancel();
        self.keys.clear();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.teardown();
        }
        self.active_notes.clear();
        self.last_note = None;
        self.waveform.clear();
        self.spectrum.clear();
        self.pending = Some(DisplayUpdate::Clear);
        if self.state == DetectionState::Detecting {
            self.state = DetectionState::Idle;
            info!("Note detection stopped");
        }
    }

    pub fn dispose(&mut self) {
        self.stop();
    }

    /// Page visibility. Hidden suspends capture; visible resumes it if the
    /// session is still detecting.
    pub fn set_hidden(&mut self, hidden: bool) {
        if self.hidden == hidden {
            return;
        }
        self.hidden = hidden;
        if hidden {
            self.suspend_capture();
        } else if self.is_detecting() {
            if let Some(pipeline) = self.pipeline.as_mut() {
                pipeline.resume();
            }
        }
    }

    fn suspend_capture(&mut self) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.suspend();
        }
    }

    /// One display refresh: at most one detect pass, then the timers. A
    /// detected note re-arms the linger, so it only fires on silence.
    pub fn tick(&mut self, now: f64) {
        if self.is_detecting() && !self.hidden && self.frames.take().is_some() {
            self.detect(now);
            self.frames.request();
        }

        if self.linger.poll(now) {
            self.pending = Some(DisplayUpdate::Clear);
        }
        self.keys.retain(|_, key| !key.expiry.poll(now));
    }

    fn detect(&mut self, now: f64) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        let analyser = pipeline.analyser();
        analyser.poll();
        let sample_rate = analyser.sample_rate();
        self.waveform.clear();
        self.waveform.extend_from_slice(analyser.time_domain());
        self.spectrum = analyser.byte_frequency_data();

        self.active_notes.expire(now, self.config.note_decay_ms);

        let spectral_notes: Vec<String> = pick_peaks(&self.spectrum, sample_rate, &self.config.peaks)
            .iter()
            .filter_map(|peak| frequency_to_note(peak.frequency, &self.config.pitch_options))
            .map(|e| e.note)
            .collect();
        let spectral_chord = infer_chord(&spectral_notes);

        let frequency =
            detect_pitch_autocorrelation(&self.waveform, sample_rate, &self.config.autocorrelation);
        let estimate = frequency.and_then(|f| {
            frequency_to_note(f, &self.config.pitch_options).map(|estimate| (f, estimate))
        });

        let Some((frequency, estimate)) = estimate else {
            match spectral_chord {
                Some(chord) => {
                    trace!("No single note, spectrum reads {}", chord);
                    self.pending = Some(DisplayUpdate::Chord(ChordReading {
                        scale: chord.scale_label(),
                        chord,
                    }));
                    self.linger.arm(now, self.config.linger_ms);
                }
                None => {
                    trace!("No recognized pitch this tick");
                    self.pending = Some(DisplayUpdate::SignalOff);
                }
            }
            return;
        };

        if self.last_note.as_deref() != Some(estimate.note.as_str()) {
            debug!("Note changed to {}", estimate.note);
            self.melody.push(estimate.note.clone());
            self.last_note = Some(estimate.note.clone());
            self.color_index = (self.color_index + 1) % WAVEFORM_COLORS.len();
        }
        self.active_notes.touch(&estimate.note, now);

        let chord = spectral_chord.or_else(|| infer_chord(&self.active_notes.names()));

        let highlight_intensity = 1.0 + (estimate.cents.abs() / 50.0).min(1.0);
        self.light_key(&estimate.note, highlight_intensity, now);

        self.pending = Some(DisplayUpdate::Note(NoteReading {
            octave: note_octave(&estimate.note),
            scale: chord.as_ref().map(ChordLabel::scale_label).unwrap_or("-"),
            melody_text: self.melody_text(),
            note: estimate.note,
            frequency,
            cents: estimate.cents,
            chord,
            highlight_intensity,
        }));
        self.linger.arm(now, self.config.linger_ms);
    }

    fn light_key(&mut self, note: &str, intensity: f32, now: f64) {
        let mut expiry = Timeout::new();
        expiry.arm(now, self.config.key_linger_ms);
        self.keys.insert(note.to_string(), KeyHighlight { intensity, expiry });
    }

    /// Latest display change since the previous call, if any.
    pub fn take_display_update(&mut self) -> Option<DisplayUpdate> {
        self.pending.take()
    }

    /// Last notes of the melody, oldest first, joined by " - ".
    pub fn melody_text(&self) -> String {
        let start = self.melody.len().saturating_sub(self.config.melody_display_len);
        self.melody[start..].join(" - ")
    }

    pub fn melody(&self) -> &[String] {
        &self.melody
    }

    pub fn clear_melody(&mut self) {
        self.melody.clear();
    }

    /// Lit keyboard keys and their brightness.
    pub fn active_keys(&self) -> impl Iterator<Item = (&str, f32)> {
        self.keys.iter().map(|(note, key)| (note.as_str(), key.intensity))
    }

    pub fn waveform_color(&self) -> &'static str {
        WAVEFORM_COLORS[self.color_index]
    }

    pub fn waveform(&self) -> &[f32] {
        &self.waveform
    }

    pub fn spectrum(&self) -> &[u8] {
        &self.spectrum
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for NoteDetectionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AudioError, SessionError};
    use crate::session::fakes::{sine, FakeBackend, Probe};

    fn session() -> (NoteDetectionSession, Probe) {
        let (backend, probe) = FakeBackend::new();
        (NoteDetectionSession::new(Box::new(backend), DetectionConfig::default()), probe)
    }

    fn run(session: &mut NoteDetectionSession, probe: &Probe, freq: f32, now: f64) {
        probe.push(sine(freq, 2048));
        session.tick(now);
    }

    #[test]
    fn permission_denied_leaves_session_idle() {
        let (backend, probe) = FakeBackend::failing(AudioError::PermissionDenied);
        let mut session = NoteDetectionSession::new(Box::new(backend), DetectionConfig::default());
        let err = session.start(None).unwrap_err();
        assert_eq!(err, SessionError::Audio(AudioError::PermissionDenied));
        assert_eq!(session.state(), DetectionState::Idle);
        assert_eq!(probe.opened.get(), 0);
        assert!(session.last_error().is_some());
        session.tick(0.0);
        assert!(session.take_display_update().is_none());
    }

    #[test]
    fn start_requests_raw_capture_on_selected_device() {
        let (mut session, probe) = session();
        session.start(Some("fake".into())).unwrap();
        let constraints = probe.last_constraints.borrow().clone().unwrap();
        assert_eq!(constraints, CaptureConstraints::with_device(Some("fake".into())));
        session.start(None).unwrap();
        assert_eq!(probe.opened.get(), 1, "second start is a no-op");
    }

    #[test]
    fn recognized_note_updates_display_and_keys() {
        let (mut session, probe) = session();
        session.start(None).unwrap();
        run(&mut session, &probe, 440.0, 0.0);

        let Some(DisplayUpdate::Note(reading)) = session.take_display_update() else {
            panic!("expected a note reading");
        };
        assert_eq!(reading.note, "A4");
        assert_eq!(reading.octave, Some(4));
        assert!(reading.cents.abs() < 10.0);
        assert!(reading.highlight_intensity >= 1.0 && reading.highlight_intensity <= 2.0);
        assert_eq!(session.active_keys().map(|(n, _)| n).collect::<Vec<_>>(), vec!["A4"]);
        assert_eq!(session.take_display_update(), None);
    }

    #[test]
    fn melody_appends_only_on_change() {
        let (mut session, probe) = session();
        session.start(None).unwrap();
        let mut now = 0.0;
        for freq in [440.0, 440.0, 440.0, 261.63, 261.63, 440.0] {
            run(&mut session, &probe, freq, now);
            now += 16.0;
        }
        assert_eq!(session.melody_text(), "A4 - C4 - A4");
        assert_eq!(session.waveform_color(), WAVEFORM_COLORS[3]);
        session.clear_melody();
        assert_eq!(session.melody_text(), "");
    }

    #[test]
    fn silence_lingers_then_clears() {
        let (mut session, probe) = session();
        session.start(None).unwrap();
        run(&mut session, &probe, 440.0, 0.0);
        session.take_display_update();

        probe.push(vec![0.0; 2048]);
        session.tick(16.0);
        assert_eq!(session.take_display_update(), Some(DisplayUpdate::SignalOff));
        session.tick(1000.0);
        assert_eq!(session.take_display_update(), Some(DisplayUpdate::SignalOff));
        session.tick(2001.0);
        assert_eq!(session.take_display_update(), Some(DisplayUpdate::Clear));
    }

    #[test]
    fn keys_stop_glowing_after_linger() {
        let (mut session, probe) = session();
        session.start(None).unwrap();
        run(&mut session, &probe, 440.0, 0.0);
        probe.push(vec![0.0; 2048]);
        session.tick(1499.0);
        assert_eq!(session.active_keys().count(), 1);
        session.tick(1500.0);
        assert_eq!(session.active_keys().count(), 0);
    }

    #[test]
    fn stop_is_idempotent_and_releases_once() {
        let (mut session, probe) = session();
        session.stop();
        assert_eq!(probe.closed.get(), 0);
        session.start(None).unwrap();
        session.stop();
        session.stop();
        assert_eq!(probe.closed.get(), 1);
        assert_eq!(session.state(), DetectionState::Idle);
        assert_eq!(session.take_display_update(), Some(DisplayUpdate::Clear));
        session.tick(5000.0);
        assert_eq!(session.take_display_update(), None);
    }

    #[test]
    fn hidden_page_suspends_and_skips_analysis() {
        let (mut session, probe) = session();
        session.start(None).unwrap();
        session.set_hidden(true);
        assert!(probe.suspended.get());
        run(&mut session, &probe, 440.0, 0.0);
        assert_eq!(session.take_display_update(), None);
        session.set_hidden(false);
        assert!(!probe.suspended.get());
        session.tick(16.0);
        assert!(matches!(session.take_display_update(), Some(DisplayUpdate::Note(_))));
    }

    #[test]
    fn successive_notes_form_a_chord_until_they_decay() {
        let (backend, probe) = FakeBackend::new();
        let config = DetectionConfig {
            analyser: AnalyserConfig {
                smoothing_time_constant: 0.0,
                ..AnalyserConfig::default()
            },
            ..DetectionConfig::default()
        };
        let mut session = NoteDetectionSession::new(Box::new(backend), config);
        session.start(None).unwrap();

        run(&mut session, &probe, 261.63, 0.0);
        run(&mut session, &probe, 329.63, 300.0);
        run(&mut session, &probe, 392.0, 600.0);
        let Some(DisplayUpdate::Note(reading)) = session.take_display_update() else {
            panic!("expected a note reading");
        };
        assert_eq!(reading.note, "G4");
        assert_eq!(reading.chord.map(|c| c.to_string()), Some("C Major".to_string()));
        assert_eq!(reading.scale, "Major");

        // C4 has left the window; E4 and G4 alone name nothing.
        run(&mut session, &probe, 392.0, 1200.0);
        let Some(DisplayUpdate::Note(reading)) = session.take_display_update() else {
            panic!("expected a note reading");
        };
        assert_eq!(reading.chord, None);
        assert_eq!(reading.scale, "-");
    }

    #[test]
    fn active_notes_expire_after_decay_window() {
        let mut set = ActiveNoteSet::default();
        set.touch("C4", 0.0);
        set.touch("E4", 500.0);
        set.expire(1200.0, 1000.0);
        assert_eq!(set.names(), vec!["E4"]);
    }
}
