//! Pitch training game: Idle -> Training -> Idle.
//!
//! A target note is presented and played; the player has to hold it within
//! tolerance for the sustain time to score. Each hit queues the next target
//! after a short pause, and a countdown ends the round. Every tick also
//! feeds a [`PitchSample`] into the pitch arcade so the visualization sees
//! the same signal the scoring does.

use super::AudioPipeline;
use crate::analyser::AnalyserConfig;
use crate::audio::{AudioBackend, CaptureConstraints, InputDevice};
use crate::engine::{
    clamp, EngineConfig, EngineEvent, EngineEventKind, GamifiedEngine, PitchSample, SceneEvent, MODE_OFF,
};
use crate::error::{AudioResult, EngineError, SessionError, SessionResult};
use crate::pitch::{detect_pitch_autocorrelation, rms, AutocorrelationConfig};
use crate::preferences::{PreferenceStore, ARCADE_MODE_KEY};
use crate::scenes::create_pitch_arcade;
use crate::scenes::gatekeeper::{GATE_MISSED, GATE_PASSED};
use crate::scheduler::{FrameScheduler, Interval, Timeout};
use crate::surface::RecordingSurface;
use crate::tone::{TonePlayer, Waveform};
use crate::tuning::{calculate_cents_deviation, frequency_to_note, PitchOptions};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Notes the game can ask for.
pub const NOTE_FREQUENCIES: [(&str, f32); 8] = [
    ("C4", 261.63),
    ("D4", 293.66),
    ("E4", 329.63),
    ("F4", 349.23),
    ("G4", 392.00),
    ("A4", 440.00),
    ("B4", 493.88),
    ("C5", 523.25),
];

const EASY_NOTES: [&str; 4] = ["C4", "E4", "G4", "C5"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingLevel {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl TrainingLevel {
    pub const ALL: [TrainingLevel; 3] = [TrainingLevel::Easy, TrainingLevel::Medium, TrainingLevel::Hard];

    /// Notes a target is drawn from at this level.
    pub fn notes(&self) -> Vec<&'static str> {
        match self {
            TrainingLevel::Easy => EASY_NOTES.to_vec(),
            TrainingLevel::Medium | TrainingLevel::Hard => {
                NOTE_FREQUENCIES.iter().map(|(note, _)| *note).collect()
            }
        }
    }
}

impl fmt::Display for TrainingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingLevel::Easy => "Easy",
            TrainingLevel::Medium => "Medium",
            TrainingLevel::Hard => "Hard",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub pitch_options: PitchOptions,
    pub autocorrelation: AutocorrelationConfig,
    pub analyser: AnalyserConfig,
    /// Round length
    pub duration_secs: u32,
    /// How long a match must hold before it scores
    pub sustain_ms: f64,
    pub tolerance_cents: f32,
    pub points_per_hit: u32,
    /// Pause between a hit and the next target
    pub next_note_delay_ms: f64,
    /// Detected frequencies at or below this count as unvoiced
    pub min_voiced_frequency: f32,
    pub tone_duration_ms: f32,
    pub engine: EngineConfig,
    /// Fixed seed for target selection; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            pitch_options: PitchOptions {
                min_frequency: 80.0,
                max_frequency: 1500.0,
                max_cent_error: 80.0,
            },
            autocorrelation: AutocorrelationConfig::default(),
            analyser: AnalyserConfig::default(),
            duration_secs: 60,
            sustain_ms: 500.0,
            tolerance_cents: 15.0,
            points_per_hit: 10,
            next_note_delay_ms: 1000.0,
            min_voiced_frequency: 100.0,
            tone_duration_ms: 1000.0,
            engine: EngineConfig::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Idle,
    Training,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub score: u32,
    pub streak: u32,
    pub best_streak: u32,
    /// Targets presented this round
    pub notes_presented: u32,
    pub hits: u32,
    pub time_left_secs: u32,
}

impl TrainingStats {
    /// Hits per presented note, as a rounded percentage.
    pub fn accuracy(&self) -> u32 {
        if self.notes_presented == 0 {
            return 0;
        }
        (self.hits as f32 / self.notes_presented as f32 * 100.0).round() as u32
    }
}

/// Pitch meter colour band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyZone {
    Good,
    Close,
    Off,
}

impl AccuracyZone {
    pub fn from_cents(cents: f32) -> Self {
        let distance = cents.abs();
        if distance < 10.0 {
            AccuracyZone::Good
        } else if distance < 30.0 {
            AccuracyZone::Close
        } else {
            AccuracyZone::Off
        }
    }
}

/// A voiced tick compared against the target.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchReading {
    pub frequency: f32,
    /// Nearest note, if the frequency is close enough to one
    pub note: Option<String>,
    /// Signed deviation from the target
    pub cents: f32,
    pub zone: AccuracyZone,
}

impl PitchReading {
    /// Meter needle position in `[-50, 50]`.
    pub fn meter_position(&self) -> f32 {
        clamp(self.cents, -50.0, 50.0)
    }

    pub fn guidance(&self) -> String {
        let direction = if self.cents > 3.0 {
            "Lower pitch slightly"
        } else if self.cents < -3.0 {
            "Raise pitch slightly"
        } else {
            "Right on pitch"
        };
        format!("{} (Δ {:.1}¢)", direction, self.cents)
    }
}

pub const NO_SIGNAL_GUIDANCE: &str = "Increase input volume or sing a clear note";

#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    PerfectMatch,
    KeepTrying,
    GameOver { score: u32 },
    Error(String),
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::PerfectMatch => f.write_str("✅ Perfect Match!"),
            Feedback::KeepTrying => f.write_str("🎤 Keep trying!"),
            Feedback::GameOver { score } => write!(f, "Game Over! Final Score: {}", score),
            Feedback::Error(message) => write!(f, "❌ Error: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetNote {
    pub note: &'static str,
    pub frequency: f32,
}

impl TargetNote {
    pub fn lookup(note: &str) -> Option<Self> {
        NOTE_FREQUENCIES
            .iter()
            .find(|(name, _)| *name == note)
            .map(|&(note, frequency)| Self { note, frequency })
    }
}

/// Gate results reported by the arcade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArcadeTally {
    pub passed: u32,
    pub missed: u32,
    pub last_event: Option<SceneEvent>,
}

pub struct PitchTrainingSession {
    backend: Box<dyn AudioBackend>,
    tones: Box<dyn TonePlayer>,
    preferences: Box<dyn PreferenceStore>,
    config: TrainingConfig,
    rng: StdRng,

    state: TrainingState,
    pipeline: Option<AudioPipeline>,
    frames: FrameScheduler,
    countdown: Interval,
    next_note: Timeout,
    hidden: bool,

    level: TrainingLevel,
    waveform: Waveform,
    target: Option<TargetNote>,
    matched_since: Option<f64>,
    awarded: bool,
    stats: TrainingStats,

    reading: Option<PitchReading>,
    guidance: String,
    volume: f32,
    feedback: Option<Feedback>,

    engine: GamifiedEngine,
    arcade_mode: String,
    arcade_surface: RecordingSurface,
    tally: Rc<RefCell<ArcadeTally>>,
}

impl PitchTrainingSession {
    /// Builds the session and its arcade, restoring the saved arcade mode.
    /// A saved mode that no longer exists falls back to off.
    pub fn new(
        backend: Box<dyn AudioBackend>,
        tones: Box<dyn TonePlayer>,
        preferences: Box<dyn PreferenceStore>,
        config: TrainingConfig,
    ) -> SessionResult<Self> {
        let mut engine = create_pitch_arcade(config.engine.clone())?;
        let tally = Rc::new(RefCell::new(ArcadeTally::default()));
        let sink = Rc::clone(&tally);
        engine.add_event_listener(EngineEventKind::SceneEvent, move |event| {
            if let EngineEvent::Scene(scene_event) = event {
                let mut tally = sink.borrow_mut();
                match scene_event.name.as_str() {
                    GATE_PASSED => tally.passed += 1,
                    GATE_MISSED => tally.missed += 1,
                    _ => {}
                }
                tally.last_event = Some(scene_event.clone());
            }
        });

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut session = Self {
            backend,
            tones,
            preferences,
            rng,
            state: TrainingState::Idle,
            pipeline: None,
            frames: FrameScheduler::new(),
            countdown: Interval::new(1000.0),
            next_note: Timeout::new(),
            hidden: false,
            level: TrainingLevel::default(),
            waveform: Waveform::default(),
            target: None,
            matched_since: None,
            awarded: false,
            stats: TrainingStats {
                time_left_secs: config.duration_secs,
                ..TrainingStats::default()
            },
            reading: None,
            guidance: String::new(),
            volume: 0.0,
            feedback: None,
            engine,
            arcade_mode: MODE_OFF.to_string(),
            arcade_surface: RecordingSurface::new(640.0, 240.0),
            tally,
            config,
        };

        let saved = session.preferences.get(ARCADE_MODE_KEY);
        let initial = saved.unwrap_or_else(|| MODE_OFF.to_string());
        if let Err(e) = session.set_arcade_mode(&initial) {
            warn!("Saved arcade mode \"{}\" is unavailable: {}", initial, e);
            session.set_arcade_mode(MODE_OFF)?;
        }
        Ok(session)
    }

    // --- Lifecycle ---

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn is_training(&self) -> bool {
        self.state == TrainingState::Training
    }

    pub fn input_devices(&self) -> AudioResult<Vec<InputDevice>> {
        self.backend.enumerate_inputs()
    }

    /// Opens the microphone, resets the round and presents the first
    /// target. Already training is a no-op; on failure nothing changes
    /// except the error feedback.
    pub fn start(&mut self, now: f64, device_id: Option<String>) -> SessionResult<()> {
        if self.is_training() {
            return Ok(());
        }
        let constraints = CaptureConstraints::with_device(device_id);
        let pipeline = match AudioPipeline::open(self.backend.as_mut(), &constraints, self.config.analyser) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Pitch training could not start: {}", e);
                self.feedback = Some(Feedback::Error(e.to_string()));
                return Err(e.into());
            }
        };
        self.pipeline = Some(pipeline);
        self.state = TrainingState::Training;
        self.stats = TrainingStats {
            time_left_secs: self.config.duration_secs,
            ..TrainingStats::default()
        };
        self.feedback = None;
        self.countdown.start(now);
        self.frames.request();
        self.present_next_target();

        if self.arcade_mode != MODE_OFF {
            self.engine.start();
        }
        if self.hidden {
            self.suspend_capture();
        }
        info!("Pitch training started ({}, {} s)", self.level, self.config.duration_secs);
        Ok(())
    }

    /// Ends the round. Safe to call repeatedly or before `start`.
    pub fn stop(&mut self) {
        self.next_note.cancel();
        self.countdown.cancel();
        self.frames.cancel();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.teardown();
        }
        self.engine.pause();
        self.target = None;
        self.reading = None;
        self.matched_since = None;
        if self.is_training() {
            self.state = TrainingState::Idle;
            self.feedback = Some(Feedback::GameOver {
                score: self.stats.score,
            });
            info!(
                "Pitch training stopped: score {}, accuracy {}%",
                self.stats.score,
                self.stats.accuracy()
            );
        }
    }

    /// Stops the round, tears down the arcade and silences playback.
    pub fn dispose(&mut self) {
        self.stop();
        self.engine.dispose();
        if let Err(e) = self.tones.stop() {
            warn!("{}", e);
        }
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        if self.hidden == hidden {
            return;
        }
        self.hidden = hidden;
        if hidden {
            self.suspend_capture();
        } else if self.is_training() {
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

    // --- Per-frame work ---

    /// One display refresh, in order: countdown, pending next target, one
    /// detect pass, one arcade frame.
    pub fn tick(&mut self, now: f64) {
        let elapsed = self.countdown.poll(now);
        if elapsed > 0 {
            self.stats.time_left_secs = self.stats.time_left_secs.saturating_sub(elapsed);
            if self.stats.time_left_secs == 0 {
                self.stop();
                return;
            }
        }

        if self.next_note.poll(now) {
            self.present_next_target();
        }

        if self.hidden {
            return;
        }
        if self.is_training() && self.frames.take().is_some() {
            self.detect(now);
            self.frames.request();
        }
        if self.engine.wants_frame() {
            self.arcade_surface.clear();
            self.engine.frame(now, &mut self.arcade_surface);
        }
    }

    fn detect(&mut self, now: f64) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        let analyser = pipeline.analyser();
        analyser.poll();
        let sample_rate = analyser.sample_rate();
        let signal = analyser.time_domain();
        let level = rms(signal);
        let frequency = detect_pitch_autocorrelation(signal, sample_rate, &self.config.autocorrelation)
            .filter(|f| *f > self.config.min_voiced_frequency);

        self.volume = clamp(level * 3.5, 0.05, 1.0);

        let (Some(frequency), Some(target)) = (frequency, self.target) else {
            trace!("Unvoiced tick");
            self.reading = None;
            self.guidance = NO_SIGNAL_GUIDANCE.to_string();
            self.engine.update_pitch(PitchSample::new(0.0, false, level, now));
            return;
        };

        let note = frequency_to_note(frequency, &self.config.pitch_options).map(|e| e.note);
        let cents = calculate_cents_deviation(frequency, target.frequency);
        let on_target = note.as_deref() == Some(target.note) && cents.abs() < self.config.tolerance_cents;
        let reading = PitchReading {
            frequency,
            note,
            cents,
            zone: AccuracyZone::from_cents(cents),
        };
        self.guidance = reading.guidance();
        self.reading = Some(reading);
        self.engine.update_pitch(PitchSample::new(cents, on_target, level, now));

        if self.awarded {
            return;
        }
        if on_target {
            let since = *self.matched_since.get_or_insert(now);
            if now - since > self.config.sustain_ms {
                self.award_hit(now);
            }
        } else {
            self.matched_since = None;
            self.stats.streak = 0;
            self.feedback = Some(Feedback::KeepTrying);
        }
    }

    fn award_hit(&mut self, now: f64) {
        self.awarded = true;
        self.stats.score += self.config.points_per_hit;
        self.stats.streak += 1;
        self.stats.hits += 1;
        self.stats.best_streak = self.stats.best_streak.max(self.stats.streak);
        self.feedback = Some(Feedback::PerfectMatch);
        self.next_note.arm(now, self.config.next_note_delay_ms);
        debug!("Hit on {:?}, streak {}", self.target.map(|t| t.note), self.stats.streak);
    }

    // --- Targets ---

    fn present_next_target(&mut self) {
        let notes = self.level.notes();
        let note = notes[self.rng.random_range(0..notes.len())];
        if let Some(target) = TargetNote::lookup(note) {
            self.present(target);
        }
    }

    fn present(&mut self, target: TargetNote) {
        self.target = Some(target);
        self.matched_since = None;
        self.awarded = false;
        self.stats.notes_presented += 1;
        debug!("New target {}", target.note);
        self.play_target_note();
    }

    /// Replaces the current target with `note`. Only valid mid-round.
    pub fn set_target(&mut self, note: &str) -> SessionResult<()> {
        let target = TargetNote::lookup(note).ok_or_else(|| SessionError::InvalidTarget(note.to_string()))?;
        if !self.is_training() {
            return Ok(());
        }
        self.next_note.cancel();
        self.present(target);
        Ok(())
    }

    /// Plays the current target again. Playback failures are logged only.
    pub fn play_target_note(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        if let Err(e) = self
            .tones
            .play_tone(target.frequency, self.config.tone_duration_ms, self.waveform)
        {
            warn!("Could not play target note: {}", e);
        }
    }

    /// Takes effect from the next target.
    pub fn set_level(&mut self, level: TrainingLevel) {
        self.level = level;
    }

    pub fn level(&self) -> TrainingLevel {
        self.level
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    // --- Arcade ---

    /// Switches the arcade scene and saves the choice. Running follows the
    /// round: the arcade only animates while training.
    pub fn set_arcade_mode(&mut self, mode: &str) -> SessionResult<()> {
        if mode != MODE_OFF && !self.engine.has_scene(mode) {
            return Err(EngineError::SceneNotRegistered(mode.to_string()).into());
        }
        self.engine.set_mode(mode)?;
        if mode != MODE_OFF {
            if self.is_training() {
                self.engine.start();
            } else {
                self.engine.pause();
            }
        }
        self.arcade_mode = mode.to_string();
        self.preferences.set(ARCADE_MODE_KEY, mode);
        self.arcade_surface.clear();
        Ok(())
    }

    pub fn arcade_mode(&self) -> &str {
        &self.arcade_mode
    }

    pub fn arcade_enabled(&self) -> bool {
        self.arcade_mode != MODE_OFF
    }

    pub fn set_arcade_size(&mut self, width: f32, height: f32) {
        self.arcade_surface.resize(width, height);
    }

    /// Draw calls of the latest arcade frame.
    pub fn arcade_surface(&self) -> &RecordingSurface {
        &self.arcade_surface
    }

    pub fn engine(&self) -> &GamifiedEngine {
        &self.engine
    }

    pub fn arcade_tally(&self) -> ArcadeTally {
        self.tally.borrow().clone()
    }

    // --- Display state ---

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub fn target(&self) -> Option<TargetNote> {
        self.target
    }

    pub fn reading(&self) -> Option<&PitchReading> {
        self.reading.as_ref()
    }

    pub fn guidance(&self) -> &str {
        &self.guidance
    }

    /// Input level for the volume bar, `[0.05, 1]` once training.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }
}

impl Drop for PitchTrainingSession {
    fn drop(&mut self) {
        self.stop();
    }
}
