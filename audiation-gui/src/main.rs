//! # Audiation - Music Practice Toolkit GUI
//!
//! Desktop shell around `audiation-core`. It hosts the note detection and
//! pitch training sessions in two tabs.
//!
//! ## Architecture
//! - **Single thread**: the sessions are cooperative and never block.
//!   Capture runs in the CPAL callback and reaches the sessions over a
//!   channel owned by the core.
//! - **Updates**: a 16 ms subscription is the display refresh. Every
//!   `Tick` advances both sessions once; only the visible tab keeps its
//!   microphone active.

mod ui;
mod widgets;

use anyhow::Context;
use audiation_core::audio::CpalBackend;
use audiation_core::engine::MODE_OFF;
use audiation_core::preferences::{JsonFileStore, MemoryStore, PreferenceStore};
use audiation_core::scheduler::{Clock, SystemClock};
use audiation_core::session::{
    ChordReading, DetectionConfig, DisplayUpdate, NoteDetectionSession, NoteReading, PitchTrainingSession,
    TrainingConfig, TrainingLevel,
};
use audiation_core::tone::{CpalTonePlayer, Waveform};
use iced::time::Instant;
use iced::{window, Element, Subscription, Task, Theme};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use widgets::arcade_canvas::{ARCADE_HEIGHT, ARCADE_WIDTH};

const PREFERENCES_FILE: &str = "audiation-preferences.json";

pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting Audiation");

    let app = AudiationApp::new().context("Could not set up the practice sessions")?;
    iced::application("Audiation", AudiationApp::update, AudiationApp::view)
        .subscription(AudiationApp::subscription)
        .theme(AudiationApp::theme)
        .exit_on_close_request(false)
        .run_with(move || (app, Task::none()))
        .context("GUI event loop failed")?;

    info!("Audiation closed");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Detection,
    Training,
}

#[derive(Debug, Clone)]
pub enum Message {
    Tick(Instant),
    SelectTab(Tab),
    InputSelected(String),

    StartDetection,
    StopDetection,
    ClearMelody,

    StartTraining,
    StopTraining,
    PlayTargetNote,
    LevelSelected(TrainingLevel),
    WaveformSelected(Waveform),
    ArcadeModeSelected(String),

    CloseRequested(window::Id),
}

pub struct AudiationApp {
    clock: SystemClock,
    pub tab: Tab,
    pub detection: NoteDetectionSession,
    pub training: PitchTrainingSession,
    /// Latest reading shown by the detection view
    pub detection_display: Option<NoteReading>,
    /// Chord heard while no single note was recognized
    pub detection_chord: Option<ChordReading>,
    pub devices: Vec<String>,
    pub selected_device: Option<String>,
    pub arcade_modes: Vec<String>,
    /// Last user-facing error
    pub status: Option<String>,
}

impl AudiationApp {
    fn new() -> anyhow::Result<Self> {
        let detection = NoteDetectionSession::new(Box::new(CpalBackend::new()), DetectionConfig::default());
        let mut training = PitchTrainingSession::new(
            Box::new(CpalBackend::new()),
            Box::new(CpalTonePlayer::default()),
            open_preferences(),
            TrainingConfig::default(),
        )?;
        training.set_arcade_size(ARCADE_WIDTH, ARCADE_HEIGHT);
        training.set_hidden(true);

        let devices = match detection.input_devices() {
            Ok(devices) => devices.into_iter().map(|d| d.id).collect(),
            Err(e) => {
                warn!("Could not list input devices: {}", e);
                Vec::new()
            }
        };
        let arcade_modes = std::iter::once(MODE_OFF.to_string())
            .chain(training.engine().scenes().map(|s| s.id.clone()))
            .collect();

        Ok(Self {
            clock: SystemClock::new(),
            tab: Tab::Detection,
            detection,
            training,
            detection_display: None,
            detection_chord: None,
            devices,
            selected_device: None,
            arcade_modes,
            status: None,
        })
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick(_) => {
                let now = self.clock.now_ms();
                self.detection.tick(now);
                self.training.tick(now);
                match self.detection.take_display_update() {
                    Some(DisplayUpdate::Note(reading)) => {
                        self.detection_display = Some(reading);
                        self.detection_chord = None;
                    }
                    Some(DisplayUpdate::Chord(chord)) => self.detection_chord = Some(chord),
                    Some(DisplayUpdate::Clear) => {
                        self.detection_display = None;
                        self.detection_chord = None;
                    }
                    Some(DisplayUpdate::SignalOff) | None => {}
                }
            }
            Message::SelectTab(tab) => {
                debug!("Switching to {:?}", tab);
                self.tab = tab;
                // The hidden tab suspends its capture.
                self.detection.set_hidden(tab != Tab::Detection);
                self.training.set_hidden(tab != Tab::Training);
            }
            Message::InputSelected(device) => {
                self.selected_device = Some(device);
            }
            Message::StartDetection => {
                self.training.stop();
                let result = self.detection.start(self.selected_device.clone());
                self.report(result);
            }
            Message::StopDetection => self.detection.stop(),
            Message::ClearMelody => self.detection.clear_melody(),
            Message::StartTraining => {
                self.detection.stop();
                let now = self.clock.now_ms();
                let result = self.training.start(now, self.selected_device.clone());
                self.report(result);
            }
            Message::StopTraining => self.training.stop(),
            Message::PlayTargetNote => self.training.play_target_note(),
            Message::LevelSelected(level) => self.training.set_level(level),
            Message::WaveformSelected(waveform) => self.training.set_waveform(waveform),
            Message::ArcadeModeSelected(mode) => {
                let result = self.training.set_arcade_mode(&mode);
                self.report(result);
            }
            Message::CloseRequested(id) => {
                info!("Window close requested, releasing audio");
                self.detection.dispose();
                self.training.dispose();
                return window::close(id).chain(iced::exit());
            }
        }
        Task::none()
    }

    fn report<E: std::fmt::Display>(&mut self, result: Result<(), E>) {
        self.status = match result {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(e.to_string())
            }
        };
    }

    fn view(&self) -> Element<'_, Message> {
        ui::create_main_view(self)
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(Duration::from_millis(16)).map(Message::Tick),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Preferences file in the working directory, or memory only when the
/// directory cannot be determined.
fn open_preferences() -> Box<dyn PreferenceStore> {
    match preferences_path() {
        Ok(path) => Box::new(JsonFileStore::open(path)),
        Err(e) => {
            warn!("{:#}; preferences will not be saved", e);
            Box::new(MemoryStore::new())
        }
    }
}

fn preferences_path() -> anyhow::Result<PathBuf> {
    let dir = std::env::current_dir().context("Could not resolve the working directory")?;
    Ok(dir.join(PREFERENCES_FILE))
}
