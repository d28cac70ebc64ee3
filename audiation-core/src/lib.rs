// audiation-core/src/lib.rs

//! The core logic for the Audiation practice toolkit.
//! This crate is responsible for pitch and chord detection, the practice
//! sessions, and the gamified pitch arcade. It is completely headless and
//! contains no GUI code: the host drives everything by calling `tick(now)`
//! once per display refresh.

pub mod analyser;
pub mod audio;
pub mod chord;
pub mod engine;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod preferences;
pub mod scenes;
pub mod scheduler;
pub mod session;
pub mod surface;
pub mod tone;
pub mod tuning;

pub use engine::{EngineConfig, FrameState, GamifiedEngine, PitchSample};
pub use error::{AudioError, EngineError, SessionError};
pub use scenes::create_pitch_arcade;
pub use session::{NoteDetectionSession, PitchTrainingSession};
