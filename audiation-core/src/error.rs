//! Error types for the practice toolkit.
//!
//! Signal-quality problems (silence, an unrecognized pitch) are never errors
//! here: they travel as `None` through the analysis functions. Only structural
//! failures get a variant.

use thiserror::Error;

/// Failures of the audio input and output collaborators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    /// The host refused access to the microphone
    #[error("Microphone access was denied")]
    PermissionDenied,

    /// No capture device is present
    #[error("No input device available")]
    NoInputDevice,

    /// A specific device was requested but could not be found
    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    /// The device offers no format we can analyse
    #[error("No suitable f32 format found for device {0}")]
    UnsupportedConfig(String),

    /// The stream failed to build, start or run
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Releasing a stream or context failed
    #[error("Audio teardown failed: {0}")]
    Teardown(String),
}

/// Failures of the gamified engine's scene host.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A scene id was requested that was never registered
    #[error("Scene \"{0}\" is not registered")]
    SceneNotRegistered(String),

    /// A scene definition was rejected at registration
    #[error("Invalid scene definition: {0}")]
    InvalidSceneDefinition(String),

    /// An asset loader failed
    #[error("Asset \"{key}\" failed to load: {reason}")]
    AssetLoad { key: String, reason: String },
}

/// Failures surfaced by the practice sessions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// Capture could not be started; the session stays idle
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The arcade rejected a mode change
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A target note outside the known note table was requested
    #[error("Unknown target note: {0}")]
    InvalidTarget(String),
}

/// Result type for audio collaborator operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            cpal::BuildStreamError::StreamConfigNotSupported => {
                AudioError::UnsupportedConfig("requested stream config".to_string())
            }
            other => AudioError::Stream(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::Stream(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::Teardown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_wraps_audio_error_transparently() {
        let err: SessionError = AudioError::PermissionDenied.into();
        assert_eq!(err.to_string(), "Microphone access was denied");
        assert_eq!(err, SessionError::Audio(AudioError::PermissionDenied));
    }

    #[test]
    fn scene_not_registered_names_the_scene() {
        let err = EngineError::SceneNotRegistered("warp".into());
        assert_eq!(err.to_string(), "Scene \"warp\" is not registered");
    }
}
