//! Built-in arcade scenes.

pub mod gatekeeper;

use crate::engine::{EngineConfig, GamifiedEngine};
use crate::error::EngineResult;

pub use gatekeeper::{gatekeeper_definition, GateEvent, GatekeeperConfig, GatekeeperScene, GATEKEEPER_ID};

/// Builds an engine with every built-in scene registered. No scene is
/// loaded and the frame loop is not started.
pub fn create_pitch_arcade(config: EngineConfig) -> EngineResult<GamifiedEngine> {
    let mut engine = GamifiedEngine::new(config);
    engine.register_scene(gatekeeper_definition())?;
    Ok(engine)
}
