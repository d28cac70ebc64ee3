//! # Gamified Engine Module
//!
//! Turns a noisy, irregular pitch-accuracy signal into stable, frame-paced
//! state and hosts exactly one scene that consumes it.
//!
//! ## Frame pipeline
//! 1. Normalise the latest cents error into `[-1, 1]`.
//! 2. Exponentially smooth error, confidence and gate height, each with its
//!    own factor.
//! 3. Advance the BPM phase and the on-target streak.
//! 4. `update` then `render` the active scene; drain the events it emitted.
//!
//! Sessions talk to the scene only by pushing [`PitchSample`]s and by
//! listening to [`EngineEvent`]s.

use crate::error::{EngineError, EngineResult};
use crate::scheduler::FrameScheduler;
use crate::surface::{Color, RenderSurface};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

/// Mode name that disables the arcade entirely.
pub const MODE_OFF: &str = "off";

/// Frame delta assumed when there is no previous frame.
const DEFAULT_DELTA_MS: f64 = 16.0;

// --- Pure helpers ---

/// Clamps `value` into `[min, max]`; NaN maps to `min`.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// One step of exponential smoothing toward `target`.
///
/// `smoothing` is the weight of the new sample: 0 freezes the value,
/// 1 jumps straight to the target.
pub fn smooth_value(previous: f32, target: f32, smoothing: f32) -> f32 {
    let alpha = clamp(1.0 - smoothing, 0.0, 1.0);
    previous * alpha + target * (1.0 - alpha)
}

/// Maps a cents error into `[-1, 1]` against `max_window` cents.
pub fn normalize_cents(cents: f32, max_window: f32) -> f32 {
    if !cents.is_finite() || !max_window.is_finite() || max_window <= 0.0 {
        return 0.0;
    }
    clamp(cents / max_window, -1.0, 1.0)
}

/// Vertical target for the gate: flat (negative) error sits high, sharp
/// error sits low, in tune sits at the middle.
pub fn compute_gate_height(normalized_error: f32) -> f32 {
    clamp(0.5 - normalized_error * 0.5, 0.0, 1.0)
}

/// Hermite ease on `[0, 1]`.
pub fn smoothstep(t: f32) -> f32 {
    let t = clamp(t, 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// --- Data ---

/// One pitch-accuracy reading pushed by a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchSample {
    /// Cents offset relative to the target note
    pub cents: f32,
    /// Whether the reading is within the accuracy window
    pub on_target: bool,
    /// Input RMS, used as a confidence proxy
    pub rms: f32,
    /// Milliseconds, host clock
    pub timestamp: f64,
}

impl PitchSample {
    pub fn new(cents: f32, on_target: bool, rms: f32, timestamp: f64) -> Self {
        Self {
            cents,
            on_target,
            rms,
            timestamp,
        }
    }
}

impl Default for PitchSample {
    fn default() -> Self {
        Self::new(0.0, false, 0.0, 0.0)
    }
}

/// Smoothed, frame-paced state handed to scenes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub time: f64,
    pub delta: f64,
    /// `[-1, 1]`
    pub normalized_error: f32,
    /// `[0, 1]`
    pub gate_height: f32,
    /// `[0, 1]`
    pub confidence: f32,
    pub streak_level: u32,
    pub on_target: bool,
    /// `[0, 1)`
    pub bpm_phase: f32,
    pub notes_hit: u32,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            time: 0.0,
            delta: DEFAULT_DELTA_MS,
            normalized_error: 0.0,
            gate_height: 0.5,
            confidence: 0.0,
            streak_level: 0,
            on_target: false,
            bpm_phase: 0.0,
            notes_hit: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub background: Color,
    pub primary: Color,
    pub accent: Color,
    pub danger: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::from_rgb8(0x03, 0x01, 0x12),
            primary: Color::from_rgb8(0x5c, 0xf2, 0xff),
            accent: Color::from_rgb8(0xf6, 0xc1, 0x77),
            danger: Color::from_rgb8(0xff, 0x4d, 0x6d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Weight of each new sample for the error signal
    pub smoothing_factor: f32,
    /// Weight of each new sample for the gate height
    pub gate_smoothing: f32,
    /// Weight of each new sample for confidence
    pub confidence_smoothing: f32,
    /// Cents that map to a normalised error of +-1
    pub max_cent_window: f32,
    pub tempo_bpm: f32,
    pub palette: Palette,
    /// Seed for the scene RNG
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.15,
            gate_smoothing: 0.25,
            confidence_smoothing: 0.15,
            max_cent_window: 50.0,
            tempo_bpm: 96.0,
            palette: Palette::default(),
            seed: 123_456_789,
        }
    }
}

// --- Scenes ---

/// Shared services handed to scenes.
pub struct SceneContext {
    pub palette: Palette,
    rng: StdRng,
    stores: HashMap<String, HashMap<String, Value>>,
    assets: HashMap<String, Rc<dyn Any>>,
    outbox: Vec<(String, Value)>,
}

impl SceneContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            palette: config.palette,
            rng: StdRng::seed_from_u64(config.seed),
            stores: HashMap::new(),
            assets: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Uniform sample in `[0, 1)` from the seeded scene RNG.
    pub fn random(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    pub fn smoothstep(&self, t: f32) -> f32 {
        smoothstep(t)
    }

    /// Key-value store that survives re-entry of the scene with this id.
    pub fn store(&mut self, scene_id: &str) -> &mut HashMap<String, Value> {
        self.stores.entry(scene_id.to_string()).or_default()
    }

    /// Queues a scene event; the engine delivers it after `update`.
    pub fn emit(&mut self, name: impl Into<String>, detail: Value) {
        self.outbox.push((name.into(), detail));
    }

    /// Returns the cached asset for `key`, running `loader` on first use.
    pub fn get_asset<T, F>(&mut self, key: &str, loader: F) -> EngineResult<Rc<T>>
    where
        T: Any,
        F: FnOnce() -> Result<T, String>,
    {
        if let Some(asset) = self.assets.get(key) {
            return Rc::clone(asset)
                .downcast::<T>()
                .map_err(|_| EngineError::AssetLoad {
                    key: key.to_string(),
                    reason: "cached asset has a different type".to_string(),
                });
        }
        let asset = Rc::new(loader().map_err(|reason| EngineError::AssetLoad {
            key: key.to_string(),
            reason,
        })?);
        self.assets.insert(key.to_string(), asset.clone() as Rc<dyn Any>);
        Ok(asset)
    }

    pub(crate) fn drain_events(&mut self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.outbox)
    }
}

/// A visual/interaction mode driven by [`FrameState`].
///
/// `update` and `render` are required; the lifecycle hooks default to
/// no-ops. The engine calls `init` once per load and never calls `update`
/// or `render` after `dispose`.
pub trait Scene {
    fn init(&mut self, _ctx: &mut SceneContext) {}
    fn update(&mut self, frame: &FrameState, ctx: &mut SceneContext);
    fn render(&mut self, surface: &mut dyn RenderSurface, frame: &FrameState, ctx: &SceneContext);
    /// Returns the scene to its freshly-initialised state.
    fn reset(&mut self) {}
    fn dispose(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

type SceneFactory = Box<dyn Fn() -> Box<dyn Scene>>;

/// Registration record: metadata plus a factory for fresh instances.
pub struct SceneDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    factory: SceneFactory,
}

impl SceneDefinition {
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Scene> + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            difficulty: Difficulty::Medium,
            factory: Box::new(factory),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }
}

impl std::fmt::Debug for SceneDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("difficulty", &self.difficulty)
            .finish()
    }
}

// --- Events ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEventKind {
    SceneChange,
    SceneDisabled,
    SceneEvent,
}

/// Something a scene emitted through [`SceneContext::emit`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEvent {
    pub name: String,
    pub detail: Value,
    pub scene_id: Option<String>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SceneChange { scene_id: String },
    SceneDisabled,
    Scene(SceneEvent),
}

impl EngineEvent {
    pub fn kind(&self) -> EngineEventKind {
        match self {
            EngineEvent::SceneChange { .. } => EngineEventKind::SceneChange,
            EngineEvent::SceneDisabled => EngineEventKind::SceneDisabled,
            EngineEvent::Scene(_) => EngineEventKind::SceneEvent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&EngineEvent)>;

struct ActiveScene {
    id: String,
    scene: Box<dyn Scene>,
}

// --- Engine ---

/// Frame-state smoother and single-scene host.
pub struct GamifiedEngine {
    config: EngineConfig,
    registry: HashMap<String, SceneDefinition>,
    registration_order: Vec<String>,
    context: SceneContext,
    last_sample: PitchSample,
    frame_state: FrameState,
    last_frame_time: Option<f64>,
    scheduler: FrameScheduler,
    running: bool,
    active: Option<ActiveScene>,
    listeners: Vec<(ListenerId, EngineEventKind, Listener)>,
    next_listener_id: u64,
}

impl GamifiedEngine {
    pub fn new(config: EngineConfig) -> Self {
        let context = SceneContext::new(&config);
        Self {
            config,
            registry: HashMap::new(),
            registration_order: Vec::new(),
            context,
            last_sample: PitchSample::default(),
            frame_state: FrameState::default(),
            last_frame_time: None,
            scheduler: FrameScheduler::new(),
            running: false,
            active: None,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- Registry ---

    pub fn register_scene(&mut self, definition: SceneDefinition) -> EngineResult<()> {
        if definition.id.trim().is_empty() {
            return Err(EngineError::InvalidSceneDefinition(
                "scene definitions require a non-empty id".to_string(),
            ));
        }
        if definition.id == MODE_OFF {
            return Err(EngineError::InvalidSceneDefinition(format!(
                "\"{}\" is reserved",
                MODE_OFF
            )));
        }
        if self.registry.contains_key(&definition.id) {
            warn!("Replacing registered scene \"{}\"", definition.id);
        } else {
            self.registration_order.push(definition.id.clone());
        }
        debug!("Registered scene \"{}\"", definition.id);
        self.registry.insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn has_scene(&self, scene_id: &str) -> bool {
        self.registry.contains_key(scene_id)
    }

    /// Registered scene definitions in registration order.
    pub fn scenes(&self) -> impl Iterator<Item = &SceneDefinition> {
        self.registration_order
            .iter()
            .filter_map(|id| self.registry.get(id))
    }

    pub fn active_scene_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    // --- Scene lifecycle ---

    /// Disposes the active scene and loads a fresh instance of `scene_id`.
    ///
    /// An unknown id fails before anything is touched, so the previous
    /// scene stays active.
    pub fn load_scene(&mut self, scene_id: &str) -> EngineResult<()> {
        let definition = self
            .registry
            .get(scene_id)
            .ok_or_else(|| EngineError::SceneNotRegistered(scene_id.to_string()))?;
        let mut scene = (definition.factory)();

        self.dispose_active_scene();
        scene.init(&mut self.context);
        self.active = Some(ActiveScene {
            id: scene_id.to_string(),
            scene,
        });
        debug!("Loaded scene \"{}\"", scene_id);

        self.dispatch(EngineEvent::SceneChange {
            scene_id: scene_id.to_string(),
        });
        self.flush_scene_events();
        Ok(())
    }

    /// Switches to `mode`; [`MODE_OFF`] disables the arcade and stops the
    /// frame loop.
    pub fn set_mode(&mut self, mode: &str) -> EngineResult<()> {
        if mode == MODE_OFF {
            self.disable();
            self.pause();
            return Ok(());
        }
        self.load_scene(mode)
    }

    /// Disposes the active scene without loading another.
    pub fn disable(&mut self) {
        self.dispose_active_scene();
        self.dispatch(EngineEvent::SceneDisabled);
    }

    fn dispose_active_scene(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.scene.dispose();
            debug!("Disposed scene \"{}\"", active.id);
        }
    }

    // --- Loop control ---

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a frame is scheduled and [`GamifiedEngine::frame`] would run.
    pub fn wants_frame(&self) -> bool {
        self.running && self.scheduler.is_pending()
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_frame_time = None;
        self.scheduler.request();
    }

    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.scheduler.cancel();
    }

    pub fn resume(&mut self) {
        self.start();
    }

    /// Pauses and disables the active scene.
    pub fn stop(&mut self) {
        self.pause();
        self.disable();
    }

    /// Stops and drops all listeners and cached assets.
    pub fn dispose(&mut self) {
        self.stop();
        self.listeners.clear();
        self.context.assets.clear();
    }

    // --- Signal input ---

    /// Replaces the latest sample. Each on-target sample counts as a hit.
    pub fn update_pitch(&mut self, sample: PitchSample) {
        if sample.on_target {
            self.frame_state.notes_hit += 1;
        }
        self.last_sample = sample;
    }

    pub fn last_sample(&self) -> &PitchSample {
        &self.last_sample
    }

    pub fn frame_state(&self) -> &FrameState {
        &self.frame_state
    }

    /// Builds the next frame from the latest sample.
    pub fn build_frame_state(&mut self, now: f64, delta: f64) -> FrameState {
        let delta = if delta.is_finite() { delta.max(0.0) } else { DEFAULT_DELTA_MS };
        let previous = self.frame_state;
        let sample = self.last_sample;

        let normalized_error = clamp(
            smooth_value(
                previous.normalized_error,
                normalize_cents(sample.cents, self.config.max_cent_window),
                self.config.smoothing_factor,
            ),
            -1.0,
            1.0,
        );
        let gate_height = clamp(
            smooth_value(
                previous.gate_height,
                compute_gate_height(normalized_error),
                self.config.gate_smoothing,
            ),
            0.0,
            1.0,
        );
        let confidence = clamp(
            smooth_value(
                previous.confidence,
                clamp(sample.rms * 4.0, 0.0, 1.0),
                self.config.confidence_smoothing,
            ),
            0.0,
            1.0,
        );
        let streak_level = if sample.on_target {
            previous.streak_level.saturating_add(1)
        } else {
            0
        };
        let mut bpm_phase =
            (previous.bpm_phase + (self.config.tempo_bpm / 60_000.0) * delta as f32) % 1.0;
        if !(0.0..1.0).contains(&bpm_phase) {
            bpm_phase = 0.0;
        }

        self.frame_state = FrameState {
            time: now,
            delta,
            normalized_error,
            gate_height,
            confidence,
            streak_level,
            on_target: sample.on_target,
            bpm_phase,
            notes_hit: previous.notes_hit,
        };
        self.frame_state
    }

    /// Runs one scheduled frame: build state, update and render the active
    /// scene, deliver its events, and schedule the next frame.
    ///
    /// Returns `None` when no frame was scheduled (paused or stopped).
    pub fn frame(&mut self, now: f64, surface: &mut dyn RenderSurface) -> Option<FrameState> {
        if !self.running || self.scheduler.take().is_none() {
            return None;
        }
        let delta = self
            .last_frame_time
            .map(|last| now - last)
            .unwrap_or(DEFAULT_DELTA_MS);
        self.last_frame_time = Some(now);
        let frame = self.build_frame_state(now, delta);

        if let Some(active) = self.active.as_mut() {
            active.scene.update(&frame, &mut self.context);
        }
        self.flush_scene_events();

        if let Some(active) = self.active.as_mut() {
            let (width, height) = (surface.width(), surface.height());
            surface.save();
            surface.clear_rect(0.0, 0.0, width, height);
            active.scene.render(surface, &frame, &self.context);
            surface.restore();
        }

        if self.running {
            self.scheduler.request();
        }
        Some(frame)
    }

    // --- Events ---

    pub fn add_event_listener<F>(&mut self, kind: EngineEventKind, handler: F) -> ListenerId
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        self.next_listener_id += 1;
        let id = ListenerId(self.next_listener_id);
        self.listeners.push((id, kind, Box::new(handler)));
        id
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _, _)| *listener_id != id);
        before != self.listeners.len()
    }

    fn flush_scene_events(&mut self) {
        let scene_id = self.active_scene_id().map(str::to_string);
        for (name, detail) in self.context.drain_events() {
            self.dispatch(EngineEvent::Scene(SceneEvent {
                name,
                detail,
                scene_id: scene_id.clone(),
                timestamp: self.frame_state.time,
            }));
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        let kind = event.kind();
        for (_, listener_kind, handler) in self.listeners.iter_mut() {
            if *listener_kind == kind {
                handler(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    #[test]
    fn clamp_keeps_value_within_range() {
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(15.0, 0.0, 10.0), 10.0);
        assert_eq!(clamp(f32::NAN, 0.0, 10.0), 0.0);
    }

    #[test]
    fn clamp_is_idempotent() {
        for x in [-1e9, -3.5, -0.0, 0.25, 0.999, 7.0, f32::INFINITY, f32::NAN] {
            let once = clamp(x, -1.0, 1.0);
            assert_eq!(clamp(once, -1.0, 1.0), once);
        }
    }

    #[test]
    fn normalize_cents_maps_to_unit_range() {
        assert_relative_eq!(normalize_cents(25.0, 50.0), 0.5);
        assert_eq!(normalize_cents(-75.0, 50.0), -1.0);
        assert_eq!(normalize_cents(0.0, 50.0), 0.0);
        assert_eq!(normalize_cents(10.0, 0.0), 0.0);
        assert_eq!(normalize_cents(f32::NAN, 50.0), 0.0);
    }

    #[test]
    fn gate_height_inverts_normalized_error() {
        assert_eq!(compute_gate_height(-1.0), 1.0);
        assert_eq!(compute_gate_height(0.0), 0.5);
        assert_eq!(compute_gate_height(1.0), 0.0);
        assert_eq!(compute_gate_height(3.0), 0.0);
        assert!(compute_gate_height(-0.2) > compute_gate_height(0.2));
    }

    #[test]
    fn smooth_value_eases_toward_target() {
        let smoothed = smooth_value(0.0, 1.0, 0.5);
        assert!(smoothed > 0.0 && smoothed < 1.0);
        assert_eq!(smooth_value(0.2, 1.0, 0.0), 0.2);
        assert_eq!(smooth_value(0.2, 1.0, 1.0), 1.0);
    }

    #[test]
    fn smoothstep_eases_input_curve() {
        assert_eq!(smoothstep(-1.0), 0.0);
        assert_relative_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(2.0), 1.0);
    }

    struct CountingScene {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Scene for CountingScene {
        fn init(&mut self, _ctx: &mut SceneContext) {
            self.log.borrow_mut().push("init");
        }
        fn update(&mut self, _frame: &FrameState, ctx: &mut SceneContext) {
            self.log.borrow_mut().push("update");
            ctx.emit("tick", Value::Null);
        }
        fn render(&mut self, _s: &mut dyn RenderSurface, _f: &FrameState, _c: &SceneContext) {
            self.log.borrow_mut().push("render");
        }
        fn dispose(&mut self) {
            self.log.borrow_mut().push("dispose");
        }
    }

    fn engine_with_counting_scene() -> (GamifiedEngine, Rc<RefCell<Vec<&'static str>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = GamifiedEngine::new(EngineConfig::default());
        let scene_log = log.clone();
        engine
            .register_scene(SceneDefinition::new("counting", "Counting", move || {
                Box::new(CountingScene {
                    log: scene_log.clone(),
                })
            }))
            .unwrap();
        (engine, log)
    }

    #[test]
    fn registration_rejects_empty_and_reserved_ids() {
        let mut engine = GamifiedEngine::new(EngineConfig::default());
        let factory = || -> Box<dyn Scene> { unreachable!() };
        assert!(matches!(
            engine.register_scene(SceneDefinition::new(" ", "Blank", factory)),
            Err(EngineError::InvalidSceneDefinition(_))
        ));
        assert!(matches!(
            engine.register_scene(SceneDefinition::new("off", "Off", factory)),
            Err(EngineError::InvalidSceneDefinition(_))
        ));
    }

    #[test]
    fn unknown_scene_keeps_previous_scene_active() {
        let (mut engine, log) = engine_with_counting_scene();
        engine.load_scene("counting").unwrap();
        let err = engine.load_scene("missing").unwrap_err();
        assert_eq!(err, EngineError::SceneNotRegistered("missing".into()));
        assert_eq!(engine.active_scene_id(), Some("counting"));
        assert_eq!(*log.borrow(), vec!["init"]);
    }

    #[test]
    fn switching_disposes_before_initialising_next() {
        let (mut engine, log) = engine_with_counting_scene();
        engine.load_scene("counting").unwrap();
        engine.load_scene("counting").unwrap();
        assert_eq!(*log.borrow(), vec!["init", "dispose", "init"]);
    }

    #[test]
    fn off_mode_disposes_and_stops_frames() {
        let (mut engine, log) = engine_with_counting_scene();
        let mut surface = RecordingSurface::new(100.0, 100.0);
        engine.set_mode("counting").unwrap();
        engine.start();
        assert!(engine.frame(0.0, &mut surface).is_some());

        engine.set_mode(MODE_OFF).unwrap();
        assert!(!engine.is_running());
        assert!(!engine.wants_frame());
        assert!(engine.frame(16.0, &mut surface).is_none());
        assert_eq!(
            *log.borrow(),
            vec!["init", "update", "render", "dispose"],
            "no update or render after dispose"
        );
        assert_eq!(engine.active_scene_id(), None);
    }

    #[test]
    fn render_is_bracketed_by_save_and_restore() {
        let (mut engine, _log) = engine_with_counting_scene();
        let mut surface = RecordingSurface::new(100.0, 100.0);
        engine.load_scene("counting").unwrap();
        engine.start();
        engine.frame(0.0, &mut surface);
        assert_eq!(surface.save_depth(), 0);
        assert!(matches!(surface.commands.first(), Some(crate::surface::DrawCommand::Save)));
        assert!(matches!(surface.commands.last(), Some(crate::surface::DrawCommand::Restore)));
    }

    #[test]
    fn frames_run_only_when_scheduled() {
        let (mut engine, _log) = engine_with_counting_scene();
        let mut surface = RecordingSurface::new(10.0, 10.0);
        assert!(engine.frame(0.0, &mut surface).is_none());
        engine.start();
        let first = engine.frame(100.0, &mut surface).unwrap();
        assert_eq!(first.delta, 16.0);
        let second = engine.frame(133.0, &mut surface).unwrap();
        assert_eq!(second.delta, 33.0);
        engine.pause();
        assert!(engine.frame(150.0, &mut surface).is_none());
        engine.resume();
        assert_eq!(engine.frame(500.0, &mut surface).unwrap().delta, 16.0);
    }

    #[test]
    fn listeners_receive_events_by_kind_until_removed() {
        let (mut engine, _log) = engine_with_counting_scene();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let scene_listener = engine.add_event_listener(EngineEventKind::SceneEvent, move |event| {
            if let EngineEvent::Scene(scene_event) = event {
                sink.borrow_mut().push(scene_event.name.clone());
            }
        });
        let changes = Rc::new(RefCell::new(0));
        let change_sink = changes.clone();
        engine.add_event_listener(EngineEventKind::SceneChange, move |_| {
            *change_sink.borrow_mut() += 1;
        });

        let mut surface = RecordingSurface::new(10.0, 10.0);
        engine.load_scene("counting").unwrap();
        engine.start();
        engine.frame(0.0, &mut surface);
        assert_eq!(*seen.borrow(), vec!["tick".to_string()]);
        assert_eq!(*changes.borrow(), 1);

        assert!(engine.remove_event_listener(scene_listener));
        engine.frame(16.0, &mut surface);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn frame_state_stays_in_range_under_wild_input() {
        let mut engine = GamifiedEngine::new(EngineConfig::default());
        let inputs = [
            (1e6, true, 50.0),
            (-1e6, false, -3.0),
            (f32::NAN, true, f32::NAN),
            (12.0, false, 0.2),
        ];
        let mut now = 0.0;
        for _ in 0..50 {
            for (cents, on_target, rms) in inputs {
                engine.update_pitch(PitchSample::new(cents, on_target, rms, now));
                let frame = engine.build_frame_state(now, 1234.5);
                assert!((-1.0..=1.0).contains(&frame.normalized_error));
                assert!((0.0..=1.0).contains(&frame.gate_height));
                assert!((0.0..=1.0).contains(&frame.confidence));
                assert!((0.0..1.0).contains(&frame.bpm_phase));
                now += 1234.5;
            }
        }
    }

    #[test]
    fn on_target_samples_count_as_hits() {
        let mut engine = GamifiedEngine::new(EngineConfig::default());
        engine.update_pitch(PitchSample::new(0.0, true, 0.1, 0.0));
        engine.update_pitch(PitchSample::new(30.0, false, 0.1, 1.0));
        engine.update_pitch(PitchSample::new(2.0, true, 0.1, 2.0));
        assert_eq!(engine.build_frame_state(3.0, 16.0).notes_hit, 2);
    }

    #[test]
    fn assets_load_once_and_type_check() {
        let mut ctx = SceneContext::new(&EngineConfig::default());
        let mut loads = 0;
        let first = ctx
            .get_asset("lines", || {
                loads += 1;
                Ok(vec![1.0_f32, 2.0])
            })
            .unwrap();
        let second = ctx
            .get_asset::<Vec<f32>, _>("lines", || Err("should not reload".into()))
            .unwrap();
        assert_eq!(loads, 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert!(ctx.get_asset::<String, _>("lines", || Ok(String::new())).is_err());
        assert!(ctx.get_asset::<u8, _>("broken", || Err("nope".into())).is_err());
    }
}
