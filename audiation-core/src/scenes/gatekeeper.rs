//! Gatekeeper: steer an orb through scrolling gates by pitch height.
//!
//! Gates spawn off the right edge near the current gate height, scroll left
//! at a fixed speed, and are judged once when they cross the pass line.
//! Longer streaks narrow the openings.

use crate::engine::{clamp, Difficulty, FrameState, Scene, SceneContext, SceneDefinition};
use crate::surface::{Color, LinearGradient, Paint, RenderSurface, StrokeStyle};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

pub const GATEKEEPER_ID: &str = "gatekeeper";
pub const GATE_PASSED: &str = "gatePassed";
pub const GATE_MISSED: &str = "gateMissed";

const SPAWN_X: f32 = 1.1;
const DESPAWN_X: f32 = -0.2;
const TUNNEL_LINES: usize = 7;
const ORB_BASE_RADIUS: f32 = 16.0;

const STORE_PASSED: &str = "gatesPassed";
const STORE_MISSED: &str = "gatesMissed";
const TUNNEL_ASSET: &str = "gatekeeper.tunnel-lines";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Judgement line, normalised x
    pub pass_x: f32,
    /// Extra room on each side of the opening
    pub pass_tolerance: f32,
    pub base_opening: f32,
    pub min_opening: f32,
    /// Normalised width units per millisecond
    pub tunnel_speed: f32,
    pub spawn_interval_ms: f64,
    pub orb_follow_rate: f32,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            pass_x: 0.32,
            pass_tolerance: 0.08,
            base_opening: 0.32,
            min_opening: 0.18,
            tunnel_speed: 0.00045,
            spawn_interval_ms: 1500.0,
            orb_follow_rate: 0.18,
        }
    }
}

/// Whether an orb at `orb_y` clears a gate.
///
/// The gap is the half-opening widened by `tolerance` on each side.
pub fn gate_collision(orb_y: f32, gate_center: f32, opening: f32, tolerance: f32) -> bool {
    let half_gap = opening / 2.0 + tolerance;
    (orb_y - gate_center).abs() <= half_gap
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Pending,
    Passed,
    Missed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub id: String,
    /// Normalised horizontal position; spawns at 1.1
    pub x: f32,
    pub center: f32,
    pub opening: f32,
    pub status: GateStatus,
}

impl Gate {
    pub fn is_resolved(&self) -> bool {
        self.status != GateStatus::Pending
    }
}

/// Detail payload of `gatePassed` / `gateMissed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateEvent {
    pub gate_id: String,
    pub center: f32,
    pub opening: f32,
    pub streak_level: u32,
}

#[derive(Debug)]
pub struct GatekeeperScene {
    config: GatekeeperConfig,
    orb_y: f32,
    elapsed_since_spawn: f64,
    gates: Vec<Gate>,
    gate_counter: u64,
    tunnel_offsets: Option<Rc<Vec<f32>>>,
}

impl Default for GatekeeperScene {
    fn default() -> Self {
        Self::new()
    }
}

impl GatekeeperScene {
    pub fn new() -> Self {
        Self::with_config(GatekeeperConfig::default())
    }

    pub fn with_config(config: GatekeeperConfig) -> Self {
        Self {
            config,
            orb_y: 0.5,
            elapsed_since_spawn: 0.0,
            gates: Vec::new(),
            gate_counter: 0,
            tunnel_offsets: None,
        }
    }

    pub fn orb_y(&self) -> f32 {
        self.orb_y
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn spawn_gate(&mut self, frame: &FrameState, ctx: &mut SceneContext) {
        let jitter = (ctx.random() - 0.5) * 0.2;
        let center = clamp(frame.gate_height + jitter, 0.15, 0.85);
        let shrink = clamp(frame.streak_level as f32 * 0.01, 0.0, 0.12);
        let opening = clamp(
            self.config.base_opening - shrink,
            self.config.min_opening,
            self.config.base_opening,
        );
        self.gates.push(Gate {
            id: format!("gate-{}", self.gate_counter),
            x: SPAWN_X,
            center,
            opening,
            status: GateStatus::Pending,
        });
        self.gate_counter += 1;
    }

    /// Judges a pending gate and emits its event. Resolved gates are left
    /// untouched.
    fn resolve_gate(
        orb_y: f32,
        tolerance: f32,
        gate: &mut Gate,
        frame: &FrameState,
        ctx: &mut SceneContext,
    ) {
        if gate.is_resolved() {
            return;
        }
        let passed = gate_collision(orb_y, gate.center, gate.opening, tolerance);
        gate.status = if passed {
            GateStatus::Passed
        } else {
            GateStatus::Missed
        };

        let (name, tally) = if passed {
            (GATE_PASSED, STORE_PASSED)
        } else {
            (GATE_MISSED, STORE_MISSED)
        };
        let store = ctx.store(GATEKEEPER_ID);
        let total = store.get(tally).and_then(Value::as_u64).unwrap_or(0) + 1;
        store.insert(tally.to_string(), Value::from(total));

        let detail = GateEvent {
            gate_id: gate.id.clone(),
            center: gate.center,
            opening: gate.opening,
            streak_level: frame.streak_level,
        };
        match serde_json::to_value(&detail) {
            Ok(detail) => ctx.emit(name, detail),
            Err(e) => warn!("Could not encode {} payload: {}", name, e),
        }
    }

    fn draw_background(&self, surface: &mut dyn RenderSurface, palette_bg: Color) {
        let (w, h) = (surface.width(), surface.height());
        let gradient = LinearGradient::new((0.0, 0.0), (0.0, h))
            .add_stop(0.0, palette_bg)
            .add_stop(1.0, Color::from_rgb8(0x09, 0x05, 0x1c));
        surface.fill_rect(0.0, 0.0, w, h, &Paint::Linear(gradient));
    }

    fn draw_tunnel_lines(&self, surface: &mut dyn RenderSurface, offsets: &[f32]) {
        let (w, h) = (surface.width(), surface.height());
        let stroke = StrokeStyle::new(Color::WHITE.with_alpha(0.05), 1.0);
        for &offset in offsets {
            let x = offset * w;
            surface.stroke_line((x, 0.0), (x + w * 0.05, h), stroke);
        }
    }

    fn draw_gates(&self, surface: &mut dyn RenderSurface, ctx: &SceneContext) {
        let (w, h) = (surface.width(), surface.height());
        let gate_width = w * 0.06;
        let outline = StrokeStyle::new(Color::WHITE.with_alpha(0.15), 1.0);

        for gate in &self.gates {
            let x = gate.x * w;
            if x + gate_width < 0.0 || x > w {
                continue;
            }
            let center_y = gate.center * h;
            let gap = gate.opening * h;
            let top_end = center_y - gap / 2.0;
            let bottom_start = center_y + gap / 2.0;

            let fill: Paint = match gate.status {
                GateStatus::Missed => ctx.palette.danger.into(),
                _ => ctx.palette.primary.into(),
            };
            surface.set_global_alpha(if gate.is_resolved() { 0.35 } else { 0.6 });
            surface.fill_rect(x, 0.0, gate_width, top_end.max(0.0), &fill);
            surface.fill_rect(x, bottom_start, gate_width, (h - bottom_start).max(0.0), &fill);
            surface.set_global_alpha(1.0);
            surface.stroke_rect(x, 0.0, gate_width, h, outline);
        }
    }

    fn draw_orb(&self, surface: &mut dyn RenderSurface, frame: &FrameState, ctx: &SceneContext) {
        let (w, h) = (surface.width(), surface.height());
        let center = (self.config.pass_x * w + w * 0.05, clamp(self.orb_y, 0.05, 0.95) * h);
        let radius = ORB_BASE_RADIUS - clamp(frame.streak_level as f32 * 0.5, 0.0, 6.0);
        let glow = if frame.on_target {
            ctx.palette.primary
        } else {
            ctx.palette.accent
        };

        surface.set_shadow(glow, if frame.on_target { 25.0 } else { 10.0 });
        surface.fill_arc(center, radius, &Paint::Solid(glow));
        surface.set_shadow(glow, 0.0);
        surface.stroke_arc(center, radius, StrokeStyle::new(Color::WHITE.with_alpha(0.3), 2.0));
    }
}

impl Scene for GatekeeperScene {
    fn init(&mut self, ctx: &mut SceneContext) {
        let store = ctx.store(GATEKEEPER_ID);
        store.entry(STORE_PASSED.to_string()).or_insert(Value::from(0u64));
        store.entry(STORE_MISSED.to_string()).or_insert(Value::from(0u64));
        self.tunnel_offsets = match ctx.get_asset(TUNNEL_ASSET, || {
            Ok((0..TUNNEL_LINES)
                .map(|i| i as f32 / (TUNNEL_LINES - 1) as f32)
                .collect::<Vec<f32>>())
        }) {
            Ok(offsets) => Some(offsets),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        self.reset();
    }

    fn update(&mut self, frame: &FrameState, ctx: &mut SceneContext) {
        let delta = if frame.delta > 0.0 { frame.delta } else { 16.0 };
        self.elapsed_since_spawn += delta;
        if self.elapsed_since_spawn >= self.config.spawn_interval_ms {
            self.spawn_gate(frame, ctx);
            self.elapsed_since_spawn = 0.0;
        }

        let follow_rate = clamp(self.config.orb_follow_rate + frame.confidence * 0.2, 0.08, 0.4);
        let target_y = clamp(frame.gate_height, 0.05, 0.95);
        self.orb_y += (target_y - self.orb_y) * follow_rate;

        let speed = self.config.tunnel_speed * delta as f32;
        let (orb_y, pass_x, tolerance) = (self.orb_y, self.config.pass_x, self.config.pass_tolerance);
        for gate in self.gates.iter_mut() {
            gate.x -= speed;
            if gate.x <= pass_x {
                Self::resolve_gate(orb_y, tolerance, gate, frame, ctx);
            }
        }
        self.gates.retain(|gate| gate.x > DESPAWN_X);
    }

    fn render(&mut self, surface: &mut dyn RenderSurface, frame: &FrameState, ctx: &SceneContext) {
        self.draw_background(surface, ctx.palette.background);
        if let Some(offsets) = &self.tunnel_offsets {
            self.draw_tunnel_lines(surface, offsets);
        }
        self.draw_gates(surface, ctx);
        self.draw_orb(surface, frame, ctx);
    }

    fn reset(&mut self) {
        self.orb_y = 0.5;
        self.elapsed_since_spawn = 0.0;
        self.gates.clear();
    }

    fn dispose(&mut self) {
        self.gates.clear();
    }
}

pub fn gatekeeper_definition() -> SceneDefinition {
    SceneDefinition::new(GATEKEEPER_ID, "Gatekeeper", || Box::new(GatekeeperScene::new()))
        .with_description("Guide the orb through gates by matching pitch height.")
        .with_difficulty(Difficulty::Medium)
}
