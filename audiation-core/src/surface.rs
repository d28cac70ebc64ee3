//! # Rendering Surface Module
//!
//! The 2D drawing contract scenes render through. The GUI adapts it onto an
//! iced canvas frame; tests use [`RecordingSurface`] to inspect what a scene
//! drew. Coordinates are in surface pixels, origin top-left.

use serde::{Deserialize, Serialize};

/// RGBA colour, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
    }

    /// Parses `#rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        Some(Self::from_rgb8(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Linear blend toward `other`, `t` in `[0, 1]`.
    pub fn mix(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

/// Linear gradient between two points with colour stops in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub stops: Vec<(f32, Color)>,
}

impl LinearGradient {
    pub fn new(start: (f32, f32), end: (f32, f32)) -> Self {
        Self {
            start,
            end,
            stops: Vec::new(),
        }
    }

    pub fn add_stop(mut self, offset: f32, color: Color) -> Self {
        self.stops.push((offset.clamp(0.0, 1.0), color));
        self.stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    /// Colour at `t` along the gradient axis.
    pub fn sample(&self, t: f32) -> Color {
        let Some(first) = self.stops.first() else {
            return Color::TRANSPARENT;
        };
        if t <= first.0 {
            return first.1;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.0 {
                let span = (b.0 - a.0).max(f32::EPSILON);
                return a.1.mix(b.1, (t - a.0) / span);
            }
        }
        self.stops.last().map(|s| s.1).unwrap_or(first.1)
    }
}

/// Fill style for closed shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear(LinearGradient),
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

impl From<LinearGradient> for Paint {
    fn from(gradient: LinearGradient) -> Self {
        Paint::Linear(gradient)
    }
}

/// Outline style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f32,
}

impl StrokeStyle {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

/// Drawing primitives a scene may issue each frame.
///
/// `save`/`restore` bracket the global alpha and shadow state.
pub trait RenderSurface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;

    fn save(&mut self);
    fn restore(&mut self);

    fn clear_rect(&mut self, x: f32, y: f32, w: f32, h: f32);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint);
    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, stroke: StrokeStyle);
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: StrokeStyle);
    /// Full-circle arc, filled.
    fn fill_arc(&mut self, center: (f32, f32), radius: f32, paint: &Paint);
    /// Full-circle arc, outlined.
    fn stroke_arc(&mut self, center: (f32, f32), radius: f32, stroke: StrokeStyle);

    fn set_global_alpha(&mut self, alpha: f32);
    fn set_shadow(&mut self, color: Color, blur: f32);
}

/// One recorded call on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    ClearRect { x: f32, y: f32, w: f32, h: f32 },
    FillRect { x: f32, y: f32, w: f32, h: f32, paint: Paint, alpha: f32 },
    StrokeRect { x: f32, y: f32, w: f32, h: f32, stroke: StrokeStyle },
    StrokeLine { from: (f32, f32), to: (f32, f32), stroke: StrokeStyle },
    FillArc { center: (f32, f32), radius: f32, paint: Paint, shadow: Color, shadow_blur: f32 },
    StrokeArc { center: (f32, f32), radius: f32, stroke: StrokeStyle },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawState {
    alpha: f32,
    shadow: Color,
    shadow_blur: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            shadow: Color::TRANSPARENT,
            shadow_blur: 0.0,
        }
    }
}

/// Surface that records every call instead of drawing.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: f32,
    height: f32,
    state: DrawState,
    stack: Vec<DrawState>,
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            state: DrawState::default(),
            stack: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Depth of unmatched `save` calls.
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    pub fn count(&self, pred: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl RenderSurface for RecordingSurface {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn save(&mut self) {
        self.stack.push(self.state);
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        self.commands.push(DrawCommand::Restore);
    }

    fn clear_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.commands.push(DrawCommand::ClearRect { x, y, w, h });
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            w,
            h,
            paint: paint.clone(),
            alpha: self.state.alpha,
        });
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, stroke: StrokeStyle) {
        self.commands.push(DrawCommand::StrokeRect { x, y, w, h, stroke });
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: StrokeStyle) {
        self.commands.push(DrawCommand::StrokeLine { from, to, stroke });
    }

    fn fill_arc(&mut self, center: (f32, f32), radius: f32, paint: &Paint) {
        self.commands.push(DrawCommand::FillArc {
            center,
            radius,
            paint: paint.clone(),
            shadow: self.state.shadow,
            shadow_blur: self.state.shadow_blur,
        });
    }

    fn stroke_arc(&mut self, center: (f32, f32), radius: f32, stroke: StrokeStyle) {
        self.commands.push(DrawCommand::StrokeArc {
            center,
            radius,
            stroke,
        });
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_shadow(&mut self, color: Color, blur: f32) {
        self.state.shadow = color;
        self.state.shadow_blur = blur.max(0.0);
    }
}

/// Draws recorded commands onto `target`.
///
/// Alpha and shadow were captured per command, so they are re-applied
/// before each fill instead of replaying the original setter calls.
pub fn replay(commands: &[DrawCommand], target: &mut dyn RenderSurface) {
    for command in commands {
        match command {
            DrawCommand::Save => target.save(),
            DrawCommand::Restore => target.restore(),
            DrawCommand::ClearRect { x, y, w, h } => target.clear_rect(*x, *y, *w, *h),
            DrawCommand::FillRect { x, y, w, h, paint, alpha } => {
                target.set_global_alpha(*alpha);
                target.fill_rect(*x, *y, *w, *h, paint);
            }
            DrawCommand::StrokeRect { x, y, w, h, stroke } => target.stroke_rect(*x, *y, *w, *h, *stroke),
            DrawCommand::StrokeLine { from, to, stroke } => target.stroke_line(*from, *to, *stroke),
            DrawCommand::FillArc { center, radius, paint, shadow, shadow_blur } => {
                target.set_shadow(*shadow, *shadow_blur);
                target.fill_arc(*center, *radius, paint);
            }
            DrawCommand::StrokeArc { center, radius, stroke } => target.stroke_arc(*center, *radius, *stroke),
        }
    }
}
