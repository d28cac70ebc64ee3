//! # Arcade Canvas Widget
//!
//! Shows the pitch arcade. The engine draws into a recording surface inside
//! the training tick; this widget replays those commands onto an iced
//! canvas frame through [`FrameSurface`].

use audiation_core::surface::{self, Color, DrawCommand, Paint, RenderSurface, StrokeStyle};
use iced::widget::canvas::{self, gradient, Fill, Geometry, Gradient, Path, Stroke, Style};
use iced::widget::container;
use iced::{mouse, Element, Point, Rectangle, Renderer, Size, Theme};

pub const ARCADE_WIDTH: f32 = 640.0;
pub const ARCADE_HEIGHT: f32 = 240.0;

pub struct ArcadeCanvas {
    commands: Vec<DrawCommand>,
}

impl ArcadeCanvas {
    pub fn new(commands: Vec<DrawCommand>) -> Self {
        Self { commands }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fixed(ARCADE_WIDTH))
                .height(iced::Length::Fixed(ARCADE_HEIGHT)),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for ArcadeCanvas {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let mut target = FrameSurface::new(&mut frame, bounds.size());
        surface::replay(&self.commands, &mut target);
        vec![frame.into_geometry()]
    }
}

#[derive(Debug, Clone, Copy)]
struct DrawState {
    alpha: f32,
    shadow: Color,
    shadow_blur: f32,
}

/// [`RenderSurface`] over an iced canvas frame.
///
/// Canvas has no global alpha or shadow, so alpha is folded into each fill
/// colour and a shadow becomes a translucent halo behind the arc.
struct FrameSurface<'a> {
    frame: &'a mut canvas::Frame,
    size: Size,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl<'a> FrameSurface<'a> {
    fn new(frame: &'a mut canvas::Frame, size: Size) -> Self {
        Self {
            frame,
            size,
            state: DrawState {
                alpha: 1.0,
                shadow: Color::TRANSPARENT,
                shadow_blur: 0.0,
            },
            stack: Vec::new(),
        }
    }

    fn color(&self, color: Color) -> iced::Color {
        iced::Color::from_rgba(color.r, color.g, color.b, color.a * self.state.alpha)
    }

    fn fill(&self, paint: &Paint) -> Fill {
        match paint {
            Paint::Solid(color) => Fill::from(self.color(*color)),
            Paint::Linear(linear) => {
                let mut iced_gradient = gradient::Linear::new(
                    Point::new(linear.start.0, linear.start.1),
                    Point::new(linear.end.0, linear.end.1),
                );
                for (offset, color) in &linear.stops {
                    iced_gradient = iced_gradient.add_stop(*offset, self.color(*color));
                }
                Fill {
                    style: Style::Gradient(Gradient::Linear(iced_gradient)),
                    ..Fill::default()
                }
            }
        }
    }

    fn stroke(&self, stroke: StrokeStyle) -> Stroke<'static> {
        Stroke::default()
            .with_width(stroke.width)
            .with_color(self.color(stroke.color))
    }
}

impl RenderSurface for FrameSurface<'_> {
    fn width(&self) -> f32 {
        self.size.width
    }

    fn height(&self) -> f32 {
        self.size.height
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    // A fresh frame is already clear.
    fn clear_rect(&mut self, _x: f32, _y: f32, _w: f32, _h: f32) {}

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint) {
        let fill = self.fill(paint);
        self.frame
            .fill(&Path::rectangle(Point::new(x, y), Size::new(w, h)), fill);
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, stroke: StrokeStyle) {
        let stroke = self.stroke(stroke);
        self.frame
            .stroke(&Path::rectangle(Point::new(x, y), Size::new(w, h)), stroke);
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: StrokeStyle) {
        let stroke = self.stroke(stroke);
        self.frame.stroke(
            &Path::line(Point::new(from.0, from.1), Point::new(to.0, to.1)),
            stroke,
        );
    }

    fn fill_arc(&mut self, center: (f32, f32), radius: f32, paint: &Paint) {
        let center = Point::new(center.0, center.1);
        if self.state.shadow_blur > 0.0 && self.state.shadow.a > 0.0 {
            let halo = self.state.shadow.with_alpha(self.state.shadow.a * 0.35);
            let halo_fill = Fill::from(self.color(halo));
            self.frame
                .fill(&Path::circle(center, radius + self.state.shadow_blur * 0.5), halo_fill);
        }
        let fill = self.fill(paint);
        self.frame.fill(&Path::circle(center, radius), fill);
    }

    fn stroke_arc(&mut self, center: (f32, f32), radius: f32, stroke: StrokeStyle) {
        let stroke = self.stroke(stroke);
        self.frame
            .stroke(&Path::circle(Point::new(center.0, center.1), radius), stroke);
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_shadow(&mut self, color: Color, blur: f32) {
        self.state.shadow = color;
        self.state.shadow_blur = blur.max(0.0);
    }
}
