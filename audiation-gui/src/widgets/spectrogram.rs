//! # Spectrum Widget
//!
//! Bar chart of the byte-scaled magnitude spectrum coming out of the
//! analyser. Values are already mapped through the decibel window, so bars
//! are drawn linearly. Only the lower part of the spectrum is shown, where
//! sung and played notes live.

use iced::widget::canvas::{self, Geometry, Path};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};

/// Share of the bins drawn, starting from DC.
const VISIBLE_FRACTION: f32 = 0.25;

pub struct Spectrogram {
    data: Vec<u8>,
    color: Color,
}

impl Spectrogram {
    pub fn new(data: Vec<u8>, color: Color) -> Self {
        Self { data, color }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for Spectrogram {
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
        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x10, 0x10, 0x18));

        let visible = ((self.data.len() as f32 * VISIBLE_FRACTION) as usize).min(self.data.len());
        if !bounds.width.is_finite() || !bounds.height.is_finite() || visible == 0 {
            return vec![frame.into_geometry()];
        }

        let bar_width = (bounds.width / visible as f32).max(1.0);
        for (i, &value) in self.data[..visible].iter().enumerate() {
            let height = value as f32 / 255.0 * bounds.height;
            if height > 0.0 {
                let bar = Path::rectangle(
                    Point::new(i as f32 * bar_width, bounds.height - height),
                    Size::new(bar_width, height),
                );
                frame.fill(&bar, self.color);
            }
        }

        vec![frame.into_geometry()]
    }
}
