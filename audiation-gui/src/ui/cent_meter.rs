//! # Cent Meter Widget
//!
//! Horizontal needle over a -50..+50 cent scale, coloured by accuracy zone:
//! green within 10 cents, yellow within 30, red beyond.

use audiation_core::session::AccuracyZone;
use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};

const METER_RANGE: f32 = 50.0;

pub struct CentMeter {
    /// `None` while there is no signal
    cents: Option<f32>,
}

impl CentMeter {
    pub fn new(cents: Option<f32>) -> Self {
        Self { cents }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(60.0)),
        )
        .into()
    }
}

pub fn zone_color(zone: AccuracyZone) -> Color {
    match zone {
        AccuracyZone::Good => Color::from_rgb8(0x00, 0xff, 0x00),
        AccuracyZone::Close => Color::from_rgb8(0xff, 0xff, 0x00),
        AccuracyZone::Off => Color::from_rgb8(0xff, 0x00, 0x00),
    }
}

impl<Message> canvas::Program<Message> for CentMeter {
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
        frame.fill(&background, Color::from_rgb8(0x40, 0x40, 0x40));

        let center_x = bounds.width / 2.0;
        let center_line = Path::line(
            Point::new(center_x, 0.0),
            Point::new(center_x, bounds.height),
        );
        frame.stroke(&center_line, Stroke::default().with_width(2.0).with_color(Color::WHITE));

        if let Some(cents) = self.cents {
            let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
            let needle_x = (clamped + METER_RANGE) / (2.0 * METER_RANGE) * bounds.width;
            let needle = Path::rectangle(Point::new(needle_x - 2.0, 0.0), Size::new(4.0, bounds.height));
            frame.fill(&needle, zone_color(AccuracyZone::from_cents(cents)));
        }

        vec![frame.into_geometry()]
    }
}
