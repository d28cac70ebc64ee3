//! # Piano Keyboard Widget
//!
//! Three octaves (C3 to B5) with keys lit by the detection session. A lit
//! key's brightness follows its highlight intensity: 1.0 for an in-tune
//! note, up to 2.0 for one that is 50 cents or more off.

use audiation_core::tuning::NOTE_NAMES;
use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};
use std::collections::HashMap;

const FIRST_OCTAVE: i32 = 3;
const OCTAVES: usize = 3;
const KEYBOARD_HEIGHT: f32 = 110.0;

/// C, C#, D, D#, E, F, F#, G, G#, A, A#, B
const IS_BLACK: [bool; 12] = [
    false, true, false, true, false, false, true, false, true, false, true, false,
];

#[derive(Debug, Clone)]
pub struct PianoKeyboard {
    /// Note name -> highlight intensity
    lit: HashMap<String, f32>,
}

impl PianoKeyboard {
    pub fn new(lit: HashMap<String, f32>) -> Self {
        Self { lit }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(KEYBOARD_HEIGHT)),
        )
        .into()
    }

    fn key_color(&self, note: &str, base: Color) -> Color {
        match self.lit.get(note) {
            Some(intensity) => {
                let strength = (intensity / 2.0).clamp(0.3, 1.0);
                let glow = Color::from_rgb8(0x00, 0xff, 0xff);
                Color::from_rgb(
                    base.r + (glow.r - base.r) * strength,
                    base.g + (glow.g - base.g) * strength,
                    base.b + (glow.b - base.b) * strength,
                )
            }
            None => base,
        }
    }
}

fn keys() -> impl Iterator<Item = (String, bool)> {
    (0..OCTAVES * 12).map(|i| {
        let octave = FIRST_OCTAVE + (i / 12) as i32;
        (format!("{}{}", NOTE_NAMES[i % 12], octave), IS_BLACK[i % 12])
    })
}

impl<Message> canvas::Program<Message> for PianoKeyboard {
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
        let white_count = keys().filter(|(_, black)| !black).count();
        let white_width = bounds.width / white_count as f32;
        let black_width = white_width * 0.6;
        let black_height = bounds.height * 0.6;
        let outline = Stroke::default().with_width(1.0).with_color(Color::BLACK);

        // White keys first so black keys paint over them.
        let mut white_index = 0;
        for (note, black) in keys() {
            if black {
                continue;
            }
            let key = Path::rectangle(
                Point::new(white_index as f32 * white_width, 0.0),
                Size::new(white_width, bounds.height),
            );
            frame.fill(&key, self.key_color(&note, Color::WHITE));
            frame.stroke(&key, outline);
            white_index += 1;
        }

        let mut white_index = 0;
        for (note, black) in keys() {
            if !black {
                white_index += 1;
                continue;
            }
            let x = white_index as f32 * white_width - black_width / 2.0;
            let key = Path::rectangle(Point::new(x, 0.0), Size::new(black_width, black_height));
            frame.fill(&key, self.key_color(&note, Color::from_rgb8(0x20, 0x20, 0x20)));
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_spans_c3_to_b5() {
        let all: Vec<String> = keys().map(|(note, _)| note).collect();
        assert_eq!(all.len(), 36);
        assert_eq!(all.first().map(String::as_str), Some("C3"));
        assert_eq!(all.last().map(String::as_str), Some("B5"));
        assert_eq!(keys().filter(|(_, black)| !black).count(), 21);
    }
}
