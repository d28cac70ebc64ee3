//! Note detection view: live note, chord and melody, with spectrum and
//! keyboard below.

use super::cent_meter::CentMeter;
use super::status_line;
use crate::widgets::piano_keyboard::PianoKeyboard;
use crate::widgets::spectrogram::Spectrogram;
use crate::{AudiationApp, Message};
use audiation_core::surface::Color as CoreColor;
use iced::widget::{button, column, container, pick_list, row, text, Space};
use iced::{Alignment, Color, Element, Length};

pub fn view(app: &AudiationApp) -> Element<'_, Message> {
    let session = &app.detection;
    let running = session.is_detecting();

    let start = button(text("Start")).on_press_maybe((!running).then_some(Message::StartDetection));
    let stop = button(text("Stop")).on_press_maybe(running.then_some(Message::StopDetection));
    let controls = row![
        pick_list(app.devices.as_slice(), app.selected_device.as_ref(), Message::InputSelected)
            .placeholder("Default input"),
        start,
        stop,
        button(text("Clear melody")).on_press(Message::ClearMelody),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let reading = app.detection_display.as_ref();
    let note = reading.map(|r| r.note.as_str()).unwrap_or("--");
    let details = match reading {
        Some(r) => format!(
            "{:.2} Hz   {:+.1}¢   octave {}",
            r.frequency,
            r.cents,
            r.octave.map(|o| o.to_string()).unwrap_or_else(|| "-".into())
        ),
        None => "Waiting for a clear note".to_string(),
    };
    let heard = app.detection_chord.as_ref();
    let chord = heard
        .map(|c| &c.chord)
        .or_else(|| reading.and_then(|r| r.chord.as_ref()))
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".into());
    let scale = heard
        .map(|c| c.scale)
        .or_else(|| reading.map(|r| r.scale))
        .unwrap_or("-");

    let readout = column![
        text(note).size(64),
        text(details).size(16),
        text(format!("Chord: {}   Scale: {}", chord, scale)).size(16),
        text(format!("Melody: {}", session.melody_text())).size(14),
    ]
    .spacing(6);

    let spectrum_color = waveform_color(session.waveform_color());
    let spectrum = container(Spectrogram::new(session.spectrum().to_vec(), spectrum_color).view())
        .width(Length::Fill)
        .height(Length::Fixed(180.0));
    let lit = session
        .active_keys()
        .map(|(note, intensity)| (note.to_string(), intensity))
        .collect();

    column![
        controls,
        status_line(app.status.as_deref()),
        Space::with_height(10),
        readout,
        CentMeter::new(reading.map(|r| r.cents)).view(),
        spectrum,
        PianoKeyboard::new(lit).view(),
    ]
    .spacing(12)
    .into()
}

fn waveform_color(hex: &str) -> Color {
    CoreColor::from_hex(hex)
        .map(|c| Color::from_rgb(c.r, c.g, c.b))
        .unwrap_or(Color::from_rgb8(0x34, 0x98, 0xdb))
}
