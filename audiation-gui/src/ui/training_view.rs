//! Pitch training view: targets, meter, score board and the optional
//! arcade canvas.

use super::cent_meter::{zone_color, CentMeter};
use super::status_line;
use crate::widgets::arcade_canvas::ArcadeCanvas;
use crate::{AudiationApp, Message};
use audiation_core::session::TrainingLevel;
use audiation_core::tone::Waveform;
use iced::widget::{button, column, pick_list, progress_bar, row, text, Space};
use iced::{Alignment, Element, Length};

pub fn view(app: &AudiationApp) -> Element<'_, Message> {
    let session = &app.training;
    let running = session.is_training();
    let stats = session.stats();

    let controls = row![
        pick_list(&TrainingLevel::ALL[..], Some(session.level()), Message::LevelSelected),
        pick_list(&Waveform::ALL[..], Some(session.waveform()), Message::WaveformSelected),
        pick_list(app.arcade_modes.as_slice(), Some(session.arcade_mode().to_string()), Message::ArcadeModeSelected),
        button(text("Start")).on_press_maybe((!running).then_some(Message::StartTraining)),
        button(text("Stop")).on_press_maybe(running.then_some(Message::StopTraining)),
        button(text("Play target")).on_press_maybe(session.target().map(|_| Message::PlayTargetNote)),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let target = session
        .target()
        .map(|t| format!("Target: {}", t.note))
        .unwrap_or_else(|| "Target: ---".into());
    let you = match session.reading() {
        Some(r) => format!(
            "You: {} ({:.2} Hz)",
            r.note.as_deref().unwrap_or("---"),
            r.frequency
        ),
        None => "You: ---".to_string(),
    };
    let guidance = match session.reading() {
        Some(r) => text(session.guidance().to_string()).color(zone_color(r.zone)),
        None => text(session.guidance().to_string()),
    };
    let feedback = session.feedback().map(|f| f.to_string()).unwrap_or_default();

    let board = row![
        text(format!("Score: {}", stats.score)),
        text(format!("Streak: {}", stats.streak)),
        text(format!("Best: {}", stats.best_streak)),
        text(format!("Accuracy: {}%", stats.accuracy())),
        text(format!("Notes: {}", stats.notes_presented)),
        text(format!("Time: {}s", stats.time_left_secs)),
    ]
    .spacing(20);

    let mut content = column![
        controls,
        status_line(app.status.as_deref()),
        Space::with_height(10),
        row![text(target).size(32), Space::with_width(40), text(you).size(24)].align_y(Alignment::Center),
        CentMeter::new(session.reading().map(|r| r.meter_position())).view(),
        guidance.size(16),
        progress_bar(0.0..=1.0, session.volume()).height(Length::Fixed(8.0)),
        text(feedback).size(20),
        board,
    ]
    .spacing(12);

    if session.arcade_enabled() {
        let tally = session.arcade_tally();
        content = content
            .push(ArcadeCanvas::new(session.arcade_surface().commands.clone()).view())
            .push(text(format!("Gates passed: {}   missed: {}", tally.passed, tally.missed)).size(14));
    }

    content.into()
}
