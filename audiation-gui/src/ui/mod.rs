//! # UI Module
//!
//! Layout of the two practice views and the tab bar above them.

pub mod cent_meter;
pub mod detection_view;
pub mod training_view;

use crate::{AudiationApp, Message, Tab};
use iced::widget::{button, column, container, row, text, Space};
use iced::{Element, Length};

pub fn create_main_view(app: &AudiationApp) -> Element<'_, Message> {
    let tab_button = |label: &'static str, tab: Tab| {
        let b = button(text(label).size(16));
        if app.tab == tab { b } else { b.on_press(Message::SelectTab(tab)) }
    };
    let tabs = row![
        text("Audiation").size(28),
        Space::with_width(Length::Fill),
        tab_button("Note Detection", Tab::Detection),
        tab_button("Pitch Training", Tab::Training),
    ]
    .spacing(10);

    let body = match app.tab {
        Tab::Detection => detection_view::view(app),
        Tab::Training => training_view::view(app),
    };

    container(column![tabs, Space::with_height(20), body].padding(20))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Tinted status line, or nothing.
pub fn status_line(status: Option<&str>) -> Element<'static, Message> {
    match status {
        Some(message) => text(message.to_string())
            .size(14)
            .color(iced::Color::from_rgb8(0xff, 0x66, 0x66))
            .into(),
        None => Space::with_height(0).into(),
    }
}
