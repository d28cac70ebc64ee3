//! # Widgets Module
//!
//! Canvas widgets shared by the practice views.

pub mod arcade_canvas;
pub mod piano_keyboard;
pub mod spectrogram;
