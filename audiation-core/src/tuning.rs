//! # Musical Tuning Module
//!
//! Equal-temperament conversions between MIDI numbers, frequencies and note
//! names, plus frequency snapping with a cents window.
//!
//! ## Features
//! - MIDI <-> frequency <-> note name (sharps only, A4 = 440 Hz)
//! - Cent deviation calculations
//! - Snapping a raw frequency to the nearest note, rejecting wide misses
//! - Pitch-class lookup for chord work (accepts sharps and flats)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reference pitch in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI number of the reference pitch.
pub const A4_MIDI: i32 = 69;

/// Chromatic note names starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch class (0-11) for every spelling we accept, flats included.
///
/// Built once; chord inference and the keyboard view hit it every tick.
static PITCH_CLASSES: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, u8> = NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i as u8))
        .collect();
    for (flat, class) in [("Db", 1), ("Eb", 3), ("Gb", 6), ("Ab", 8), ("Bb", 10)] {
        map.insert(flat, class);
    }
    map
});

/// Bounds used when snapping a frequency to a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchOptions {
    /// Lowest accepted frequency in Hz
    pub min_frequency: f32,
    /// Highest accepted frequency in Hz
    pub max_frequency: f32,
    /// Largest accepted distance from the snapped note, in cents
    pub max_cent_error: f32,
}

impl Default for PitchOptions {
    fn default() -> Self {
        Self {
            min_frequency: 50.0,
            max_frequency: 5000.0,
            max_cent_error: 60.0,
        }
    }
}

/// A raw frequency snapped to its nearest equal-tempered note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEstimate {
    /// Note name with octave, e.g. "A4"
    pub note: String,
    /// Signed deviation from `snapped_frequency` (positive = sharp)
    pub cents: f32,
    /// Exact frequency of the snapped note
    pub snapped_frequency: f32,
}

impl NoteEstimate {
    /// Octave number parsed from the note name.
    pub fn octave(&self) -> Option<i32> {
        note_octave(&self.note)
    }
}

/// Converts a (possibly fractional) MIDI number to Hz.
pub fn midi_to_frequency(midi: f32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI as f32) / 12.0)
}

/// Converts a frequency to a real-valued MIDI number.
///
/// Returns NaN or -inf for `freq <= 0`; callers guard.
pub fn frequency_to_midi(freq: f32) -> f32 {
    A4_MIDI as f32 + 12.0 * (freq / A4_FREQUENCY).log2()
}

/// Formats a MIDI number as "Note+Octave", rounding to the nearest semitone.
pub fn midi_to_note_name(midi: f32) -> String {
    let midi = midi.round() as i32;
    let octave = midi.div_euclid(12) - 1;
    let class = midi.rem_euclid(12) as usize;
    format!("{}{}", NOTE_NAMES[class], octave)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Snaps `freq` to the nearest note.
///
/// Returns `None` when the frequency lies outside the configured range or
/// when it is further than `max_cent_error` from every note. That `None` is
/// the "unrecognized pitch" signal the sessions use to suppress flicker.
pub fn frequency_to_note(freq: f32, options: &PitchOptions) -> Option<NoteEstimate> {
    // Written negated so that NaN is rejected as well.
    if !(freq >= options.min_frequency && freq <= options.max_frequency) || freq <= 0.0 {
        return None;
    }

    let midi = frequency_to_midi(freq).round();
    let snapped_frequency = midi_to_frequency(midi);
    let cents = calculate_cents_deviation(freq, snapped_frequency);

    if !cents.is_finite() || cents.abs() > options.max_cent_error {
        return None;
    }

    Some(NoteEstimate {
        note: midi_to_note_name(midi),
        cents,
        snapped_frequency,
    })
}

/// Strips the octave digits from a note name: "C#4" -> "C#".
pub fn note_letter(note: &str) -> &str {
    note.trim_end_matches(|c: char| c.is_ascii_digit() || c == '-')
}

/// Octave digits of a note name: "C#4" -> 4.
pub fn note_octave(note: &str) -> Option<i32> {
    note[note_letter(note).len()..].parse().ok()
}

/// Pitch class 0-11 of a note name, with or without octave.
pub fn pitch_class(note: &str) -> Option<u8> {
    PITCH_CLASSES.get(note_letter(note)).copied()
}

/// Full MIDI number of a note name such as "A4" or "Eb3".
pub fn note_name_to_midi(note: &str) -> Option<i32> {
    let class = pitch_class(note)? as i32;
    let octave = note_octave(note)?;
    Some((octave + 1) * 12 + class)
}
