//! # Chord Inference Module
//!
//! Names a chord from a set of concurrently sounding notes by matching the
//! interval vector above the lowest pitch class against a fixed shape table.

use crate::tuning::{pitch_class, NOTE_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Chord qualities in table (tie-break) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Major7,
    Minor7,
    Dominant7,
}

/// Ascending interval sets from the root. The first exact match wins.
const CHORD_SHAPES: [(ChordQuality, &[u8]); 9] = [
    (ChordQuality::Major, &[0, 4, 7]),
    (ChordQuality::Minor, &[0, 3, 7]),
    (ChordQuality::Diminished, &[0, 3, 6]),
    (ChordQuality::Augmented, &[0, 4, 8]),
    (ChordQuality::Sus2, &[0, 2, 7]),
    (ChordQuality::Sus4, &[0, 5, 7]),
    (ChordQuality::Major7, &[0, 4, 7, 11]),
    (ChordQuality::Minor7, &[0, 3, 7, 10]),
    (ChordQuality::Dominant7, &[0, 4, 7, 10]),
];

impl ChordQuality {
    pub fn label(&self) -> &'static str {
        match self {
            ChordQuality::Major => "Major",
            ChordQuality::Minor => "Minor",
            ChordQuality::Diminished => "Diminished",
            ChordQuality::Augmented => "Augmented",
            ChordQuality::Sus2 => "Sus2",
            ChordQuality::Sus4 => "Sus4",
            ChordQuality::Major7 => "Major7",
            ChordQuality::Minor7 => "Minor7",
            ChordQuality::Dominant7 => "Dominant7",
        }
    }

    pub fn intervals(&self) -> &'static [u8] {
        CHORD_SHAPES
            .iter()
            .find(|(quality, _)| quality == self)
            .map(|(_, intervals)| *intervals)
            .unwrap_or(&[])
    }
}

/// A matched chord shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordMatch {
    /// Root pitch class name, e.g. "C#"
    pub root: String,
    pub quality: ChordQuality,
}

/// Outcome of chord inference on three or more pitch classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordLabel {
    /// The interval vector matched a known shape
    Named(ChordMatch),
    /// No shape matched; reported non-committally
    Unnamed { note_count: usize },
}

impl ChordLabel {
    pub fn chord(&self) -> Option<&ChordMatch> {
        match self {
            ChordLabel::Named(chord) => Some(chord),
            ChordLabel::Unnamed { .. } => None,
        }
    }

    /// Scale family shown next to the chord: "Major", "Minor", the quality
    /// name for other shapes, or "-" when nothing matched.
    pub fn scale_label(&self) -> &'static str {
        match self {
            ChordLabel::Named(chord) => match chord.quality {
                ChordQuality::Major | ChordQuality::Major7 => "Major",
                ChordQuality::Minor | ChordQuality::Minor7 => "Minor",
                other => other.label(),
            },
            ChordLabel::Unnamed { .. } => "-",
        }
    }
}

impl fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordLabel::Named(chord) => write!(f, "{} {}", chord.root, chord.quality.label()),
            ChordLabel::Unnamed { note_count } => write!(f, "{}-note chord", note_count),
        }
    }
}

/// Infers a chord from note names (octaves are ignored).
///
/// Fewer than three distinct pitch classes is the normal "no chord" state
/// and yields `None`. Unparseable names are skipped.
pub fn infer_chord<S: AsRef<str>>(notes: &[S]) -> Option<ChordLabel> {
    let classes: BTreeSet<u8> = notes
        .iter()
        .filter_map(|note| pitch_class(note.as_ref()))
        .collect();
    if classes.len() < 3 {
        return None;
    }

    // BTreeSet iterates in ascending order; the lowest class is the root.
    let root = *classes.iter().next()?;
    let intervals: Vec<u8> = classes.iter().map(|&c| c - root).collect();

    let matched = CHORD_SHAPES
        .iter()
        .find(|(_, shape)| shape.len() == intervals.len() && *shape == intervals.as_slice());

    Some(match matched {
        Some((quality, _)) => ChordLabel::Named(ChordMatch {
            root: NOTE_NAMES[root as usize].to_string(),
            quality: *quality,
        }),
        None => ChordLabel::Unnamed {
            note_count: classes.len(),
        },
    })
}
