//! Musical scales and note quantization.
//!
//! The built in scales are equal tempered (A4 = 440 Hz), rooted on C and span
//! MIDI notes 33 (A1, 55 Hz) to 119 (B8, about 7902 Hz).

use serde::{Deserialize, Serialize};

use crate::common::midi_note_to_freq;
use crate::error::ConfigError;

const LOWEST_NOTE: u8 = 33;
const HIGHEST_NOTE: u8 = 119;

/// The built in scales, in the order they are cycled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleKind {
    MajorPentatonic,
    Major,
    NaturalMinor,
}

impl Default for ScaleKind {
    fn default() -> Self {
        ScaleKind::MajorPentatonic
    }
}

impl ScaleKind {
    pub const ALL: [ScaleKind; 3] = [
        ScaleKind::MajorPentatonic,
        ScaleKind::Major,
        ScaleKind::NaturalMinor,
    ];

    /// The scale after this one in the rotation, wrapping around to the first.
    pub fn next(self) -> ScaleKind {
        match self {
            ScaleKind::MajorPentatonic => ScaleKind::Major,
            ScaleKind::Major => ScaleKind::NaturalMinor,
            ScaleKind::NaturalMinor => ScaleKind::MajorPentatonic,
        }
    }

    /// Semitones above C of the notes in the scale.
    pub fn pitch_classes(self) -> &'static [u8] {
        match self {
            ScaleKind::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleKind::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
        }
    }

    fn index(self) -> usize {
        match self {
            ScaleKind::MajorPentatonic => 0,
            ScaleKind::Major => 1,
            ScaleKind::NaturalMinor => 2,
        }
    }
}

/// An ascending table of note frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    frequencies: Box<[f32]>,
}

impl Scale {
    /// Creates a scale from a table of frequencies in Hz, which must be
    /// non-empty, positive, finite and strictly ascending.
    pub fn from_frequencies(frequencies: Vec<f32>) -> Result<Self, ConfigError> {
        if frequencies.is_empty() {
            return Err(ConfigError::InvalidScale("a scale needs at least one note"));
        }
        if frequencies.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(ConfigError::InvalidScale("frequencies must be positive and finite"));
        }
        if frequencies.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::InvalidScale("frequencies must be strictly ascending"));
        }
        Ok(Scale {
            frequencies: frequencies.into_boxed_slice(),
        })
    }

    pub fn equal_tempered(kind: ScaleKind) -> Self {
        let classes = kind.pitch_classes();
        let frequencies = (LOWEST_NOTE..=HIGHEST_NOTE)
            .filter(|note| classes.contains(&(note % 12)))
            .map(midi_note_to_freq)
            .collect::<Vec<f32>>();
        Scale {
            frequencies: frequencies.into_boxed_slice(),
        }
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    /// Returns the scale frequency closest to `frequency`. An exact midpoint
    /// between two notes resolves to the lower one, and frequencies outside
    /// the table clamp to its first or last entry.
    pub fn nearest(&self, frequency: f32) -> f32 {
        let table = &self.frequencies;
        let upper = table.partition_point(|f| *f < frequency);
        if upper == 0 {
            return table[0];
        }
        if upper == table.len() {
            return table[table.len() - 1];
        }
        let below = table[upper - 1];
        let above = table[upper];
        if frequency - below <= above - frequency {
            below
        } else {
            above
        }
    }
}

/// Snaps frequencies to the nearest note of one of the built in scales.
pub struct NoteQuantizer {
    scales: [Scale; 3],
}

impl Default for NoteQuantizer {
    fn default() -> Self {
        NoteQuantizer::new()
    }
}

impl NoteQuantizer {
    pub fn new() -> Self {
        NoteQuantizer {
            scales: [
                Scale::equal_tempered(ScaleKind::MajorPentatonic),
                Scale::equal_tempered(ScaleKind::Major),
                Scale::equal_tempered(ScaleKind::NaturalMinor),
            ],
        }
    }

    pub fn scale(&self, kind: ScaleKind) -> &Scale {
        &self.scales[kind.index()]
    }

    pub fn quantize(&self, frequency: f32, kind: ScaleKind) -> f32 {
        self.scale(kind).nearest(frequency)
    }
}
