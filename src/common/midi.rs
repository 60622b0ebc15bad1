use micromath::F32Ext;

/// Converts a frequency in Hz to a [MIDI](https://en.wikipedia.org/wiki/MIDI) note number (with a fractional part).
pub fn freq_to_midi_note(freq: f32) -> f32 {
    12.0 * F32Ext::log2(freq) - 36.376316562295926
}

/// Converts a [MIDI](https://en.wikipedia.org/wiki/MIDI) note number to a frequency in Hz,
/// using A4 = 440 Hz equal temperament.
pub fn midi_note_to_freq(note: u8) -> f32 {
    (440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)) as f32
}
