//! Common algorithms and utilities.

mod fft;
mod midi;
mod ring_buffer;
mod window_function;

pub use fft::SpectralEngine;
pub use midi::{freq_to_midi_note, midi_note_to_freq};
pub use ring_buffer::RingBuffer;
pub use window_function::Windower;
