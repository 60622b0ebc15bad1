//! Frequency domain pitch correction with a
//! [phase vocoder](https://en.wikipedia.org/wiki/Phase_vocoder).
//!
//! Each analyzed frame has its spectral peak moved by the fractional number of
//! bins separating the estimated pitch from the target note. Moving bins
//! changes how fast their phase should advance from one hop to the next, so
//! the moved bins are rotated by a phasor that accumulates the extra advance
//! over all corrections made so far. The phasor is kept at unit magnitude and
//! starts over only when the corrector is reset.

mod pitch_corrector;

pub use pitch_corrector::PitchCorrector;
