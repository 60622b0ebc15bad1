use std::f64::consts::PI;

use rustfft::num_complex::Complex32;

use crate::config::{Config, PhaseAdvance};

/// Bins on each side of the peak that are moved along with it.
const NEIGHBOURHOOD_RADIUS: usize = 2;
const NEIGHBOURHOOD_LEN: usize = 2 * NEIGHBOURHOOD_RADIUS + 1;

/// Shifts the spectral peak of a frame to a target frequency.
///
/// The bins around the peak are moved by a fractional number of bins using
/// linear interpolation and rotated by an accumulated phasor, so that a
/// constant shift keeps advancing the phase hop after hop instead of
/// restarting it in every frame. The upper half of the spectrum is then
/// rebuilt from the lower half, which keeps the inverse transform real.
pub struct PitchCorrector {
    window_size: usize,
    hop_size: usize,
    frequency_step: f32,
    phase_advance: PhaseAdvance,
    phase: Option<Complex32>,
    neighbourhood: [Complex32; NEIGHBOURHOOD_LEN],
}

impl PitchCorrector {
    pub fn new(config: &Config) -> Self {
        PitchCorrector {
            window_size: config.window_size,
            hop_size: config.hop_size,
            frequency_step: config.frequency_step(),
            phase_advance: config.phase_advance,
            phase: None,
            neighbourhood: [Complex32::new(0.0, 0.0); NEIGHBOURHOOD_LEN],
        }
    }

    /// The accumulated unit phasor, or `None` before the first correction.
    pub fn phase(&self) -> Option<Complex32> {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = None;
    }

    /// The angle, in radians, added to the accumulated phasor for a shift of `shift` bins.
    pub fn phase_advance(&self, shift: f32) -> f64 {
        let advance = shift as f64 * self.hop_size as f64;
        match self.phase_advance {
            PhaseAdvance::HopSamples => advance,
            PhaseAdvance::BinFrequency => 2.0 * PI * advance / self.window_size as f64,
        }
    }

    /// Moves the peak at `peak_bin` from `current` to `target` Hz. Returns false,
    /// leaving the frame untouched, if the peak can not be shifted.
    pub fn correct(&mut self, spectrum: &mut [Complex32], peak_bin: usize, current: f32, target: f32) -> bool {
        assert_eq!(spectrum.len(), self.window_size);
        let half = self.window_size / 2;
        if peak_bin == 0 || peak_bin + 1 >= half || !(current > 0.0) {
            return false;
        }

        let shift = (target - current) / self.frequency_step;
        let step = Complex32::from_polar(1.0, self.phase_advance(shift) as f32);
        let phase = match self.phase {
            None => step,
            Some(phase) => {
                let next = phase * step;
                next / next.norm()
            }
        };
        self.phase = Some(phase);

        let first = peak_bin.saturating_sub(NEIGHBOURHOOD_RADIUS).max(1);
        let last = (peak_bin + NEIGHBOURHOOD_RADIUS).min(half - 1);
        let source = &mut self.neighbourhood[..last - first + 1];
        source.copy_from_slice(&spectrum[first..=last]);
        for bin in spectrum[first..=last].iter_mut() {
            *bin = Complex32::new(0.0, 0.0);
        }

        let lowest = (first as f32 + shift).floor().max(1.0) as usize;
        let highest = ((last as f32 + shift).ceil() as isize).min(half as isize - 1);
        let mut destination = lowest as isize;
        while destination <= highest {
            // Position of the destination bin in the unshifted neighbourhood.
            let position = destination as f32 - shift - first as f32;
            let index = position.floor();
            let fraction = position - index;
            let index = index as isize;
            let mut value = Complex32::new(0.0, 0.0);
            if index >= 0 && (index as usize) < source.len() {
                value += source[index as usize] * (1.0 - fraction);
            }
            if index + 1 >= 0 && ((index + 1) as usize) < source.len() {
                value += source[(index + 1) as usize] * fraction;
            }
            spectrum[destination as usize] += value * phase;
            destination += 1;
        }

        for bin in 1..half {
            spectrum[self.window_size - bin] = spectrum[bin].conj();
        }
        spectrum[half].im = 0.0;
        true
    }
}
