use rustfft::num_complex::Complex32;

use crate::config::Config;
use crate::error::{try_alloc, Error};
use crate::hps::peak_picker::{PeakDetector, PeakPicker};

/// The outcome of analyzing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchEstimate {
    /// A fundamental was found. `bin` is the product spectrum peak the
    /// refined `frequency` was interpolated around.
    Voiced { frequency: f32, bin: usize },
    /// No reliable peak above the minimum frequency.
    Unvoiced,
}

impl PitchEstimate {
    pub fn is_voiced(&self) -> bool {
        matches!(self, PitchEstimate::Voiced { .. })
    }

    /// The estimated frequency in Hz, or 0 if unvoiced.
    pub fn frequency(&self) -> f32 {
        match self {
            PitchEstimate::Voiced { frequency, .. } => *frequency,
            PitchEstimate::Unvoiced => 0.0,
        }
    }

    pub fn bin(&self) -> Option<usize> {
        match self {
            PitchEstimate::Voiced { bin, .. } => Some(*bin),
            PitchEstimate::Unvoiced => None,
        }
    }
}

/// Returns the offset, in bins, of the vertex of the parabola through three
/// equally spaced points, relative to the middle one.
///
/// A flat or nearly flat triple has no well defined vertex and gives 0.
pub fn quadratic_peak_offset(alpha: f32, beta: f32, gamma: f32) -> f32 {
    let denominator = alpha - 2.0 * beta + gamma;
    let scale = alpha.abs() + beta.abs() + gamma.abs();
    if !(denominator.abs() > f32::EPSILON * scale) {
        return 0.0;
    }
    0.5 * (alpha - gamma) / denominator
}

/// Estimates the fundamental frequency of a frame using the
/// [harmonic product spectrum](https://www.chciken.com/digital/signal/processing/2020/05/13/guitar-tuner.html#dft).
///
/// The amplitude spectrum is multiplied by copies of itself decimated by each
/// factor, which reinforces the fundamental at the expense of its harmonics.
/// The peak of the product is then refined to sub-bin accuracy by quadratic
/// interpolation of the amplitude spectrum.
pub struct PitchEstimator {
    frequency_step: f32,
    min_frequency: f32,
    first_bin: usize,
    factors: Box<[usize]>,
    floor_gain: Option<f32>,
    amplitudes: Box<[f32]>,
    decimated: Box<[f32]>,
    product: Box<[f32]>,
    picker: PeakDetector,
}

impl PitchEstimator {
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        let product_len = config.product_spectrum_len();
        let frequency_step = config.frequency_step();
        let first_bin = ((config.min_frequency / frequency_step).ceil() as usize).max(1);
        Ok(PitchEstimator {
            frequency_step,
            min_frequency: config.min_frequency,
            first_bin,
            factors: config.decimation_factors.clone().into_boxed_slice(),
            floor_gain: config
                .spectral_floor_db
                .map(|db| 10.0_f32.powf(db / 20.0)),
            amplitudes: try_alloc("amplitude spectrum", config.window_size / 2, 0.0)?,
            decimated: try_alloc(
                "decimated spectra",
                config.decimation_factors.len() * product_len,
                0.0,
            )?,
            product: try_alloc("product spectrum", product_len, 0.0)?,
            picker: PeakDetector::from_strategy(config.peak_strategy, product_len)?,
        })
    }

    pub fn frequency_step(&self) -> f32 {
        self.frequency_step
    }

    /// The lowest bin considered in the peak search.
    pub fn first_bin(&self) -> usize {
        self.first_bin
    }

    pub fn decimation_factors(&self) -> &[usize] {
        &self.factors
    }

    /// The amplitude spectrum of the last analyzed frame, covering bins below the Nyquist frequency.
    pub fn amplitude_spectrum(&self) -> &[f32] {
        &self.amplitudes
    }

    /// The harmonic product spectrum of the last analyzed frame.
    pub fn product_spectrum(&self) -> &[f32] {
        &self.product
    }

    /// The floored amplitude spectrum of the last frame, decimated by the factor at `index`.
    pub fn decimated_spectrum(&self, index: usize) -> &[f32] {
        let len = self.product.len();
        &self.decimated[index * len..(index + 1) * len]
    }

    /// Analyzes a full frame of complex bins, as produced by a forward transform
    /// of windowed real samples.
    pub fn process(&mut self, spectrum: &[Complex32]) -> PitchEstimate {
        let half = self.amplitudes.len();
        assert!(spectrum.len() >= half);
        let mut max_amplitude = 0.0_f32;
        for (amplitude, bin) in self.amplitudes.iter_mut().zip(spectrum.iter()) {
            *amplitude = bin.norm();
            max_amplitude = max_amplitude.max(*amplitude);
        }
        let floor = match self.floor_gain {
            Some(gain) => max_amplitude * gain,
            None => 0.0,
        };

        let len = self.product.len();
        for (i, product) in self.product.iter_mut().enumerate() {
            *product = self.amplitudes[i].max(floor);
        }
        for (index, factor) in self.factors.iter().enumerate() {
            let decimated = &mut self.decimated[index * len..(index + 1) * len];
            for (i, value) in decimated.iter_mut().enumerate() {
                *value = self.amplitudes[i * factor].max(floor);
                self.product[i] *= *value;
            }
        }

        let bin = match self
            .picker
            .pick(&self.product, &self.amplitudes, self.first_bin)
        {
            Some(bin) => bin,
            None => return PitchEstimate::Unvoiced,
        };
        if bin == 0 || bin + 1 >= half {
            return PitchEstimate::Unvoiced;
        }
        let offset = quadratic_peak_offset(
            self.amplitudes[bin - 1],
            self.amplitudes[bin],
            self.amplitudes[bin + 1],
        );
        let frequency = (bin as f32 + offset) * self.frequency_step;
        if !(frequency >= self.min_frequency) {
            return PitchEstimate::Unvoiced;
        }
        PitchEstimate::Voiced { frequency, bin }
    }
}
