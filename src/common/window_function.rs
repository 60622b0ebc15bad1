//! [Window functions](https://en.wikipedia.org/wiki/Window_function).

use std::f64::consts::PI;

use crate::error::{try_alloc, Error};

/// A precomputed analysis window.
///
/// The table holds the periodic form of the
/// [Hann window](https://en.wikipedia.org/wiki/Window_function#Hann_and_Hamming_windows),
/// `0.5 - 0.5 cos(2 pi n / N)`, which sums to a constant when shifted by any hop size
/// that evenly divides half the window size. This is what makes windowed
/// overlap-add resynthesis exact.
pub struct Windower {
    table: Box<[f32]>,
}

impl Windower {
    pub fn hann(size: usize) -> Result<Self, Error> {
        let mut table = try_alloc("analysis window", size, 0.0_f32)?;
        let scale = 2.0 * PI / (size as f64);
        for (n, value) in table.iter_mut().enumerate() {
            *value = (0.5 - 0.5 * (scale * n as f64).cos()) as f32;
        }
        Ok(Windower { table })
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.table
    }

    /// Performs point-wise multiplication of a buffer and the window.
    pub fn apply(&self, buffer: &mut [f32]) {
        assert_eq!(buffer.len(), self.table.len());
        for (value, w) in buffer.iter_mut().zip(self.table.iter()) {
            *value *= w;
        }
    }

    /// The factor that makes overlap-added windowed frames, spaced
    /// `hop_size` samples apart, sum back to the original signal.
    pub fn overlap_add_gain(&self, hop_size: usize) -> f32 {
        let sum: f64 = self.table.iter().map(|w| *w as f64).sum();
        if sum <= 0.0 {
            return 0.0;
        }
        (hop_size as f64 / sum) as f32
    }
}
