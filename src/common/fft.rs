use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::{try_alloc, Error};

/// Forward and inverse complex FFT of a fixed size, with its own frame and scratch workspace.
///
/// A frame is loaded from real samples, transformed in place and read back
/// as complex bins or, after the inverse transform, as real samples. Nothing
/// is allocated after construction.
pub struct SpectralEngine {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    frame: Box<[Complex32]>,
    scratch: Box<[Complex32]>,
}

impl SpectralEngine {
    pub fn new(size: usize) -> Result<Self, Error> {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Ok(SpectralEngine {
            forward,
            inverse,
            frame: try_alloc("transform frame", size, Complex32::new(0.0, 0.0))?,
            scratch: try_alloc("transform scratch", scratch_len, Complex32::new(0.0, 0.0))?,
        })
    }

    pub fn size(&self) -> usize {
        self.frame.len()
    }

    /// Copies real samples into the frame, zeroing the imaginary parts.
    pub fn load_real(&mut self, samples: &[f32]) {
        assert_eq!(samples.len(), self.frame.len());
        for (bin, sample) in self.frame.iter_mut().zip(samples.iter()) {
            *bin = Complex32::new(*sample, 0.0);
        }
    }

    /// Transforms the frame to the frequency domain.
    pub fn forward(&mut self) {
        self.forward
            .process_with_scratch(&mut self.frame, &mut self.scratch);
    }

    /// Transforms the frame back to the time domain, including the `1 / N` normalization.
    pub fn inverse(&mut self) {
        self.inverse
            .process_with_scratch(&mut self.frame, &mut self.scratch);
        let scale = 1.0 / self.frame.len() as f32;
        for value in self.frame.iter_mut() {
            *value *= scale;
        }
    }

    pub fn frame(&self) -> &[Complex32] {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut [Complex32] {
        &mut self.frame
    }
}
