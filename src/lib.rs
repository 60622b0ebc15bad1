//! Real time [pitch](https://en.wikipedia.org/wiki/Pitch_%28music%29) detection and pitch correction.
//!
//! The fundamental frequency of a monophonic voice or instrument is estimated
//! using the [harmonic product spectrum](hps), snapped to the nearest note of a
//! [musical scale](scale) and corrected with a [phase vocoder](vocoder). The
//! [`Pipeline`] ties these together into a short time Fourier transform,
//! splitting the work between a real time context that only moves samples
//! and a worker that does the spectral processing.
//!
//! Features
//! * No allocations after construction, neither in the real time context nor in the worker.
//! * The real time context never blocks. It hands hops to the worker over a lock free queue.
//! * Any number of channels, each corrected independently.
//!
//! # Example
//! ```
//! use micro_tune::{Config, Pipeline, ScaleKind};
//!
//! let config = Config {
//!     scale_retrigger_interval: 0,
//!     ..Config::default()
//! };
//! let sample_rate = config.sample_rate;
//! let mut pipeline = Pipeline::new(config).unwrap();
//!
//! // Correct towards the major scale.
//! pipeline.controls_mut().select_next_scale();
//! assert_eq!(pipeline.controls().scale(), ScaleKind::Major);
//!
//! // A slightly sharp A4.
//! let mut output = [0.0];
//! for n in 0..16384 {
//!     let input = [0.5 * (2.0 * std::f32::consts::PI * 450.0 * n as f32 / sample_rate).sin()];
//!     pipeline.process_frame(&input, &mut output);
//! }
//!
//! let report = pipeline.worker().report(0);
//! assert!(report.corrected);
//! assert_eq!(report.target_frequency, Some(440.0));
//! ```

pub mod common;
mod config;
pub mod dump;
mod error;
pub mod hps;
pub mod pipeline;
pub mod scale;
pub mod vocoder;

pub use config::{Config, PeakStrategy, PhaseAdvance, MIN_WINDOW_SIZE};
pub use error::{ConfigError, Error};
pub use pipeline::Pipeline;
pub use scale::ScaleKind;
