//! [Harmonic product spectrum](https://www.chciken.com/digital/signal/processing/2020/05/13/guitar-tuner.html#dft)
//! (HPS) pitch estimation.
//!
//! The amplitude spectrum of a windowed frame is multiplied by copies of itself
//! decimated by 2 and 3. Harmonics of the fundamental line up with the
//! fundamental in the decimated copies, so the product has its strongest peak at
//! the fundamental even when an overtone is louder. The peak is located by a
//! [`PeakPicker`], either a plain global maximum or a smoothed z-score detector,
//! and then refined to sub-bin accuracy by fitting a parabola through the peak
//! bin and its neighbours.
//!
//! Peaks below the minimum frequency (50 Hz by default) are noise dominated and
//! reported as [`PitchEstimate::Unvoiced`].
//!
//! # Example
//! ```
//! use micro_tune::common::{SpectralEngine, Windower};
//! use micro_tune::hps::PitchEstimator;
//! use micro_tune::Config;
//!
//! let config = Config::default();
//! let mut estimator = PitchEstimator::new(&config).unwrap();
//! let window = Windower::hann(config.window_size).unwrap();
//! let mut engine = SpectralEngine::new(config.window_size).unwrap();
//!
//! // A tone at 440 Hz.
//! let mut frame: Vec<f32> = (0..config.window_size)
//!     .map(|n| (2.0 * std::f32::consts::PI * 440.0 * n as f32 / config.sample_rate).sin())
//!     .collect();
//! window.apply(&mut frame);
//! engine.load_real(&frame);
//! engine.forward();
//!
//! let estimate = estimator.process(engine.frame());
//! assert!((estimate.frequency() - 440.0).abs() < config.frequency_step());
//! ```

mod estimator;
mod peak_picker;

pub use estimator::{quadratic_peak_offset, PitchEstimate, PitchEstimator};
pub use peak_picker::{GlobalMaximum, PeakDetector, PeakPicker, ZScoreDetector};
