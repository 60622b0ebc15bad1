//! Pipeline configuration.
//!
//! All values are fixed when the [`Pipeline`](crate::pipeline::Pipeline) is constructed.
//! [`Config`] deserializes with `serde`, and missing fields take their default value:
//!
//! ```
//! use micro_tune::Config;
//!
//! let config: Config = serde_json::from_str(r#"{ "window_size": 2048, "hop_size": 512 }"#).unwrap();
//! assert_eq!(config.sample_rate, 44100.0);
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The smallest accepted window size.
pub const MIN_WINDOW_SIZE: usize = 64;

/// How the dominant peak of the harmonic product spectrum is located.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PeakStrategy {
    /// The largest product spectrum value above the minimum frequency.
    GlobalMaximum,
    /// A smoothed z-score detector. Bins deviating more than `threshold` standard
    /// deviations from the mean of the preceding `lag` filtered values are flagged,
    /// and flagged values enter the filter scaled by `influence`.
    ZScore {
        lag: usize,
        threshold: f32,
        influence: f32,
    },
}

impl Default for PeakStrategy {
    fn default() -> Self {
        PeakStrategy::ZScore {
            lag: 5,
            threshold: 3.5,
            influence: 0.5,
        }
    }
}

/// The angle the phase vocoder adds to its accumulated phasor each hop, for a shift of `s` bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseAdvance {
    /// `s * hop_size` radians.
    HopSamples,
    /// `2π * s * hop_size / window_size` radians, the phase a sinusoid
    /// shifted by `s` bins gains over one hop.
    BinFrequency,
}

impl Default for PhaseAdvance {
    fn default() -> Self {
        PhaseAdvance::HopSamples
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// The number of independently processed channels.
    pub channel_count: usize,
    /// The number of samples in each analyzed frame. Must be even.
    pub window_size: usize,
    /// The number of samples between analyzed frames. At most half the window,
    /// since Hann windows only sum to a constant from an overlap of 2 on.
    pub hop_size: usize,
    /// Capacity of each input and output ring buffer, in samples.
    pub ring_capacity: usize,
    /// Strides of the decimated spectrum copies that make up the harmonic product spectrum.
    pub decimation_factors: Vec<usize>,
    /// Estimates below this frequency are treated as unvoiced.
    pub min_frequency: f32,
    pub peak_strategy: PeakStrategy,
    /// Amplitudes more than this many dB below the frame maximum are raised
    /// to that level before forming the product spectrum. `None` disables the floor.
    pub spectral_floor_db: Option<f32>,
    pub phase_advance: PhaseAdvance,
    /// Extra output latency, in samples, granted to a worker running on its own thread.
    pub worker_margin: usize,
    /// The minimum number of samples between two accepted scale changes.
    pub scale_retrigger_interval: usize,
    /// The number of pending hops the worker queue can hold.
    pub queue_capacity: usize,
    /// Where spectrum dumps are written.
    pub dump_directory: PathBuf,
    /// Also write the decimated spectra to `hps.txt`.
    pub dump_intermediates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 44100.0,
            channel_count: 1,
            window_size: 4096,
            hop_size: 1024,
            ring_capacity: 16384,
            decimation_factors: vec![2, 3],
            min_frequency: 50.0,
            peak_strategy: PeakStrategy::default(),
            spectral_floor_db: Some(-60.0),
            phase_advance: PhaseAdvance::default(),
            worker_margin: 0,
            scale_retrigger_interval: 4410,
            queue_capacity: 4,
            dump_directory: PathBuf::from("."),
            dump_intermediates: false,
        }
    }
}

impl Config {
    /// The width of a spectrum bin in Hz.
    pub fn frequency_step(&self) -> f32 {
        self.sample_rate / self.window_size as f32
    }

    /// The number of samples between an input sample and the output sample it produces.
    pub fn latency(&self) -> usize {
        self.window_size + self.worker_margin
    }

    /// The number of product spectrum bins.
    pub fn product_spectrum_len(&self) -> usize {
        let stride: usize = self.decimation_factors.iter().product();
        if stride == 0 {
            return 0;
        }
        (self.window_size / 2) / stride
    }

    /// The ring capacity needed to hold a window, a hop and the worker margin.
    pub fn required_ring_capacity(&self) -> usize {
        self.window_size + self.hop_size + self.worker_margin
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.channel_count == 0 {
            return Err(ConfigError::Zero {
                name: "channel count",
            });
        }
        if self.hop_size == 0 {
            return Err(ConfigError::Zero { name: "hop size" });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero {
                name: "queue capacity",
            });
        }
        if self.window_size < MIN_WINDOW_SIZE || self.window_size % 2 != 0 {
            return Err(ConfigError::WindowTooSmall {
                window_size: self.window_size,
                minimum: MIN_WINDOW_SIZE,
            });
        }
        if self.hop_size > self.window_size {
            return Err(ConfigError::HopExceedsWindow {
                hop_size: self.hop_size,
                window_size: self.window_size,
            });
        }
        if self.hop_size > self.window_size / 2 {
            return Err(ConfigError::HopTooLarge {
                hop_size: self.hop_size,
                maximum: self.window_size / 2,
            });
        }
        if self.window_size % self.hop_size != 0 {
            return Err(ConfigError::HopDoesNotDivideWindow {
                hop_size: self.hop_size,
                window_size: self.window_size,
            });
        }
        if self.ring_capacity < self.required_ring_capacity() {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.ring_capacity,
                required: self.required_ring_capacity(),
            });
        }
        if self.decimation_factors.is_empty() {
            return Err(ConfigError::InvalidDecimationFactors("at least one factor is needed"));
        }
        if self.decimation_factors.iter().any(|factor| *factor < 2) {
            return Err(ConfigError::InvalidDecimationFactors("factors must be at least 2"));
        }
        let nyquist = 0.5 * self.sample_rate;
        if !(self.min_frequency.is_finite() && self.min_frequency > 0.0 && self.min_frequency < nyquist) {
            return Err(ConfigError::InvalidMinFrequency {
                frequency: self.min_frequency,
                nyquist,
            });
        }
        let first_bin = (self.min_frequency / self.frequency_step()).ceil() as usize;
        if first_bin + 1 >= self.product_spectrum_len() {
            return Err(ConfigError::InvalidDecimationFactors(
                "the product spectrum does not reach above the minimum frequency",
            ));
        }
        if let Some(db) = self.spectral_floor_db {
            if !(db.is_finite() && db < 0.0) {
                return Err(ConfigError::InvalidSpectralFloor(db));
            }
        }
        if let PeakStrategy::ZScore {
            lag,
            threshold,
            influence,
        } = self.peak_strategy
        {
            if lag == 0 {
                return Err(ConfigError::InvalidPeakParameter {
                    name: "lag",
                    reason: "must be greater than 0",
                });
            }
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(ConfigError::InvalidPeakParameter {
                    name: "threshold",
                    reason: "must be positive and finite",
                });
            }
            if !(0.0..=1.0).contains(&influence) {
                return Err(ConfigError::InvalidPeakParameter {
                    name: "influence",
                    reason: "must be between 0 and 1",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, PeakStrategy, PhaseAdvance};
    use crate::error::ConfigError;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.latency(), 4096);
        assert_eq!(config.product_spectrum_len(), 341);
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        let config = Config {
            hop_size: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero { name: "hop size" }));

        let config = Config {
            channel_count: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero { .. })));

        let config = Config {
            window_size: 1024,
            hop_size: 2048,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::HopExceedsWindow { .. })));

        let config = Config {
            window_size: 1024,
            hop_size: 1024,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::HopTooLarge {
                hop_size: 1024,
                maximum: 512
            })
        );

        let config = Config {
            window_size: 1024,
            hop_size: 512,
            ring_capacity: 2048,
            ..Config::default()
        };
        assert_eq!(config.validate(), Ok(()));

        let config = Config {
            window_size: 1024,
            hop_size: 300,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HopDoesNotDivideWindow { .. })
        ));

        let config = Config {
            window_size: 1023,
            hop_size: 1023,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::WindowTooSmall { .. })));

        let config = Config {
            ring_capacity: 4096,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::CapacityTooSmall {
                capacity: 4096,
                required: 4096 + 1024
            })
        );

        let config = Config {
            worker_margin: 12000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::CapacityTooSmall { .. })));
    }

    #[test]
    fn test_rejects_invalid_rates() {
        for rate in [0.0, -44100.0, f32::NAN, f32::INFINITY].iter() {
            let config = Config {
                sample_rate: *rate,
                ..Config::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidSampleRate(_))));
        }
        for frequency in [0.0, 30000.0, f32::NAN].iter() {
            let config = Config {
                min_frequency: *frequency,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidMinFrequency { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_invalid_peak_parameters() {
        let invalid = [
            PeakStrategy::ZScore {
                lag: 0,
                threshold: 3.5,
                influence: 0.5,
            },
            PeakStrategy::ZScore {
                lag: 5,
                threshold: -1.0,
                influence: 0.5,
            },
            PeakStrategy::ZScore {
                lag: 5,
                threshold: 3.5,
                influence: 1.5,
            },
        ];
        for strategy in invalid.iter() {
            let config = Config {
                peak_strategy: *strategy,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidPeakParameter { .. })
            ));
        }
        let config = Config {
            peak_strategy: PeakStrategy::GlobalMaximum,
            ..Config::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_invalid_spectrum_settings() {
        let config = Config {
            spectral_floor_db: Some(6.0),
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidSpectralFloor(6.0)));

        let config = Config {
            decimation_factors: vec![],
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecimationFactors(_))
        ));

        let config = Config {
            decimation_factors: vec![1, 2],
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecimationFactors(_))
        ));

        // Five product bins of 1500 Hz each.
        let config = Config {
            window_size: 64,
            hop_size: 16,
            min_frequency: 40000.0,
            sample_rate: 96000.0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecimationFactors(_))
        ));
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "sample_rate": 48000.0,
            "channel_count": 2,
            "window_size": 2048,
            "hop_size": 256,
            "peak_strategy": { "kind": "global_maximum" },
            "spectral_floor_db": null
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.channel_count, 2);
        assert_eq!(config.peak_strategy, PeakStrategy::GlobalMaximum);
        assert_eq!(config.spectral_floor_db, None);
        assert_eq!(config.phase_advance, PhaseAdvance::HopSamples);
        assert_eq!(config.ring_capacity, Config::default().ring_capacity);
        assert_eq!(config.validate(), Ok(()));

        let json = r#"{
            "peak_strategy": { "kind": "z_score", "lag": 8, "threshold": 4.0, "influence": 0.2 },
            "phase_advance": "bin_frequency"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.phase_advance, PhaseAdvance::BinFrequency);
        assert_eq!(
            config.peak_strategy,
            PeakStrategy::ZScore {
                lag: 8,
                threshold: 4.0,
                influence: 0.2
            }
        );
    }
}
