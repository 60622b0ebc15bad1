use crate::config::PeakStrategy;
use crate::error::{try_alloc, Error};

/// Locates the dominant peak of a product spectrum.
pub trait PeakPicker {
    /// Returns the index of the chosen peak among `product[first_bin..]`,
    /// or `None` if there is no usable peak. `amplitudes` is the
    /// unfloored amplitude spectrum the product was formed from.
    fn pick(&mut self, product: &[f32], amplitudes: &[f32], first_bin: usize) -> Option<usize>;
}

/// Picks the largest product spectrum value.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalMaximum;

impl PeakPicker for GlobalMaximum {
    fn pick(&mut self, product: &[f32], _amplitudes: &[f32], first_bin: usize) -> Option<usize> {
        let mut peak: Option<usize> = None;
        let mut peak_value = 0.0;
        for (bin, value) in product.iter().enumerate().skip(first_bin) {
            if *value > peak_value {
                peak = Some(bin);
                peak_value = *value;
            }
        }
        peak
    }
}

/// A smoothed z-score peak detector.
///
/// Each value is compared to the mean and standard deviation of the `lag`
/// preceding filtered values. Values more than `threshold` deviations away
/// are flagged, and enter the filtered series as
/// `influence * value + (1 - influence) * previous`, so that a peak does not
/// drag the statistics of its neighbours along with it. Among the positively
/// flagged bins, the one with the largest amplitude wins.
///
/// See <https://stackoverflow.com/questions/22583391/peak-signal-detection-in-realtime-timeseries-data>.
pub struct ZScoreDetector {
    lag: usize,
    threshold: f32,
    influence: f32,
    filtered: Box<[f32]>,
    signals: Box<[i8]>,
}

impl ZScoreDetector {
    /// Creates a detector for series of at most `len` values.
    pub fn new(lag: usize, threshold: f32, influence: f32, len: usize) -> Result<Self, Error> {
        Ok(ZScoreDetector {
            lag,
            threshold,
            influence,
            filtered: try_alloc("z-score filter", len, 0.0)?,
            signals: try_alloc("z-score signals", len, 0)?,
        })
    }

    /// The signal of each value from the last call to [`detect`](Self::detect):
    /// 1 for a positive peak, -1 for a negative one and 0 otherwise.
    pub fn signals(&self) -> &[i8] {
        &self.signals
    }

    pub fn detect(&mut self, values: &[f32]) -> &[i8] {
        let len = values.len();
        assert!(len <= self.filtered.len());
        let lag = self.lag;
        let signals = &mut self.signals[..len];
        for signal in signals.iter_mut() {
            *signal = 0;
        }
        if len <= lag {
            return signals;
        }
        let filtered = &mut self.filtered[..len];
        filtered[..lag].copy_from_slice(&values[..lag]);
        for i in lag..len {
            let (mean, std_dev) = mean_and_std_dev(&filtered[i - lag..i]);
            let value = values[i];
            if (value as f64 - mean).abs() > self.threshold as f64 * std_dev {
                signals[i] = if value as f64 > mean { 1 } else { -1 };
                filtered[i] = self.influence * value + (1.0 - self.influence) * filtered[i - 1];
            } else {
                filtered[i] = value;
            }
        }
        signals
    }
}

fn mean_and_std_dev(values: &[f32]) -> (f64, f64) {
    let count = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|v| {
            let delta = *v as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / count;
    (mean, variance.sqrt())
}

impl PeakPicker for ZScoreDetector {
    fn pick(&mut self, product: &[f32], amplitudes: &[f32], first_bin: usize) -> Option<usize> {
        let signals = self.detect(product);
        let mut peak: Option<usize> = None;
        let mut peak_amplitude = 0.0;
        for (bin, signal) in signals.iter().enumerate().skip(first_bin) {
            if *signal == 1 && amplitudes[bin] > peak_amplitude {
                peak = Some(bin);
                peak_amplitude = amplitudes[bin];
            }
        }
        peak
    }
}

/// The peak picker selected by a [`PeakStrategy`].
pub enum PeakDetector {
    GlobalMaximum(GlobalMaximum),
    ZScore(ZScoreDetector),
}

impl PeakDetector {
    pub fn from_strategy(strategy: PeakStrategy, len: usize) -> Result<Self, Error> {
        Ok(match strategy {
            PeakStrategy::GlobalMaximum => PeakDetector::GlobalMaximum(GlobalMaximum),
            PeakStrategy::ZScore {
                lag,
                threshold,
                influence,
            } => PeakDetector::ZScore(ZScoreDetector::new(lag, threshold, influence, len)?),
        })
    }
}

impl PeakPicker for PeakDetector {
    fn pick(&mut self, product: &[f32], amplitudes: &[f32], first_bin: usize) -> Option<usize> {
        match self {
            PeakDetector::GlobalMaximum(picker) => picker.pick(product, amplitudes, first_bin),
            PeakDetector::ZScore(picker) => picker.pick(product, amplitudes, first_bin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GlobalMaximum, PeakDetector, PeakPicker, ZScoreDetector};
    use crate::config::PeakStrategy;

    #[test]
    fn test_global_maximum() {
        let product = [9.0, 1.0, 2.0, 7.0, 3.0, 7.0];
        let mut picker = GlobalMaximum;
        assert_eq!(picker.pick(&product, &product, 0), Some(0));
        // Ties keep the lowest bin.
        assert_eq!(picker.pick(&product, &product, 1), Some(3));
        assert_eq!(picker.pick(&[0.0; 6], &[0.0; 6], 1), None);
    }

    #[test]
    fn test_z_score_flags_spikes() {
        let mut values = [1.0_f32; 32];
        for (i, value) in values.iter_mut().enumerate() {
            *value += 0.1 * (i % 2) as f32;
        }
        values[12] = 10.0;
        values[20] = -8.0;
        let mut detector = ZScoreDetector::new(5, 3.5, 0.5, 32).unwrap();
        let signals = detector.detect(&values);
        for (i, signal) in signals.iter().enumerate() {
            let expected = match i {
                12 => 1,
                20 => -1,
                _ => 0,
            };
            assert_eq!(*signal, expected, "bin {}", i);
        }
    }

    #[test]
    fn test_z_score_ignores_short_series() {
        let mut detector = ZScoreDetector::new(5, 3.5, 0.5, 8).unwrap();
        assert!(detector.detect(&[0.0, 100.0, 0.0, 0.0, 0.0]).iter().all(|s| *s == 0));
    }

    #[test]
    fn test_z_score_picks_largest_amplitude() {
        let mut product = [1.0_f32; 24];
        product[9] = 50.0;
        product[16] = 40.0;
        let mut amplitudes = [1.0_f32; 24];
        amplitudes[9] = 2.0;
        amplitudes[16] = 3.0;
        let mut picker = PeakDetector::from_strategy(PeakStrategy::default(), 24).unwrap();
        assert_eq!(picker.pick(&product, &amplitudes, 0), Some(16));
        assert_eq!(picker.pick(&product, &amplitudes, 17), None);
    }
}
