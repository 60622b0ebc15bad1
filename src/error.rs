//! Error types.
//!
//! Only pipeline construction and the diagnostic dump writer can fail. Anything
//! that goes wrong while processing a hop (no peak, a peak below the minimum
//! frequency, a flat topped peak) is handled locally by passing the frame
//! through uncorrected, so these errors never reach the real time context.

use thiserror::Error;

/// Invalid [`Config`](crate::Config) values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be greater than 0")]
    Zero { name: &'static str },
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),
    #[error("window size must be an even number of at least {minimum} samples, got {window_size}")]
    WindowTooSmall { window_size: usize, minimum: usize },
    #[error("hop size {hop_size} must not be greater than window size {window_size}")]
    HopExceedsWindow { hop_size: usize, window_size: usize },
    #[error("hop size {hop_size} must not be greater than half the window, {maximum}")]
    HopTooLarge { hop_size: usize, maximum: usize },
    #[error("worker margin {margin} must be at least one hop, {required} samples, to run the worker on its own thread")]
    WorkerMarginTooSmall { margin: usize, required: usize },
    #[error("window size {window_size} must be evenly divisible by hop size {hop_size}")]
    HopDoesNotDivideWindow { hop_size: usize, window_size: usize },
    #[error("ring buffer capacity {capacity} is too small, at least {required} samples are needed")]
    CapacityTooSmall { capacity: usize, required: usize },
    #[error("minimum frequency {frequency} Hz must lie between 0 and the Nyquist frequency {nyquist} Hz")]
    InvalidMinFrequency { frequency: f32, nyquist: f32 },
    #[error("invalid peak detection parameter {name}: {reason}")]
    InvalidPeakParameter {
        name: &'static str,
        reason: &'static str,
    },
    #[error("spectral floor must be a finite negative dB value, got {0}")]
    InvalidSpectralFloor(f32),
    #[error("invalid decimation factors: {0}")]
    InvalidDecimationFactors(&'static str),
    #[error("invalid scale table: {0}")]
    InvalidScale(&'static str),
}

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration was rejected. Fatal at initialization.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A buffer or transform workspace could not be allocated. Fatal at initialization.
    #[error("failed to allocate {what} ({len} elements)")]
    ResourceExhausted { what: &'static str, len: usize },
    /// Writing a diagnostic spectrum dump failed.
    #[error("failed to write spectrum dump: {0}")]
    Dump(#[from] std::io::Error),
    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Allocates a boxed slice of `len` copies of `value`, reporting allocation
/// failure instead of aborting.
pub(crate) fn try_alloc<T: Clone>(what: &'static str, len: usize, value: T) -> Result<Box<[T]>, Error> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::ResourceExhausted { what, len })?;
    buffer.resize(len, value);
    Ok(buffer.into_boxed_slice())
}
