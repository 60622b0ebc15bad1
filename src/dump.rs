//! Text dumps of the spectra behind a pitch estimate.
//!
//! Each line holds a frequency in Hz followed by one or more amplitudes,
//! separated by spaces, in ascending frequency order. Existing files are
//! overwritten.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::Config;
use crate::error::Error;
use crate::hps::PitchEstimator;

pub const SPECTRUM_FILE_NAME: &str = "spectrum.txt";
pub const HPS_FILE_NAME: &str = "hps.txt";

/// Writes a single sided amplitude spectrum. All bins except DC are doubled
/// to account for the energy in the mirrored upper half.
pub fn write_amplitude_spectrum<W: Write>(
    writer: &mut W,
    amplitudes: &[f32],
    frequency_step: f32,
) -> std::io::Result<()> {
    for (bin, amplitude) in amplitudes.iter().enumerate() {
        let amplitude = if bin == 0 { *amplitude } else { 2.0 * amplitude };
        writeln!(writer, "{} {}", bin as f32 * frequency_step, amplitude)?;
    }
    Ok(())
}

/// Writes the harmonic product spectrum of the last frame analyzed by `estimator`.
/// With `include_intermediates`, each line also holds the amplitude and the
/// decimated amplitudes the product was formed from, before the product itself.
pub fn write_product_spectrum<W: Write>(
    writer: &mut W,
    estimator: &PitchEstimator,
    include_intermediates: bool,
) -> std::io::Result<()> {
    let frequency_step = estimator.frequency_step();
    let factor_count = estimator.decimation_factors().len();
    for (bin, product) in estimator.product_spectrum().iter().enumerate() {
        write!(writer, "{}", bin as f32 * frequency_step)?;
        if include_intermediates {
            write!(writer, " {}", estimator.amplitude_spectrum()[bin])?;
            for index in 0..factor_count {
                write!(writer, " {}", estimator.decimated_spectrum(index)[bin])?;
            }
        }
        writeln!(writer, " {}", product)?;
    }
    Ok(())
}

/// Writes `spectrum.txt` and `hps.txt` to a directory.
pub struct SpectrumDump {
    directory: PathBuf,
    include_intermediates: bool,
}

impl SpectrumDump {
    pub fn new<P: Into<PathBuf>>(directory: P, include_intermediates: bool) -> Self {
        SpectrumDump {
            directory: directory.into(),
            include_intermediates,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        SpectrumDump::new(config.dump_directory.clone(), config.dump_intermediates)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn write(&self, estimator: &PitchEstimator) -> Result<(), Error> {
        let spectrum_path = self.directory.join(SPECTRUM_FILE_NAME);
        let mut writer = BufWriter::new(File::create(&spectrum_path)?);
        write_amplitude_spectrum(
            &mut writer,
            estimator.amplitude_spectrum(),
            estimator.frequency_step(),
        )?;
        writer.flush()?;

        let hps_path = self.directory.join(HPS_FILE_NAME);
        let mut writer = BufWriter::new(File::create(&hps_path)?);
        write_product_spectrum(&mut writer, estimator, self.include_intermediates)?;
        writer.flush()?;

        debug!(
            "Wrote {} and {}",
            spectrum_path.display(),
            hps_path.display()
        );
        Ok(())
    }
}
