//! Pitch corrects a WAV file.
//!
//! ```text
//! cargo run --example wav_tune -- input.wav output.wav [pentatonic|major|minor]
//! ```
//!
//! Set `RUST_LOG=debug` to see what the pipeline is doing.

use std::env;
use std::process;

use log::info;
use micro_tune::{Config, PhaseAdvance, Pipeline, ScaleKind};

fn read_wav(path: &str) -> Result<(hound::WavSpec, Vec<f32>), hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok((spec, samples))
}

fn write_wav(path: &str, sample_rate: u32, channel_count: u16, buffer: &[f32]) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: channel_count,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let amplitude = i16::MAX as f32;
    for sample in buffer.iter() {
        writer.write_sample((sample.max(-1.0).min(1.0) * amplitude) as i16)?;
    }
    writer.finalize()
}

fn parse_scale(name: &str) -> Option<ScaleKind> {
    match name {
        "pentatonic" => Some(ScaleKind::MajorPentatonic),
        "major" => Some(ScaleKind::Major),
        "minor" => Some(ScaleKind::NaturalMinor),
        _ => None,
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input.wav> <output.wav> [pentatonic|major|minor]", args[0]);
        process::exit(1);
    }
    let scale = match args.get(3) {
        Some(name) => match parse_scale(name) {
            Some(scale) => scale,
            None => {
                eprintln!("Unknown scale \"{}\"", name);
                process::exit(1);
            }
        },
        None => ScaleKind::default(),
    };

    let (spec, input) = match read_wav(&args[1]) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("Failed to read {}: {}", args[1], error);
            process::exit(1);
        }
    };
    let channel_count = spec.channels as usize;
    let config = Config {
        sample_rate: spec.sample_rate as f32,
        channel_count,
        scale_retrigger_interval: 0,
        phase_advance: PhaseAdvance::BinFrequency,
        ..Config::default()
    };
    let mut pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(error) => {
            eprintln!("{}", error);
            process::exit(1);
        }
    };
    while pipeline.controls().scale() != scale {
        pipeline.controls_mut().select_next_scale();
    }

    // Flush the pipeline with silence, then drop the initial latency.
    let latency = pipeline.latency() * channel_count;
    let mut padded = input;
    padded.resize(padded.len() + latency, 0.0);
    let mut output = vec![0.0; padded.len()];
    pipeline.process_interleaved(&padded, &mut output);
    info!(
        "Processed {} frames, last estimate {:.2} Hz",
        padded.len() / channel_count,
        pipeline.worker().report(0).held_frequency
    );

    if let Err(error) = write_wav(&args[2], spec.sample_rate, spec.channels, &output[latency..]) {
        eprintln!("Failed to write {}: {}", args[2], error);
        process::exit(1);
    }
}
