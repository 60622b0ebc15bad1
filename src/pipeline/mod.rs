//! The streaming analysis and resynthesis pipeline.
//!
//! A [`Pipeline`] is made of two halves that share per channel ring buffers:
//!
//! * The [`Processor`] runs in the real time context. Every tick it writes
//!   one input sample per channel and reads one output sample per channel.
//!   Every `hop_size` samples it pushes a [`HopSnapshot`] onto a lock free
//!   queue.
//! * The [`Worker`] pops snapshots. For each channel it windows the
//!   `window_size` samples ending at the snapshot, transforms them, estimates
//!   the pitch, snaps it to the active scale, shifts the spectrum towards it,
//!   transforms back and overlap-adds the result into the output ring buffer.
//!   It then rewinds the output write cursor by `window_size - hop_size`
//!   samples, so that the next frame overlaps this one.
//!
//! Output is delayed by `window_size + worker_margin` samples. When the two
//! halves run on the same thread ([`Pipeline::process_frame`]) the margin can
//! be 0. A worker running on its own thread ([`Pipeline::start`]) needs a
//! margin of at least one hop, and has to finish each hop within
//! `worker_margin` samples of the hop boundary.
//!
//! # Example
//! ```
//! use micro_tune::{Config, Pipeline};
//!
//! let config = Config {
//!     window_size: 1024,
//!     hop_size: 256,
//!     ..Config::default()
//! };
//! let mut pipeline = Pipeline::new(config).unwrap();
//! pipeline.controls_mut().set_bypass(true);
//!
//! let mut output = [0.0];
//! let mut delayed = vec![];
//! for n in 0..4096 {
//!     let input = [(n as f32 * 0.01).sin()];
//!     pipeline.process_frame(&input, &mut output);
//!     delayed.push(output[0]);
//! }
//! // With correction bypassed, the output is the input delayed by one window.
//! let latency = pipeline.latency();
//! assert_eq!(latency, 1024);
//! assert!((delayed[3000] - (((3000 - latency) as f32) * 0.01).sin()).abs() < 1e-4);
//! ```

mod controls;
mod processor;
mod snapshot;
mod worker;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::common::RingBuffer;
use crate::config::Config;
use crate::error::{ConfigError, Error};
use worker::Channel;

pub use controls::Controls;
pub use processor::Processor;
pub use snapshot::{HopReport, HopSnapshot, HopStage};
pub use worker::Worker;

/// How long an idle worker thread sleeps before polling the queue again.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Real time pitch correction of a fixed number of channels.
pub struct Pipeline {
    config: Config,
    processor: Processor,
    worker: Worker,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let (producer, consumer) = rtrb::RingBuffer::<HopSnapshot>::new(config.queue_capacity);
        let completed_hops = Arc::new(AtomicU64::new(0));

        let mut inputs = Vec::with_capacity(config.channel_count);
        let mut outputs = Vec::with_capacity(config.channel_count);
        let mut channels = Vec::with_capacity(config.channel_count);
        for _ in 0..config.channel_count {
            let input = RingBuffer::new(config.ring_capacity)?;
            let mut output = RingBuffer::new(config.ring_capacity)?;
            // The first frame is written one hop, plus the margin, ahead of the reader.
            output.set_write_cursor((config.hop_size + config.worker_margin) as isize);
            channels.push(Channel::new(&config, input.share(), output.share())?);
            inputs.push(input);
            outputs.push(output);
        }

        let processor = Processor::new(
            config.hop_size,
            config.latency(),
            inputs.into_boxed_slice(),
            outputs.into_boxed_slice(),
            producer,
            completed_hops.clone(),
            Controls::new(config.scale_retrigger_interval),
        );
        let worker = Worker::new(&config, consumer, completed_hops, channels.into_boxed_slice())?;
        info!(
            "Created pipeline: {} channel(s), {} Hz, window {}, hop {}, latency {} samples",
            config.channel_count,
            config.sample_rate,
            config.window_size,
            config.hop_size,
            config.latency()
        );
        Ok(Pipeline {
            config,
            processor,
            worker,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The delay, in samples, between an input sample and its corrected output.
    pub fn latency(&self) -> usize {
        self.processor.latency()
    }

    pub fn controls(&self) -> &Controls {
        self.processor.controls()
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        self.processor.controls_mut()
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Processes one tick, running the worker inline when the tick completes a hop.
    pub fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        if self.processor.process_frame(input, output) {
            self.worker.run_pending();
        }
    }

    /// Processes a block of interleaved samples, running the worker inline at each hop.
    pub fn process_interleaved(&mut self, input: &[f32], output: &mut [f32]) {
        let channel_count = self.config.channel_count;
        assert_eq!(input.len(), output.len());
        assert_eq!(input.len() % channel_count, 0);
        for (input, output) in input
            .chunks_exact(channel_count)
            .zip(output.chunks_exact_mut(channel_count))
        {
            self.process_frame(input, output);
        }
    }

    /// Separates the real time half from the worker, for driving them from different contexts.
    pub fn split(self) -> (Processor, Worker) {
        (self.processor, self.worker)
    }

    /// Moves the worker to a new thread. The thread processes hops until the
    /// returned [`Processor`] is dropped, and then returns the worker.
    ///
    /// Fails if `worker_margin` is less than `hop_size`. With a smaller margin
    /// the worker overlap-adds into output samples the reader has already consumed.
    pub fn start(self) -> Result<(Processor, thread::JoinHandle<Worker>), Error> {
        if self.config.worker_margin < self.config.hop_size {
            return Err(ConfigError::WorkerMarginTooSmall {
                margin: self.config.worker_margin,
                required: self.config.hop_size,
            }
            .into());
        }
        let (processor, mut worker) = self.split();
        let handle = thread::Builder::new()
            .name("micro-tune-worker".to_string())
            .spawn(move || {
                while !worker.is_abandoned() {
                    if worker.run_pending() == 0 {
                        thread::sleep(WORKER_POLL_INTERVAL);
                    }
                }
                worker.run_pending();
                debug!("Worker thread done");
                worker
            })
            .map_err(Error::Spawn)?;
        Ok((processor, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::{HopStage, Pipeline};
    use crate::common::{SpectralEngine, Windower};
    use crate::config::{Config, PhaseAdvance};
    use crate::error::{ConfigError, Error};
    use crate::hps::PitchEstimator;
    use crate::scale::ScaleKind;
    use std::thread;

    fn small_config() -> Config {
        Config {
            window_size: 1024,
            hop_size: 256,
            ring_capacity: 4096,
            ..Config::default()
        }
    }

    /// Deterministic noise in [-0.5, 0.5).
    fn noise(len: usize) -> Vec<f32> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1 << 24) as f32 - 0.5
            })
            .collect()
    }

    fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| 0.5 * (2.0 * std::f32::consts::PI * frequency * n as f32 / sample_rate).sin())
            .collect()
    }

    fn run_mono(pipeline: &mut Pipeline, input: &[f32]) -> Vec<f32> {
        let mut output = vec![0.0; input.len()];
        for (x, y) in input.iter().zip(output.iter_mut()) {
            let mut out = [0.0];
            pipeline.process_frame(&[*x], &mut out);
            *y = out[0];
        }
        output
    }

    fn estimate(config: &Config, samples: &[f32]) -> f32 {
        let mut frame = samples.to_vec();
        Windower::hann(config.window_size).unwrap().apply(&mut frame);
        let mut engine = SpectralEngine::new(config.window_size).unwrap();
        engine.load_real(&frame);
        engine.forward();
        PitchEstimator::new(config).unwrap().process(engine.frame()).frequency()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            hop_size: 0,
            ..Config::default()
        };
        assert!(matches!(Pipeline::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_bypass_delays_input_by_latency() {
        let config = small_config();
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.controls_mut().set_bypass(true);
        let latency = pipeline.latency();
        assert_eq!(latency, 1024);

        let input = noise(8192);
        let output = run_mono(&mut pipeline, &input);
        for (t, y) in output.iter().enumerate() {
            let expected = if t < latency { 0.0 } else { input[t - latency] };
            assert!((y - expected).abs() < 1e-4, "sample {}", t);
        }
        assert_eq!(pipeline.worker().stage(), HopStage::OverlapAdd);
        assert_eq!(pipeline.processor().completed_hops(), 8192 / 256);
        assert!(!pipeline.worker().report(0).corrected);
    }

    #[test]
    fn test_bypass_with_margin() {
        let config = Config {
            worker_margin: 300,
            ..small_config()
        };
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.controls_mut().set_bypass(true);
        let latency = pipeline.latency();
        assert_eq!(latency, 1324);
        let input = noise(6000);
        let output = run_mono(&mut pipeline, &input);
        for t in latency..input.len() {
            assert!((output[t] - input[t - latency]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_hop_of_a_full_window_is_rejected() {
        let config = Config {
            window_size: 1024,
            hop_size: 1024,
            ..small_config()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(Error::Config(ConfigError::HopTooLarge { .. }))
        ));
    }

    #[test]
    fn test_bypass_with_half_window_hop() {
        let config = Config {
            window_size: 1024,
            hop_size: 512,
            ..small_config()
        };
        let mut pipeline = Pipeline::new(config.clone()).unwrap();
        pipeline.controls_mut().set_bypass(true);
        let latency = pipeline.latency();
        let input = sine(440.0, config.sample_rate, 8192);
        let output = run_mono(&mut pipeline, &input);
        for t in latency..input.len() {
            assert!((output[t] - input[t - latency]).abs() < 1e-3, "sample {}", t);
        }
    }

    #[test]
    fn test_in_scale_note_is_kept() {
        let config = Config {
            scale_retrigger_interval: 0,
            ..Config::default()
        };
        let mut pipeline = Pipeline::new(config.clone()).unwrap();
        assert!(pipeline.controls_mut().select_next_scale());
        assert_eq!(pipeline.controls().scale(), ScaleKind::Major);

        let input = sine(440.0, config.sample_rate, 10 * config.window_size);
        let output = run_mono(&mut pipeline, &input);
        let report = pipeline.worker().report(0);
        assert_eq!(report.target_frequency, Some(440.0));

        let tail = &output[output.len() - config.window_size..];
        let corrected = estimate(&config, tail);
        assert!((corrected - 440.0).abs() < config.frequency_step(), "{} Hz", corrected);
    }

    #[test]
    fn test_converges_to_scale_note() {
        let config = Config {
            scale_retrigger_interval: 0,
            phase_advance: PhaseAdvance::BinFrequency,
            ..Config::default()
        };
        let mut pipeline = Pipeline::new(config.clone()).unwrap();
        assert!(pipeline.controls_mut().select_next_scale());
        assert!(pipeline.controls_mut().select_next_scale());
        assert_eq!(pipeline.controls().scale(), ScaleKind::NaturalMinor);

        let input = sine(440.0, config.sample_rate, 10 * config.window_size);
        let output = run_mono(&mut pipeline, &input);

        let report = pipeline.worker().report(0);
        assert!(report.corrected);
        assert!((report.estimate.frequency() - 440.0).abs() < config.frequency_step());
        let target = report.target_frequency.unwrap();
        assert!((target - 415.30).abs() < 0.01);
        assert!((report.target_note.unwrap() - 68.0).abs() < 0.01);

        let tail = &output[output.len() - config.window_size..];
        let corrected = estimate(&config, tail);
        assert!((corrected - target).abs() < config.frequency_step(), "{} Hz", corrected);
    }

    #[test]
    fn test_interleaved_channels_are_independent() {
        let config = Config {
            channel_count: 2,
            ..small_config()
        };
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.controls_mut().set_bypass(true);
        let left = noise(4096);
        let input: Vec<f32> = left.iter().flat_map(|x| vec![*x, -2.0 * x]).collect();
        let mut output = vec![0.0; input.len()];
        pipeline.process_interleaved(&input, &mut output);
        let latency = pipeline.latency();
        for t in latency..left.len() {
            assert!((output[2 * t] - left[t - latency]).abs() < 1e-4);
            assert!((output[2 * t + 1] + 2.0 * left[t - latency]).abs() < 2e-4);
        }
    }

    #[test]
    fn test_threaded_worker_matches_inline_worker() {
        let config = Config {
            worker_margin: 256,
            ..small_config()
        };
        let input = sine(523.0, config.sample_rate, 8192);

        let mut inline = Pipeline::new(config.clone()).unwrap();
        let expected = run_mono(&mut inline, &input);

        let (mut processor, handle) = Pipeline::new(config).unwrap().start().unwrap();
        let mut output = vec![0.0; input.len()];
        for (x, y) in input.iter().zip(output.iter_mut()) {
            let mut out = [0.0];
            if processor.process_frame(&[*x], &mut out) {
                // Stand in for a real time clock that gives the worker time to catch up.
                while processor.completed_hops() < processor.submitted_hops() {
                    thread::yield_now();
                }
            }
            *y = out[0];
        }
        assert_eq!(processor.dropped_hops(), 0);
        drop(processor);
        let worker = handle.join().unwrap();
        assert_eq!(worker.report(0).sequence, 8192 / 256 - 1);
        assert_eq!(output, expected);
    }

    #[test]
    fn test_start_requires_a_hop_of_margin() {
        let result = Pipeline::new(small_config()).unwrap().start();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::WorkerMarginTooSmall {
                margin: 0,
                required: 256
            }))
        ));
    }

    #[test]
    fn test_dropped_hops_are_counted() {
        let config = Config {
            queue_capacity: 2,
            ..small_config()
        };
        let (mut processor, mut worker) = Pipeline::new(config).unwrap().split();
        let input = vec![0.1; 5 * 256];
        let mut output = vec![0.0; input.len()];
        assert_eq!(processor.process_interleaved(&input, &mut output), 5);
        assert_eq!(processor.dropped_hops(), 3);
        assert_eq!(processor.submitted_hops(), 2);
        assert_eq!(worker.run_pending(), 2);
        assert_eq!(processor.completed_hops(), 2);

        let mut out = [0.0];
        for _ in 0..256 {
            processor.process_frame(&[0.1], &mut out);
        }
        assert_eq!(worker.run_pending(), 1);
        assert_eq!(worker.skipped_hops(), 3);
        assert_eq!(worker.report(0).sequence, 5);
    }

    #[test]
    fn test_dump_request() {
        let dir = std::env::temp_dir().join(format!("micro_tune_pipeline_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config {
            dump_directory: dir.clone(),
            ..small_config()
        };
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.controls_mut().request_dump();
        run_mono(&mut pipeline, &sine(440.0, 44100.0, 256));
        assert!(dir.join("spectrum.txt").exists());
        assert!(dir.join("hps.txt").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
