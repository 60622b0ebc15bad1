use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::common::{freq_to_midi_note, RingBuffer, SpectralEngine, Windower};
use crate::config::Config;
use crate::dump::SpectrumDump;
use crate::error::{try_alloc, Error};
use crate::hps::{PitchEstimate, PitchEstimator};
use crate::pipeline::snapshot::{HopReport, HopSnapshot, HopStage};
use crate::scale::{NoteQuantizer, ScaleKind};
use crate::vocoder::PitchCorrector;

/// Per channel analysis and synthesis state.
pub(crate) struct Channel {
    input: RingBuffer,
    output: RingBuffer,
    frame: Box<[f32]>,
    engine: SpectralEngine,
    estimator: PitchEstimator,
    corrector: PitchCorrector,
    held_frequency: f32,
    report: HopReport,
}

impl Channel {
    pub(crate) fn new(config: &Config, input: RingBuffer, output: RingBuffer) -> Result<Self, Error> {
        Ok(Channel {
            input,
            output,
            frame: try_alloc("analysis frame", config.window_size, 0.0)?,
            engine: SpectralEngine::new(config.window_size)?,
            estimator: PitchEstimator::new(config)?,
            corrector: PitchCorrector::new(config),
            held_frequency: 0.0,
            report: HopReport::default(),
        })
    }
}

/// The deferred half of a [`Pipeline`](super::Pipeline).
///
/// Pops hop snapshots and, for each channel, extracts the frame ending at the
/// snapshot, estimates and corrects its pitch and overlap-adds the result into
/// the output ring buffer.
pub struct Worker {
    window_size: usize,
    hop_size: usize,
    consumer: rtrb::Consumer<HopSnapshot>,
    completed_hops: Arc<AtomicU64>,
    windower: Windower,
    synthesis_gain: f32,
    quantizer: NoteQuantizer,
    dump: SpectrumDump,
    channels: Box<[Channel]>,
    next_sequence: u64,
    skipped_hops: u64,
    scale: Option<ScaleKind>,
    stage: HopStage,
}

impl Worker {
    pub(crate) fn new(
        config: &Config,
        consumer: rtrb::Consumer<HopSnapshot>,
        completed_hops: Arc<AtomicU64>,
        channels: Box<[Channel]>,
    ) -> Result<Self, Error> {
        let windower = Windower::hann(config.window_size)?;
        let synthesis_gain = windower.overlap_add_gain(config.hop_size);
        Ok(Worker {
            window_size: config.window_size,
            hop_size: config.hop_size,
            consumer,
            completed_hops,
            windower,
            synthesis_gain,
            quantizer: NoteQuantizer::new(),
            dump: SpectrumDump::from_config(config),
            channels,
            next_sequence: 0,
            skipped_hops: 0,
            scale: None,
            stage: HopStage::Accumulate,
        })
    }

    /// True once the real time half has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }

    /// The last hop stage the worker completed.
    pub fn stage(&self) -> HopStage {
        self.stage
    }

    /// The number of hops the worker never saw because they were dropped.
    pub fn skipped_hops(&self) -> u64 {
        self.skipped_hops
    }

    pub fn report(&self, channel: usize) -> &HopReport {
        &self.channels[channel].report
    }

    pub fn estimator(&self, channel: usize) -> &PitchEstimator {
        &self.channels[channel].estimator
    }

    pub fn corrector(&self, channel: usize) -> &PitchCorrector {
        &self.channels[channel].corrector
    }

    /// Processes all queued hops. Returns the number of hops processed.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(snapshot) = self.consumer.pop() {
            self.process_hop(&snapshot);
            count += 1;
        }
        count
    }

    pub fn process_hop(&mut self, snapshot: &HopSnapshot) {
        self.stage = HopStage::Snapshot;
        if snapshot.sequence > self.next_sequence {
            // Keep the output aligned with the input across the hops that never arrived.
            let skipped = snapshot.sequence - self.next_sequence;
            warn!("Worker skipped {} dropped hop(s)", skipped);
            self.skipped_hops += skipped;
            let offset = (skipped as usize * self.hop_size) as isize;
            for channel in self.channels.iter_mut() {
                let cursor = channel.output.write_cursor() as isize;
                channel.output.set_write_cursor(cursor + offset);
            }
        }
        self.next_sequence = snapshot.sequence + 1;
        if self.scale != Some(snapshot.scale) {
            debug!("Correcting towards {:?}", snapshot.scale);
            self.scale = Some(snapshot.scale);
        }

        let rewind = (self.window_size - self.hop_size) as isize;
        for (index, channel) in self.channels.iter_mut().enumerate() {
            channel
                .input
                .copy_ending_at(snapshot.write_position as isize, &mut channel.frame);
            self.windower.apply(&mut channel.frame);
            channel.engine.load_real(&channel.frame);
            channel.engine.forward();
            self.stage = HopStage::Analyze;

            let estimate = channel.estimator.process(channel.engine.frame());
            if estimate.is_voiced() {
                channel.held_frequency = estimate.frequency();
            }
            if snapshot.dump && index == 0 {
                if let Err(error) = self.dump.write(&channel.estimator) {
                    warn!("Spectrum dump failed: {}", error);
                }
            }
            self.stage = HopStage::Estimate;

            let target = match estimate {
                PitchEstimate::Voiced { frequency, .. } => {
                    Some(self.quantizer.quantize(frequency, snapshot.scale))
                }
                PitchEstimate::Unvoiced => None,
            };
            self.stage = HopStage::Quantize;

            let corrected = match (estimate, target) {
                (PitchEstimate::Voiced { frequency, bin }, Some(target)) if !snapshot.bypass => {
                    channel
                        .corrector
                        .correct(channel.engine.frame_mut(), bin, frequency, target)
                }
                _ => false,
            };
            self.stage = HopStage::Correct;

            channel.engine.inverse();
            self.stage = HopStage::Synthesize;

            for bin in channel.engine.frame().iter() {
                channel.output.insert_and_add(bin.re * self.synthesis_gain);
            }
            let cursor = channel.output.write_cursor() as isize;
            channel.output.set_write_cursor(cursor - rewind);

            channel.report = HopReport {
                sequence: snapshot.sequence,
                estimate,
                held_frequency: channel.held_frequency,
                target_frequency: target,
                target_note: target.map(freq_to_midi_note),
                corrected,
            };
            trace!(
                "Hop {} channel {}: {:.2} Hz -> {:?} Hz, corrected {}",
                snapshot.sequence,
                index,
                estimate.frequency(),
                target,
                corrected
            );
        }
        self.completed_hops.fetch_add(1, Ordering::Release);
        self.stage = HopStage::OverlapAdd;
    }
}
