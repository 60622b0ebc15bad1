use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::common::RingBuffer;
use crate::pipeline::controls::Controls;
use crate::pipeline::snapshot::HopSnapshot;

/// The real time half of a [`Pipeline`](super::Pipeline).
///
/// Moves samples between the host and the ring buffers and hands a
/// [`HopSnapshot`] to the worker every `hop_size` samples. It never blocks,
/// allocates or logs: if the worker queue is full the hop is dropped and counted.
pub struct Processor {
    channel_count: usize,
    hop_size: usize,
    latency: usize,
    inputs: Box<[RingBuffer]>,
    outputs: Box<[RingBuffer]>,
    hop_counter: usize,
    sequence: u64,
    dropped_hops: u64,
    producer: rtrb::Producer<HopSnapshot>,
    completed_hops: Arc<AtomicU64>,
    controls: Controls,
}

impl Processor {
    pub(crate) fn new(
        hop_size: usize,
        latency: usize,
        inputs: Box<[RingBuffer]>,
        outputs: Box<[RingBuffer]>,
        producer: rtrb::Producer<HopSnapshot>,
        completed_hops: Arc<AtomicU64>,
        controls: Controls,
    ) -> Self {
        Processor {
            channel_count: inputs.len(),
            hop_size,
            latency,
            inputs,
            outputs,
            hop_counter: 0,
            sequence: 0,
            dropped_hops: 0,
            producer,
            completed_hops,
            controls,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// The delay, in samples, between an input sample and its corrected output.
    pub fn latency(&self) -> usize {
        self.latency
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    /// The number of hops that could not be handed to the worker.
    pub fn dropped_hops(&self) -> u64 {
        self.dropped_hops
    }

    /// The number of hops handed to the worker so far.
    pub fn submitted_hops(&self) -> u64 {
        self.sequence - self.dropped_hops
    }

    /// The number of hops the worker has overlap-added into the output.
    pub fn completed_hops(&self) -> u64 {
        self.completed_hops.load(Ordering::Acquire)
    }

    /// Processes one tick: one input and one output sample per channel.
    /// Returns true if the tick completed a hop.
    pub fn process_frame(&mut self, input: &[f32], output: &mut [f32]) -> bool {
        assert_eq!(input.len(), self.channel_count);
        assert_eq!(output.len(), self.channel_count);
        // Pairs with the release in the worker, so every overlap-add of a
        // completed hop is visible before its samples are read.
        self.completed_hops.load(Ordering::Acquire);
        for (buffer, sample) in self.inputs.iter_mut().zip(input.iter()) {
            buffer.insert(*sample);
        }
        for (buffer, sample) in self.outputs.iter_mut().zip(output.iter_mut()) {
            *sample = buffer.read_and_clear_next();
        }
        self.controls.tick();

        self.hop_counter += 1;
        if self.hop_counter < self.hop_size {
            return false;
        }
        self.hop_counter = 0;
        let snapshot = HopSnapshot {
            sequence: self.sequence,
            write_position: self.inputs[0].write_cursor(),
            scale: self.controls.scale(),
            bypass: self.controls.bypass(),
            dump: self.controls.take_dump_request(),
        };
        self.sequence += 1;
        if self.producer.push(snapshot).is_err() {
            self.dropped_hops += 1;
        }
        true
    }

    /// Processes a block of interleaved samples. Returns the number of completed hops.
    pub fn process_interleaved(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        assert_eq!(input.len(), output.len());
        assert_eq!(input.len() % self.channel_count, 0);
        let mut hops = 0;
        for (input, output) in input
            .chunks_exact(self.channel_count)
            .zip(output.chunks_exact_mut(self.channel_count))
        {
            if self.process_frame(input, output) {
                hops += 1;
            }
        }
        hops
    }
}
