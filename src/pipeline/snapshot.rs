use crate::hps::PitchEstimate;
use crate::scale::ScaleKind;

/// Everything the worker needs to know about a hop, captured by the real time
/// context when the hop completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopSnapshot {
    /// Counts hops from 0, including dropped ones.
    pub sequence: u64,
    /// The input write cursor at the end of the hop. The frame to analyze
    /// is the `window_size` samples before it.
    pub write_position: usize,
    pub scale: ScaleKind,
    pub bypass: bool,
    pub dump: bool,
}

/// The steps of one hop. The real time context accumulates and snapshots,
/// the worker does the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopStage {
    Accumulate,
    Snapshot,
    Analyze,
    Estimate,
    Quantize,
    Correct,
    Synthesize,
    OverlapAdd,
}

impl HopStage {
    pub fn next(self) -> HopStage {
        match self {
            HopStage::Accumulate => HopStage::Snapshot,
            HopStage::Snapshot => HopStage::Analyze,
            HopStage::Analyze => HopStage::Estimate,
            HopStage::Estimate => HopStage::Quantize,
            HopStage::Quantize => HopStage::Correct,
            HopStage::Correct => HopStage::Synthesize,
            HopStage::Synthesize => HopStage::OverlapAdd,
            HopStage::OverlapAdd => HopStage::Accumulate,
        }
    }
}

/// What happened to one channel during the most recent hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopReport {
    pub sequence: u64,
    pub estimate: PitchEstimate,
    /// The most recent voiced estimate, or 0 if there has been none.
    pub held_frequency: f32,
    /// The scale note the estimate was snapped to.
    pub target_frequency: Option<f32>,
    /// `target_frequency` as a fractional MIDI note number.
    pub target_note: Option<f32>,
    /// True if the frame was pitch shifted.
    pub corrected: bool,
}

impl Default for HopReport {
    fn default() -> Self {
        HopReport {
            sequence: 0,
            estimate: PitchEstimate::Unvoiced,
            held_frequency: 0.0,
            target_frequency: None,
            target_note: None,
            corrected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HopStage;

    #[test]
    fn test_stage_cycle() {
        let mut stage = HopStage::Accumulate;
        let mut count = 0;
        loop {
            stage = stage.next();
            count += 1;
            if stage == HopStage::Accumulate {
                break;
            }
        }
        assert_eq!(count, 8);
        assert_eq!(HopStage::Synthesize.next(), HopStage::OverlapAdd);
    }
}
