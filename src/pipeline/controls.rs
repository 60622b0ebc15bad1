use crate::scale::ScaleKind;

/// The control inputs of the real time context.
///
/// Inputs are expected to be debounced already. The scale select edge is
/// additionally ignored if it arrives within `retrigger_interval` samples of
/// the last accepted one.
pub struct Controls {
    bypass: bool,
    scale: ScaleKind,
    retrigger_interval: usize,
    samples_since_scale_change: usize,
    dump_requested: bool,
}

impl Controls {
    pub fn new(retrigger_interval: usize) -> Self {
        Controls {
            bypass: false,
            scale: ScaleKind::default(),
            retrigger_interval,
            samples_since_scale_change: retrigger_interval,
            dump_requested: false,
        }
    }

    pub fn bypass(&self) -> bool {
        self.bypass
    }

    /// Sets the level of the bypass input. While true, frames pass through uncorrected.
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass
    }

    pub fn scale(&self) -> ScaleKind {
        self.scale
    }

    /// Handles a scale select edge. Returns true if the scale changed.
    pub fn select_next_scale(&mut self) -> bool {
        if self.samples_since_scale_change < self.retrigger_interval {
            return false;
        }
        self.samples_since_scale_change = 0;
        self.scale = self.scale.next();
        true
    }

    /// Requests a spectrum dump of the next analyzed frame.
    pub fn request_dump(&mut self) {
        self.dump_requested = true
    }

    pub(crate) fn tick(&mut self) {
        self.samples_since_scale_change = self.samples_since_scale_change.saturating_add(1);
    }

    pub(crate) fn take_dump_request(&mut self) -> bool {
        let requested = self.dump_requested;
        self.dump_requested = false;
        requested
    }
}
