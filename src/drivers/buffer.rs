use std::collections::VecDeque;
use crate::drivers::signal::SignalDescriptor;
use crate::drivers::view::ViewParameters;
/// One decoded sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp_ms: u64,
    pub value: f64,
    /// `None` when the frame carried no envelope; `Some(0.0)` is a real zero.
    pub envelope: Option<f64>,
}
/// Sample retained for export, tagged with the signal/condition active when it arrived.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRecord {
    pub sample: Sample,
    pub signal: String,
    pub condition: String,
}
/// Two index-aligned rolling channels plus a longer export history.
///
/// Channel 1 holds raw values. Channel 2 holds the envelope: for signal kinds
/// that track one it grows in lockstep with channel 1 (gaps are filled with the
/// last envelope value); otherwise only present, nonzero envelopes are kept.
pub struct SampleBuffer {
    primary: VecDeque<f64>,
    envelope: VecDeque<f64>,
    export_log: VecDeque<ExportRecord>,
    window_size: usize,
    export_capacity: usize,
    min_window_seconds: f64,
    tracks_envelope: bool,
}
impl SampleBuffer {
    pub fn new(window_size: usize, export_capacity: usize, min_window_seconds: f64) -> Self {
        let window_size = window_size.max(1);
        Self {
            primary: VecDeque::with_capacity(window_size),
            envelope: VecDeque::with_capacity(window_size),
            export_log: VecDeque::new(),
            window_size,
            export_capacity: export_capacity.max(1),
            min_window_seconds,
            tracks_envelope: false,
        }
    }
    /// Buffer sized for `descriptor` at 100% horizontal zoom.
    pub fn for_descriptor(
        descriptor: &SignalDescriptor,
        export_capacity: usize,
        min_window_seconds: f64,
    ) -> Self {
        let mut buffer = Self::new(1, export_capacity, min_window_seconds);
        buffer.resize_window(descriptor, &ViewParameters::default());
        buffer
    }
    pub fn window_size(&self) -> usize {
        self.window_size
    }
    pub fn len(&self) -> usize {
        self.primary.len()
    }
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
    pub fn primary(&self) -> &VecDeque<f64> {
        &self.primary
    }
    pub fn envelope(&self) -> &VecDeque<f64> {
        &self.envelope
    }
    pub fn export_log(&self) -> &VecDeque<ExportRecord> {
        &self.export_log
    }
    pub fn tracks_envelope(&self) -> bool {
        self.tracks_envelope
    }
    pub fn append(&mut self, sample: Sample) {
        self.primary.push_back(sample.value);
        if self.tracks_envelope {
            // The device omits `env` when it is zero.
            self.envelope.push_back(sample.envelope.unwrap_or(0.0));
        } else if let Some(env) = sample.envelope.filter(|e| *e != 0.0) {
            self.envelope.push_back(env);
        }
        self.evict();
    }
    /// Appends and also records the sample in the export log.
    pub fn append_logged(&mut self, sample: Sample, signal: &str, condition: &str) {
        if self.export_log.len() == self.export_capacity {
            self.export_log.pop_front();
        }
        self.export_log.push_back(ExportRecord {
            sample: sample.clone(),
            signal: signal.to_owned(),
            condition: condition.to_owned(),
        });
        self.append(sample);
    }
    /// Window length in samples for `descriptor` under the current horizontal zoom.
    pub fn window_for(&self, descriptor: &SignalDescriptor, view: &ViewParameters) -> usize {
        let seconds = (descriptor.window_seconds / view.horizontal_zoom_factor())
            .max(self.min_window_seconds);
        ((seconds * descriptor.sample_rate_hz as f64).round() as usize).max(1)
    }
    /// Recomputes the window for the active signal and zoom. Vertical zoom does
    /// not change how much history is kept.
    pub fn resize_window(&mut self, descriptor: &SignalDescriptor, view: &ViewParameters) {
        self.tracks_envelope = descriptor.tracks_envelope();
        let size = self.window_for(descriptor, view);
        self.set_window_size(size);
    }
    pub fn set_window_size(&mut self, window_size: usize) {
        self.window_size = window_size.max(1);
        self.evict();
    }
    /// Drops everything, including the export log.
    pub fn reset(&mut self) {
        self.primary.clear();
        self.envelope.clear();
        self.export_log.clear();
    }
    fn evict(&mut self) {
        while self.primary.len() > self.window_size {
            self.primary.pop_front();
        }
        while self.envelope.len() > self.window_size {
            self.envelope.pop_front();
        }
    }
}
