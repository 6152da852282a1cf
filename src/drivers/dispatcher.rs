use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use crate::drivers::buffer::{Sample, SampleBuffer};
use crate::drivers::protocol::{InboundMessage, MetricValue, StreamMeta};
use crate::drivers::signal::{self, SignalDescriptor};
use crate::drivers::view::ViewParameters;
/// Last metrics frame, replaced wholesale on every `metrics` event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub signal: Option<String>,
    pub fields: BTreeMap<String, MetricValue>,
}
/// Point counters rolled once per second.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub total_points: u64,
    pub points_per_second: u64,
    counter: u64,
    window_started: Option<Instant>,
    viewing_since: Option<Instant>,
}
impl StreamStats {
    fn new() -> Self {
        Self {
            total_points: 0,
            points_per_second: 0,
            counter: 0,
            window_started: None,
            viewing_since: None,
        }
    }
    fn count(&mut self, points: u64) {
        self.total_points += points;
        self.counter += points;
    }
    /// Publishes the rate once a full second has elapsed since the last roll.
    pub fn roll(&mut self, now: Instant) {
        let started = *self.window_started.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        if elapsed >= Duration::from_secs(1) {
            self.points_per_second = self.counter;
            self.counter = 0;
            self.window_started = Some(now);
        }
    }
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.viewing_since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }
}
/// Interprets decoded frames and owns everything they mutate: the sample
/// buffer, the active signal, device metadata and the metrics snapshot.
pub struct StreamDispatcher {
    buffer: SampleBuffer,
    signal_label: Option<String>,
    descriptor: &'static SignalDescriptor,
    condition: Option<String>,
    device_state: Option<String>,
    metrics: Option<MetricsSnapshot>,
    stats: StreamStats,
    view: ViewParameters,
    wire_scale: f64,
}
impl StreamDispatcher {
    pub fn new(export_capacity: usize, min_window_seconds: f64, wire_scale: f64) -> Self {
        let descriptor = signal::default_descriptor();
        Self {
            buffer: SampleBuffer::for_descriptor(descriptor, export_capacity, min_window_seconds),
            signal_label: None,
            descriptor,
            condition: None,
            device_state: None,
            metrics: None,
            stats: StreamStats::new(),
            view: ViewParameters::default(),
            wire_scale: if wire_scale > 0.0 { wire_scale } else { 1.0 },
        }
    }
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
    pub fn descriptor(&self) -> &'static SignalDescriptor {
        self.descriptor
    }
    /// Label as reported by the device, `None` before the first report.
    pub fn signal_label(&self) -> Option<&str> {
        self.signal_label.as_deref()
    }
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }
    pub fn device_state(&self) -> Option<&str> {
        self.device_state.as_deref()
    }
    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics.as_ref()
    }
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
    pub fn stats_mut(&mut self) -> &mut StreamStats {
        &mut self.stats
    }
    /// Applies a frame. `view` gates appends (paused) and sizes the window.
    pub fn dispatch(&mut self, message: InboundMessage, view: &ViewParameters) {
        self.sync_view(view);
        match message {
            InboundMessage::Welcome { message, client_id } => {
                log::info!(
                    "device says hello: {} (client {})",
                    message.as_deref().unwrap_or("-"),
                    client_id.map_or_else(|| "?".to_owned(), |id| id.to_string())
                );
            }
            InboundMessage::Pong => {}
            InboundMessage::State { meta } => self.apply_meta(meta),
            InboundMessage::Metrics { m } => {
                if let Some(fields) = m {
                    self.metrics = Some(MetricsSnapshot {
                        signal: self.signal_label.clone(),
                        fields,
                    });
                }
            }
            InboundMessage::Data { meta, v, env, t } => {
                self.apply_meta(meta);
                let Some(value) = v else {
                    return;
                };
                if view.paused {
                    return;
                }
                let sample = Sample {
                    timestamp_ms: t.unwrap_or_else(epoch_millis),
                    value: value / self.wire_scale,
                    envelope: env.map(|e| e / self.wire_scale),
                };
                self.push(sample);
                self.stats.count(1);
            }
            InboundMessage::Batch { meta, v, e, t } => {
                self.apply_meta(meta);
                if view.paused || v.is_empty() {
                    return;
                }
                let start = t.unwrap_or_else(epoch_millis);
                let period_ms = 1000.0 / self.descriptor.sample_rate_hz as f64;
                let count = v.len() as u64;
                for (i, value) in v.into_iter().enumerate() {
                    let sample = Sample {
                        timestamp_ms: start.saturating_add((i as f64 * period_ms).round() as u64),
                        value: value / self.wire_scale,
                        envelope: e.get(i).map(|env| env / self.wire_scale),
                    };
                    self.push(sample);
                }
                self.stats.count(count);
            }
        }
    }
    /// Resizes the window when the view's horizontal zoom changed.
    pub fn sync_view(&mut self, view: &ViewParameters) {
        if view.horizontal_zoom_percent != self.view.horizontal_zoom_percent {
            self.view = *view;
            self.buffer.resize_window(self.descriptor, &self.view);
        } else {
            self.view = *view;
        }
    }
    /// User reset: empties buffer, export log and counters. Metadata survives.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.stats = StreamStats::new();
    }
    /// Marks the start of a viewing session for the elapsed-time readout.
    pub fn start_viewing(&mut self, now: Instant) {
        self.reset();
        self.stats.viewing_since = Some(now);
    }
    fn push(&mut self, sample: Sample) {
        let signal = self.signal_label.as_deref().unwrap_or("--");
        let condition = self.condition.as_deref().unwrap_or("--");
        self.buffer.append_logged(sample, signal, condition);
    }
    fn apply_meta(&mut self, meta: StreamMeta) {
        if let Some(label) = meta.signal {
            if self.signal_label.as_deref() != Some(label.as_str()) {
                self.change_signal(label);
            }
        }
        if let Some(condition) = meta.condition {
            self.condition = Some(condition);
        }
        if let Some(state) = meta.state {
            self.device_state = Some(state);
        }
    }
    fn change_signal(&mut self, label: String) {
        let (descriptor, fallback) = signal::resolve_descriptor(Some(label.as_str()));
        if fallback {
            log::warn!(
                "unknown signal kind {label:?}; using {} scale",
                descriptor.kind.label()
            );
        } else {
            log::info!("signal changed to {label}");
        }
        self.buffer.reset();
        self.descriptor = descriptor;
        self.buffer.resize_window(descriptor, &self.view);
        self.signal_label = Some(label);
    }
}
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::protocol::decode_frame;
    use crate::drivers::signal::SignalKind;
    fn feed(dispatcher: &mut StreamDispatcher, frame: &str) {
        let msg = decode_frame(frame).unwrap().unwrap();
        dispatcher.dispatch(msg, &ViewParameters::default());
    }
    fn values(dispatcher: &StreamDispatcher) -> Vec<f64> {
        dispatcher.buffer().primary().iter().copied().collect()
    }
    #[test]
    fn data_frames_fill_a_small_window() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        feed(&mut dispatcher, r#"{"type":"state","signal":"ECG"}"#);
        dispatcher.buffer.set_window_size(2);
        for v in ["0.1", "0.2", "-0.1"] {
            feed(&mut dispatcher, &format!(r#"{{"type":"data","v":{v}}}"#));
        }
        assert_eq!(values(&dispatcher), vec![0.2, -0.1]);
        assert_eq!(dispatcher.stats().total_points, 3);
    }
    #[test]
    fn batch_appends_every_value_and_only_nonzero_envelopes() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        feed(&mut dispatcher, r#"{"type":"batch","v":[1,2,3],"e":[0,0,0.5],"t":1000}"#);
        assert_eq!(values(&dispatcher), vec![1.0, 2.0, 3.0]);
        assert_eq!(dispatcher.buffer().envelope().len(), 1);
        let stamps: Vec<u64> = dispatcher
            .buffer()
            .export_log()
            .iter()
            .map(|r| r.sample.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![1000, 1005, 1010]);
    }
    #[test]
    fn batch_timestamps_saturate_near_the_end_of_time() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        feed(
            &mut dispatcher,
            r#"{"type":"batch","v":[1,2,3],"t":18446744073709551615}"#,
        );
        assert_eq!(values(&dispatcher), vec![1.0, 2.0, 3.0]);
        assert!(dispatcher
            .buffer()
            .export_log()
            .iter()
            .all(|r| r.sample.timestamp_ms == u64::MAX));
    }
    #[test]
    fn signal_change_clears_history_before_new_samples() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        feed(&mut dispatcher, r#"{"type":"data","signal":"ECG","v":0.5}"#);
        feed(&mut dispatcher, r#"{"type":"data","signal":"ECG","v":0.6}"#);
        assert_eq!(dispatcher.buffer().len(), 2);
        feed(&mut dispatcher, r#"{"type":"state","signal":"EMG"}"#);
        assert_eq!(dispatcher.buffer().len(), 0);
        assert!(dispatcher.buffer().export_log().is_empty());
        assert_eq!(dispatcher.descriptor().kind, SignalKind::Emg);
        assert_eq!(dispatcher.buffer().window_size(), 700);
        feed(&mut dispatcher, r#"{"type":"data","signal":"EMG","v":1.5,"env":0.2}"#);
        assert_eq!(values(&dispatcher), vec![1.5]);
        assert_eq!(dispatcher.buffer().export_log()[0].signal, "EMG");
    }
    #[test]
    fn unknown_signal_uses_ecg_scale_but_still_resets() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        feed(&mut dispatcher, r#"{"type":"data","signal":"ECG","v":0.5}"#);
        feed(&mut dispatcher, r#"{"type":"data","signal":"XYZ","v":0.7}"#);
        assert_eq!(dispatcher.descriptor().kind, SignalKind::Ecg);
        assert_eq!(dispatcher.signal_label(), Some("XYZ"));
        assert_eq!(values(&dispatcher), vec![0.7]);
    }
    #[test]
    fn metrics_replace_previous_snapshot() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        feed(&mut dispatcher, r#"{"type":"metrics","m":{"hr":70,"rr":850}}"#);
        feed(&mut dispatcher, r#"{"type":"metrics","m":{"hr":72}}"#);
        let metrics = dispatcher.metrics().unwrap();
        assert_eq!(metrics.fields.len(), 1);
        assert_eq!(metrics.fields["hr"], MetricValue::Number(72.0));
    }
    #[test]
    fn paused_view_keeps_metadata_but_not_samples() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        let paused = ViewParameters {
            paused: true,
            ..ViewParameters::default()
        };
        let msg = decode_frame(
            r#"{"type":"data","signal":"PPG","condition":"NORMAL","state":"RUNNING","v":80}"#,
        )
        .unwrap()
        .unwrap();
        dispatcher.dispatch(msg, &paused);
        assert!(dispatcher.buffer().is_empty());
        assert_eq!(dispatcher.condition(), Some("NORMAL"));
        assert_eq!(dispatcher.device_state(), Some("RUNNING"));
        assert_eq!(dispatcher.descriptor().kind, SignalKind::Ppg);
    }
    #[test]
    fn wire_scale_divides_inbound_values() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 100.0);
        feed(&mut dispatcher, r#"{"type":"data","v":25,"env":50}"#);
        let record = &dispatcher.buffer().export_log()[0];
        assert_eq!(record.sample.value, 0.25);
        assert_eq!(record.sample.envelope, Some(0.5));
    }
    #[test]
    fn horizontal_zoom_resizes_the_window() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        let mut view = ViewParameters::default();
        view.set_horizontal_zoom(200);
        dispatcher.sync_view(&view);
        assert_eq!(dispatcher.buffer().window_size(), 350);
    }
    #[test]
    fn stats_roll_once_per_second() {
        let mut dispatcher = StreamDispatcher::new(1000, 1.5, 1.0);
        let t0 = Instant::now();
        dispatcher.start_viewing(t0);
        dispatcher.stats_mut().roll(t0);
        feed(&mut dispatcher, r#"{"type":"batch","v":[1,2,3,4]}"#);
        dispatcher.stats_mut().roll(t0 + Duration::from_millis(500));
        assert_eq!(dispatcher.stats().points_per_second, 0);
        dispatcher.stats_mut().roll(t0 + Duration::from_secs(1));
        assert_eq!(dispatcher.stats().points_per_second, 4);
        assert_eq!(dispatcher.stats().elapsed(t0 + Duration::from_secs(2)), Duration::from_secs(2));
    }
}
