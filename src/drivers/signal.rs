/// Signal families the device can stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Ecg,
    Emg,
    Ppg,
}
impl SignalKind {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "ECG" => Some(SignalKind::Ecg),
            "EMG" => Some(SignalKind::Emg),
            "PPG" => Some(SignalKind::Ppg),
            _ => None,
        }
    }
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Ecg => "ECG",
            SignalKind::Emg => "EMG",
            SignalKind::Ppg => "PPG",
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}
impl DisplayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
    pub fn mid(&self) -> f64 {
        (self.max + self.min) / 2.0
    }
}
/// Static scale and timing facts for one signal kind.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalDescriptor {
    pub kind: SignalKind,
    pub sample_rate_hz: u32,
    pub display_range: DisplayRange,
    pub division_value: f64,
    pub unit: &'static str,
    pub window_seconds: f64,
    /// Range of the secondary trace; `None` when the kind has no envelope.
    pub envelope_range: Option<DisplayRange>,
}
impl SignalDescriptor {
    pub fn tracks_envelope(&self) -> bool {
        self.envelope_range.is_some()
    }
    /// `"0.25 mV/div | 350 ms/div"` for the given grid column count.
    pub fn scale_caption(&self, grid_x: u32) -> String {
        let ms_per_div = self.window_seconds / grid_x.max(1) as f64 * 1000.0;
        format!(
            "{} {}/div | {:.0} ms/div",
            self.division_value, self.unit, ms_per_div
        )
    }
    pub fn axis_labels(&self) -> AxisLabels {
        let r = self.display_range;
        AxisLabels {
            y_max: format!("+{:.1}", r.max),
            y_mid: format!("{:.1}", r.mid()),
            y_min: format!("{:.1}", r.min),
            x_mid: format!("{:.1}s", self.window_seconds / 2.0),
            x_max: format!("{:.1}s", self.window_seconds),
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct AxisLabels {
    pub y_max: String,
    pub y_mid: String,
    pub y_min: String,
    pub x_mid: String,
    pub x_max: String,
}
static ECG: SignalDescriptor = SignalDescriptor {
    kind: SignalKind::Ecg,
    sample_rate_hz: 200,
    display_range: DisplayRange::new(-0.5, 1.5),
    division_value: 0.25,
    unit: "mV",
    window_seconds: 3.5,
    envelope_range: None,
};
static EMG: SignalDescriptor = SignalDescriptor {
    kind: SignalKind::Emg,
    sample_rate_hz: 100,
    display_range: DisplayRange::new(-5.0, 5.0),
    division_value: 1.25,
    unit: "mV",
    window_seconds: 7.0,
    envelope_range: Some(DisplayRange::new(0.0, 2.5)),
};
static PPG: SignalDescriptor = SignalDescriptor {
    kind: SignalKind::Ppg,
    sample_rate_hz: 100,
    display_range: DisplayRange::new(0.0, 150.0),
    division_value: 15.0,
    unit: "mV",
    window_seconds: 7.0,
    envelope_range: None,
};
pub fn descriptor(kind: SignalKind) -> &'static SignalDescriptor {
    match kind {
        SignalKind::Ecg => &ECG,
        SignalKind::Emg => &EMG,
        SignalKind::Ppg => &PPG,
    }
}
/// Descriptor used before the device reports a kind and for any label we do not know.
pub fn default_descriptor() -> &'static SignalDescriptor {
    &ECG
}
/// Resolves a reported signal label. Unknown labels fall back to the ECG
/// descriptor instead of failing; the flag tells the caller a fallback happened.
pub fn resolve_descriptor(label: Option<&str>) -> (&'static SignalDescriptor, bool) {
    match label {
        None => (default_descriptor(), false),
        Some(label) => match SignalKind::parse(label) {
            Some(kind) => (descriptor(kind), false),
            None => (default_descriptor(), true),
        },
    }
}
/// One metric the UI shows for a signal kind.
#[derive(Clone, Copy, Debug)]
pub struct MetricField {
    pub key: &'static str,
    pub label: &'static str,
    /// `None` prints the value as received.
    pub decimals: Option<usize>,
}
const fn field(key: &'static str, label: &'static str, decimals: Option<usize>) -> MetricField {
    MetricField {
        key,
        label,
        decimals,
    }
}
const ECG_FIELDS: &[MetricField] = &[
    field("hr", "HR (bpm)", None),
    field("rr", "RR (ms)", None),
    field("qrs", "QRS (ms)", Some(2)),
    field("st", "ST (mV)", Some(2)),
    field("hrv", "HRV (%)", Some(1)),
    field("pr", "PR (ms)", None),
    field("qtc", "QTc (ms)", None),
    field("p", "P (mV)", Some(2)),
    field("r", "R (mV)", Some(2)),
    field("t", "T (mV)", Some(2)),
];
const EMG_FIELDS: &[MetricField] = &[
    field("rms", "RMS (mV)", Some(2)),
    field("exc", "Excitation (%)", None),
    field("mus", "Active MUs", None),
    field("freq", "MDF (Hz)", None),
    field("mvc", "MVC (%)", None),
    field("raw", "Raw (mV)", Some(2)),
];
const PPG_FIELDS: &[MetricField] = &[
    field("hr", "HR (bpm)", None),
    field("rr", "RR (ms)", None),
    field("pi", "PI (%)", Some(1)),
    field("ac", "AC (mV)", Some(1)),
    field("sys", "Systolic", None),
    field("dia", "Diastolic", None),
];
pub fn metric_fields(kind: SignalKind) -> &'static [MetricField] {
    match kind {
        SignalKind::Ecg => ECG_FIELDS,
        SignalKind::Emg => EMG_FIELDS,
        SignalKind::Ppg => PPG_FIELDS,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn known_labels_resolve_case_insensitively() {
        let (d, fallback) = resolve_descriptor(Some("emg"));
        assert_eq!(d.kind, SignalKind::Emg);
        assert!(!fallback);
        assert!(d.tracks_envelope());
    }
    #[test]
    fn unknown_label_falls_back_to_ecg() {
        let (d, fallback) = resolve_descriptor(Some("EEG"));
        assert_eq!(d.kind, SignalKind::Ecg);
        assert!(fallback);
        let (d, fallback) = resolve_descriptor(None);
        assert_eq!(d.kind, SignalKind::Ecg);
        assert!(!fallback);
    }
    #[test]
    fn envelope_range_is_independent_of_raw_range() {
        let emg = descriptor(SignalKind::Emg);
        assert_ne!(emg.envelope_range, Some(emg.display_range));
        assert!(descriptor(SignalKind::Ppg).envelope_range.is_none());
    }
    #[test]
    fn captions_follow_descriptor() {
        let ecg = descriptor(SignalKind::Ecg);
        assert_eq!(ecg.scale_caption(10), "0.25 mV/div | 350 ms/div");
        let labels = ecg.axis_labels();
        assert_eq!(labels.y_max, "+1.5");
        assert_eq!(labels.y_mid, "0.5");
        assert_eq!(labels.x_max, "3.5s");
    }
}
