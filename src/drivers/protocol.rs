use std::collections::BTreeMap;
use serde::Deserialize;
use serde_json::Value;
use crate::drivers::ScopeError;
/// Text frame sent as the liveness probe. The device answers with `{"type":"pong"}`.
pub const PROBE: &str = "ping";
/// Metadata fields shared by `data`, `batch` and `state` frames.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StreamMeta {
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}
/// A metric value: devices send either numbers or preformatted text.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}
impl MetricValue {
    pub fn format(&self, decimals: Option<usize>) -> String {
        match (self, decimals) {
            (MetricValue::Number(v), _) if !v.is_finite() => "--".to_owned(),
            (MetricValue::Number(v), Some(d)) => format!("{v:.d$}"),
            (MetricValue::Number(v), None) => format!("{v}"),
            (MetricValue::Text(s), _) if s.is_empty() => "--".to_owned(),
            (MetricValue::Text(s), _) => s.clone(),
        }
    }
}
/// Decoded inbound frame, discriminated by its `type` field.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Welcome {
        #[serde(default)]
        message: Option<String>,
        #[serde(default, rename = "clientId")]
        client_id: Option<u64>,
    },
    Data {
        #[serde(flatten)]
        meta: StreamMeta,
        #[serde(default, alias = "value")]
        v: Option<f64>,
        #[serde(default)]
        env: Option<f64>,
        #[serde(default)]
        t: Option<u64>,
    },
    Batch {
        #[serde(flatten)]
        meta: StreamMeta,
        #[serde(default)]
        v: Vec<f64>,
        #[serde(default)]
        e: Vec<f64>,
        #[serde(default)]
        t: Option<u64>,
    },
    Metrics {
        #[serde(default)]
        m: Option<BTreeMap<String, MetricValue>>,
    },
    State {
        #[serde(flatten)]
        meta: StreamMeta,
    },
    Pong,
}
const KNOWN_TYPES: &[&str] = &["welcome", "data", "batch", "metrics", "state", "pong"];
/// Decodes one text frame.
///
/// `Ok(None)` means the frame was well formed but carried a `type` this
/// client does not handle; such frames are ignored, not errors.
pub fn decode_frame(text: &str) -> Result<Option<InboundMessage>, ScopeError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ScopeError::MissingType)?;
    if !KNOWN_TYPES.contains(&kind) {
        return Ok(None);
    }
    let message = serde_json::from_value(value)?;
    Ok(Some(message))
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn decodes_data_frame_with_metadata() {
        let msg = decode_frame(
            r#"{"type":"data","signal":"ECG","condition":"NORMAL","state":"RUNNING","v":0.25,"t":1200}"#,
        )
        .unwrap()
        .unwrap();
        match msg {
            InboundMessage::Data { meta, v, env, t } => {
                assert_eq!(meta.signal.as_deref(), Some("ECG"));
                assert_eq!(meta.condition.as_deref(), Some("NORMAL"));
                assert_eq!(v, Some(0.25));
                assert_eq!(env, None);
                assert_eq!(t, Some(1200));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    #[test]
    fn zero_envelope_is_present_not_absent() {
        let msg = decode_frame(r#"{"type":"data","v":1.0,"env":0}"#).unwrap().unwrap();
        assert!(matches!(msg, InboundMessage::Data { env: Some(e), .. } if e == 0.0));
    }
    #[test]
    fn decodes_batch_and_metrics() {
        let batch = decode_frame(r#"{"type":"batch","signal":"EMG","v":[1,2,3],"e":[0,0,0.5]}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(batch, InboundMessage::Batch { ref v, ref e, .. } if v.len() == 3 && e.len() == 3));
        let metrics = decode_frame(r#"{"type":"metrics","m":{"hr":72,"pr":"160"}}"#)
            .unwrap()
            .unwrap();
        match metrics {
            InboundMessage::Metrics { m: Some(m) } => {
                assert_eq!(m["hr"], MetricValue::Number(72.0));
                assert_eq!(m["pr"], MetricValue::Text("160".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    #[test]
    fn pong_and_welcome_decode() {
        assert_eq!(decode_frame(r#"{"type":"pong"}"#).unwrap(), Some(InboundMessage::Pong));
        let welcome = decode_frame(r#"{"type":"welcome","message":"hi","clientId":3}"#).unwrap();
        assert!(matches!(welcome, Some(InboundMessage::Welcome { client_id: Some(3), .. })));
    }
    #[test]
    fn unknown_type_is_ignored_and_garbage_is_an_error() {
        assert_eq!(decode_frame(r#"{"type":"telemetry","x":1}"#).unwrap(), None);
        assert!(matches!(decode_frame("not json"), Err(ScopeError::Decode(_))));
        assert!(matches!(decode_frame(r#"{"v":1}"#), Err(ScopeError::MissingType)));
        assert!(matches!(
            decode_frame(r#"{"type":"data","v":"high"}"#),
            Err(ScopeError::Decode(_))
        ));
    }
    #[test]
    fn metric_values_format_with_precision() {
        assert_eq!(MetricValue::Number(1.234).format(Some(2)), "1.23");
        assert_eq!(MetricValue::Number(72.0).format(None), "72");
        assert_eq!(MetricValue::Text(String::new()).format(None), "--");
    }
}
