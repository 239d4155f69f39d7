//! Status line shown to the user

use serde_json::Value;
use tracing::warn;

pub const NO_DETECTION: &str = "No detection found.";
pub const SEND_FAILED: &str = "Error sending image to server.";

pub fn detected_message(class_name: &str, confidence: Option<&Value>) -> String {
    format!(
        "Detected: {} (Confidence: {}%)",
        class_name,
        display_value(confidence)
    )
}

/// Render a JSON value the way string interpolation in the web client did
fn display_value(value: Option<&Value>) -> String {
    match value {
        None => "undefined".into(),
        Some(Value::Null) => "null".into(),
        Some(Value::String(s)) => s.clone(),
        // 90.0 prints as "90"
        Some(Value::Number(n)) => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => display_value(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".into(),
    }
}

pub trait TextSink: Send + Sync {
    /// Replace the displayed text
    fn set_text(&self, text: &str);
}

/// Forwards every update over a channel
pub struct ChannelText {
    tx: flume::Sender<String>,
}

impl ChannelText {
    pub fn new() -> (Self, flume::Receiver<String>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl TextSink for ChannelText {
    fn set_text(&self, text: &str) {
        if self.tx.send(text.to_string()).is_err() {
            warn!("Result text dropped, no listener: {}", text);
        }
    }
}
