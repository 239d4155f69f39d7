//! Remote detection endpoint and its response model

pub mod client;

pub use client::HttpDetector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encode::EncodedImage;
use crate::error::DetectError;

/// Hardcoded inference endpoint
pub const ENDPOINT: &str = "http://172.206.2.48/process-image";
/// Multipart field carrying the frame
pub const UPLOAD_FIELD: &str = "image";
pub const UPLOAD_FILENAME: &str = "captured-image.jpeg";

/// One object reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// Percentage, 0-100. Shown as sent, so any JSON value is accepted.
    #[serde(default)]
    pub confidence: Option<Value>,
    /// `[x, y, w, h]` in the 640x480 reference frame; validated by the overlay
    #[serde(default)]
    pub bounding_box: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    /// Interpret a response body.
    ///
    /// Anything without a non-empty `detections` array is "no detection".
    /// Only the first entry is consumed, so only it has to be well formed.
    pub fn from_json(value: Value) -> Result<Self, DetectError> {
        let Some(Value::Array(entries)) = value.get("detections") else {
            return Ok(Self::default());
        };
        let mut entries = entries.iter();
        let Some(first) = entries.next() else {
            return Ok(Self::default());
        };

        let mut detections = vec![Detection::deserialize(first)?];
        detections.extend(entries.filter_map(|e| Detection::deserialize(e).ok()));
        Ok(Self { detections })
    }

    pub fn first(&self) -> Option<&Detection> {
        self.detections.first()
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Upload one frame and wait for the server's verdict
    async fn detect(&self, image: EncodedImage) -> Result<DetectionResult, DetectError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_first_detection() {
        let result = DetectionResult::from_json(json!({
            "detections": [
                { "class_name": "person-fall", "confidence": 87.5, "bounding_box": [10, 20, 30, 40] },
                { "class_name": "person-out", "confidence": 12 }
            ]
        }))
        .unwrap();
        let first = result.first().unwrap();
        assert_eq!(first.class_name, "person-fall");
        assert_eq!(first.confidence, Some(json!(87.5)));
        assert_eq!(first.bounding_box, Some(json!([10, 20, 30, 40])));
        assert_eq!(result.detections.len(), 2);
    }

    #[test]
    fn missing_or_empty_detections_mean_nothing_found() {
        for body in [
            json!({}),
            json!({ "detections": [] }),
            json!({ "detections": null }),
            json!({ "error": "model busy" }),
            json!([1, 2, 3]),
        ] {
            assert!(DetectionResult::from_json(body).unwrap().first().is_none());
        }
    }

    #[test]
    fn malformed_first_entry_is_a_parse_failure() {
        let body = json!({ "detections": [ { "confidence": 50 } ] });
        assert!(matches!(
            DetectionResult::from_json(body),
            Err(DetectError::Json(_))
        ));
    }

    #[test]
    fn confidence_is_optional_and_untyped() {
        let body = json!({
            "detections": [ { "class_name": "person-near-fall", "confidence": "97.3" } ]
        });
        let first = DetectionResult::from_json(body).unwrap().detections.remove(0);
        assert_eq!(first.confidence, Some(json!("97.3")));

        let body = json!({ "detections": [ { "class_name": "person-out" } ] });
        let first = DetectionResult::from_json(body).unwrap().detections.remove(0);
        assert_eq!(first.confidence, None);
    }

    #[test]
    fn malformed_trailing_entries_are_ignored() {
        let body = json!({
            "detections": [
                { "class_name": "person-out", "confidence": 99 },
                "not an object"
            ]
        });
        let result = DetectionResult::from_json(body).unwrap();
        assert_eq!(result.detections.len(), 1);
        assert!(result.first().unwrap().bounding_box.is_none());
    }
}
