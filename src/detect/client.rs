use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{DetectionResult, Detector, ENDPOINT, UPLOAD_FIELD};
use crate::encode::EncodedImage;
use crate::error::DetectError;

/// Multipart POST client for the detection server
#[derive(Clone)]
pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDetector {
    pub fn new() -> Self {
        Self::with_endpoint(ENDPOINT)
    }

    pub(crate) fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl Default for HttpDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for HttpDetector {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, bytes = image.bytes.len()))]
    async fn detect(&self, image: EncodedImage) -> Result<DetectionResult, DetectError> {
        let started = Instant::now();

        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.filename)
            .mime_str(&image.mime)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        // Status is not inspected, any JSON body is a verdict
        debug!(status = %response.status(), "server responded");
        let body: Value = response.json().await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Server response: {}",
            body
        );

        DetectionResult::from_json(body)
    }
}
