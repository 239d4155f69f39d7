//! Capture -> upload -> render loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use color_eyre::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use crate::alert::{is_alert_class, AlertSink};
use crate::capture::FrameFeed;
use crate::detect::{DetectionResult, Detector, UPLOAD_FILENAME};
use crate::encode::{data_url_to_file, to_data_url, EncodedImage, JPEG_MIME};
use crate::error::{DetectError, PipelineError};
use crate::overlay;
use crate::sink::{detected_message, TextSink, NO_DETECTION, SEND_FAILED};
use crate::surface::Surface;

pub type SharedSurface = Arc<Mutex<dyn Surface>>;

/// What to do when an upload outlives the capture interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Every response is applied in completion order; the last to resolve wins
    #[default]
    Race,
    /// Responses older than the newest one already applied are dropped
    LatestWins,
}

/// The whole detection loop, wired to its output handles once at startup
#[derive(Clone)]
pub struct Pipeline {
    surface: SharedSurface,
    text: Arc<dyn TextSink>,
    alert: Arc<dyn AlertSink>,
    detector: Arc<dyn Detector>,
    overlap: OverlapPolicy,
    issued: Arc<AtomicU64>,
    applied: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn new(
        surface: SharedSurface,
        text: Arc<dyn TextSink>,
        alert: Arc<dyn AlertSink>,
        detector: Arc<dyn Detector>,
    ) -> Self {
        Self {
            surface,
            text,
            alert,
            detector,
            overlap: OverlapPolicy::default(),
            issued: Arc::new(AtomicU64::new(0)),
            applied: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Draw the frame onto the surface and serialize it for upload
    fn capture(&self, frame: &RgbImage) -> Result<EncodedImage, PipelineError> {
        let jpeg = {
            let mut surface = self
                .surface
                .lock()
                .map_err(|_| PipelineError::SurfacePoisoned)?;
            surface.draw_frame(frame);
            surface.encode_jpeg()?
        };
        let data_url = to_data_url(&jpeg, JPEG_MIME);
        Ok(data_url_to_file(&data_url, UPLOAD_FILENAME)?)
    }

    /// One timer tick: draw + encode now, upload in the background.
    ///
    /// Returns the upload task, or `None` when the frame could not be encoded.
    /// Nothing prevents several uploads from being in flight at once.
    pub fn on_tick(&self, frame: &RgbImage) -> Option<JoinHandle<()>> {
        let image = match self.capture(frame) {
            Ok(image) => image,
            Err(e) => {
                error!("Capture step failed: {}", e);
                return None;
            }
        };

        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let pipeline = self.clone();
        Some(tokio::spawn(async move {
            let started = Instant::now();
            metrics::counter!("fallwatch_uploads_total").increment(1);
            let outcome = pipeline.detector.detect(image).await;
            metrics::histogram!("fallwatch_upload_latency_ms")
                .record(started.elapsed().as_secs_f64() * 1000.0);
            pipeline.on_result(seq, outcome);
        }))
    }

    /// Apply the server's answer for upload number `seq`
    #[instrument(skip(self, outcome))]
    pub fn on_result(&self, seq: u64, outcome: Result<DetectionResult, DetectError>) {
        if self.overlap == OverlapPolicy::LatestWins {
            let newest = self.applied.fetch_max(seq, Ordering::SeqCst);
            if newest > seq {
                debug!(newest, "Discarding stale response");
                return;
            }
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                metrics::counter!("fallwatch_upload_failures_total").increment(1);
                error!("Error: {}", e);
                self.text.set_text(SEND_FAILED);
                return;
            }
        };

        let Some(detection) = result.first() else {
            self.text.set_text(NO_DETECTION);
            return;
        };

        self.text.set_text(&detected_message(
            &detection.class_name,
            detection.confidence.as_ref(),
        ));

        if is_alert_class(&detection.class_name) {
            self.alert.play();
        }

        match self.surface.lock() {
            Ok(mut surface) => overlay::render(detection, &mut *surface),
            Err(_) => error!("{}", PipelineError::SurfacePoisoned),
        }
    }

    /// Tick forever once the feed has a frame. Uploads are never awaited.
    pub async fn run(&self, mut feed: FrameFeed, interval: Duration) -> Result<()> {
        feed.ready().await?;
        info!("Starting capture every {:?}", interval);

        // First tick one full interval after start, like setInterval
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            ticker.tick().await;
            if let Some(frame) = feed.latest() {
                let age = frame.age();
                metrics::histogram!("fallwatch_frame_age_ms").record(age.as_secs_f64() * 1000.0);
                debug!(sequence = frame.sequence, age_ms = age.as_millis() as u64, "tick");
                self.on_tick(&frame.image);
            }
        }
    }
}
