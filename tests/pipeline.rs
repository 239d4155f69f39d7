use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};

use fallwatch::alert::AlertSink;
use fallwatch::capture::{FrameFeed, PatternSource};
use fallwatch::detect::{DetectionResult, Detector};
use fallwatch::encode::EncodedImage;
use fallwatch::error::{DetectError, EncodeError};
use fallwatch::pipeline::OverlapPolicy;
use fallwatch::sink::ChannelText;
use fallwatch::surface::{Canvas, Rect, StrokeColor, Surface};
use fallwatch::Pipeline;

#[derive(Default)]
struct RecordingSurface {
    size: (u32, u32),
    frames_drawn: usize,
    strokes: Vec<(Rect, StrokeColor, f64)>,
    inner: Option<Canvas>,
}

impl RecordingSurface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            inner: Some(Canvas::new(width, height, 92)),
            ..Default::default()
        }
    }
}

impl Surface for RecordingSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }
    fn draw_frame(&mut self, frame: &RgbImage) {
        self.frames_drawn += 1;
        if let Some(canvas) = self.inner.as_mut() {
            canvas.draw_frame(frame);
        }
    }
    fn stroke_rect(&mut self, rect: Rect, color: StrokeColor, line_width: f64) {
        self.strokes.push((rect, color, line_width));
    }
    fn encode_jpeg(&self) -> Result<Vec<u8>, EncodeError> {
        match &self.inner {
            Some(canvas) => canvas.encode_jpeg(),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
struct CountingAlert(AtomicUsize);

impl AlertSink for CountingAlert {
    fn play(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

type Script = dyn Fn(usize) -> (Duration, Result<Value, ()>) + Send + Sync;

/// Answers each call from a script keyed by call number (0-based)
struct ScriptedDetector {
    calls: AtomicUsize,
    uploads: Mutex<Vec<EncodedImage>>,
    script: Box<Script>,
}

impl ScriptedDetector {
    fn new(script: impl Fn(usize) -> (Duration, Result<Value, ()>) + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    fn always(body: Value) -> Self {
        Self::new(move |_| (Duration::ZERO, Ok(body.clone())))
    }

    fn failing() -> Self {
        Self::new(|_| (Duration::ZERO, Err(())))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, image: EncodedImage) -> Result<DetectionResult, DetectError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().push(image);
        let (delay, outcome) = (self.script)(n);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            Ok(body) => DetectionResult::from_json(body),
            Err(()) => Err(DetectError::Json(
                serde_json::from_str::<Value>("connection reset").unwrap_err(),
            )),
        }
    }
}

struct Harness {
    pipeline: Pipeline,
    surface: Arc<Mutex<RecordingSurface>>,
    alert: Arc<CountingAlert>,
    detector: Arc<ScriptedDetector>,
    text: flume::Receiver<String>,
}

impl Harness {
    fn new(detector: ScriptedDetector) -> Self {
        Self::with_surface(detector, RecordingSurface::new(640, 480))
    }

    fn with_surface(detector: ScriptedDetector, surface: RecordingSurface) -> Self {
        let surface = Arc::new(Mutex::new(surface));
        let alert = Arc::new(CountingAlert::default());
        let detector = Arc::new(detector);
        let (sink, text) = ChannelText::new();
        let pipeline = Pipeline::new(
            surface.clone(),
            Arc::new(sink),
            alert.clone(),
            detector.clone(),
        );
        Self {
            pipeline,
            surface,
            alert,
            detector,
            text,
        }
    }

    fn texts(&self) -> Vec<String> {
        self.text.try_iter().collect()
    }

    fn strokes(&self) -> Vec<(Rect, StrokeColor, f64)> {
        self.surface.lock().unwrap().strokes.clone()
    }

    fn alerts(&self) -> usize {
        self.alert.0.load(Ordering::SeqCst)
    }
}

fn frame() -> RgbImage {
    RgbImage::from_pixel(320, 240, Rgb([40, 80, 120]))
}

fn one(class: &str, confidence: f64, bbox: Value) -> Value {
    json!({ "detections": [ { "class_name": class, "confidence": confidence, "bounding_box": bbox } ] })
}

#[tokio::test]
async fn detection_sets_text_and_strokes_box() {
    let h = Harness::with_surface(
        ScriptedDetector::always(one("person-fall", 87.5, json!([64, 48, 320, 240]))),
        RecordingSurface::new(1280, 960),
    );

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    assert_eq!(h.texts(), vec!["Detected: person-fall (Confidence: 87.5%)"]);
    assert_eq!(
        h.strokes(),
        vec![(
            Rect {
                x: 128.0,
                y: 96.0,
                width: 640.0,
                height: 480.0
            },
            StrokeColor::Blue,
            3.0
        )]
    );
    assert_eq!(h.alerts(), 0);
    assert_eq!(h.surface.lock().unwrap().frames_drawn, 1);
}

#[tokio::test]
async fn upload_is_a_named_jpeg() {
    let h = Harness::new(ScriptedDetector::always(json!({ "detections": [] })));
    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    let uploads = h.detector.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].mime, "image/jpeg");
    assert_eq!(uploads[0].filename, "captured-image.jpeg");
    let decoded = image::load_from_memory(&uploads[0].bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (640, 480));
}

#[tokio::test]
async fn near_fall_in_any_case_plays_alert_once() {
    let h = Harness::new(ScriptedDetector::always(one(
        "PERSON-NEAR-FALL",
        99.0,
        json!([10, 10, 100, 100]),
    )));

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    assert_eq!(h.alerts(), 1);
    assert_eq!(h.texts(), vec!["Detected: PERSON-NEAR-FALL (Confidence: 99%)"]);
    assert_eq!(h.strokes()[0].1, StrokeColor::Red);
}

#[tokio::test]
async fn string_confidence_still_alerts_and_draws() {
    let h = Harness::new(ScriptedDetector::always(json!({
        "detections": [
            { "class_name": "person-near-fall", "confidence": "97.3", "bounding_box": [0, 0, 10, 10] }
        ]
    })));

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    assert_eq!(h.texts(), vec!["Detected: person-near-fall (Confidence: 97.3%)"]);
    assert_eq!(h.alerts(), 1);
    assert_eq!(h.strokes().len(), 1);
    assert_eq!(h.strokes()[0].1, StrokeColor::Red);
}

#[tokio::test]
async fn missing_confidence_is_shown_as_undefined() {
    let h = Harness::new(ScriptedDetector::always(json!({
        "detections": [ { "class_name": "person-fall", "bounding_box": [0, 0, 10, 10] } ]
    })));

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    assert_eq!(h.texts(), vec!["Detected: person-fall (Confidence: undefined%)"]);
    assert_eq!(h.strokes().len(), 1);
}

#[tokio::test]
async fn every_qualifying_detection_alerts() {
    let h = Harness::new(ScriptedDetector::always(one(
        "person-near-fall",
        70.0,
        json!([1, 1, 1, 1]),
    )));
    for _ in 0..3 {
        h.pipeline.on_tick(&frame()).unwrap().await.unwrap();
    }
    assert_eq!(h.alerts(), 3);
}

#[tokio::test]
async fn empty_detections_draw_nothing() {
    let h = Harness::new(ScriptedDetector::always(json!({ "detections": [] })));

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    assert_eq!(h.texts(), vec!["No detection found."]);
    assert!(h.strokes().is_empty());
    assert_eq!(h.alerts(), 0);
}

#[tokio::test]
async fn body_without_detections_means_nothing_found() {
    let h = Harness::new(ScriptedDetector::always(json!({ "status": "ok" })));
    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();
    assert_eq!(h.texts(), vec!["No detection found."]);
}

#[tokio::test]
async fn failure_shows_error_and_next_tick_still_uploads() {
    let h = Harness::new(ScriptedDetector::failing());

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();
    assert_eq!(h.texts(), vec!["Error sending image to server."]);

    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();
    assert_eq!(h.detector.calls(), 2);
    assert_eq!(h.texts(), vec!["Error sending image to server."]);
    assert!(h.strokes().is_empty());
}

#[tokio::test]
async fn malformed_box_keeps_text_but_skips_drawing() {
    for bbox in [json!([1, 2, 3]), json!([700, 0, 10, 10]), json!(null)] {
        let h = Harness::new(ScriptedDetector::always(one("person-out", 50.0, bbox)));
        h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

        assert_eq!(h.texts(), vec!["Detected: person-out (Confidence: 50%)"]);
        assert!(h.strokes().is_empty());
    }
}

#[tokio::test]
async fn unknown_class_is_black() {
    let h = Harness::new(ScriptedDetector::always(one(
        "unknown-class",
        10.0,
        json!([0, 0, 64, 48]),
    )));
    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();
    assert_eq!(h.strokes()[0].1, StrokeColor::Black);
}

#[tokio::test]
async fn only_first_detection_is_used() {
    let h = Harness::new(ScriptedDetector::always(json!({
        "detections": [
            { "class_name": "person-in-bed", "confidence": 60, "bounding_box": [0, 0, 10, 10] },
            { "class_name": "person-near-fall", "confidence": 99, "bounding_box": [0, 0, 20, 20] }
        ]
    })));
    h.pipeline.on_tick(&frame()).unwrap().await.unwrap();

    assert_eq!(h.texts(), vec!["Detected: person-in-bed (Confidence: 60%)"]);
    assert_eq!(h.strokes().len(), 1);
    assert_eq!(h.alerts(), 0);
}

/// First upload is slow, second is fast: the slow one resolves last
fn slow_then_fast() -> ScriptedDetector {
    ScriptedDetector::new(|n| match n {
        0 => (Duration::from_millis(500), Ok(one("person-in-bed", 1.0, json!([0, 0, 1, 1])))),
        _ => (Duration::from_millis(10), Ok(one("person-out", 2.0, json!([0, 0, 1, 1])))),
    })
}

#[tokio::test(start_paused = true)]
async fn overlapping_uploads_race_last_resolved_wins() {
    let h = Harness::new(slow_then_fast());

    let first = h.pipeline.on_tick(&frame()).unwrap();
    let second = h.pipeline.on_tick(&frame()).unwrap();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(
        h.texts(),
        vec![
            "Detected: person-out (Confidence: 2%)",
            "Detected: person-in-bed (Confidence: 1%)",
        ]
    );
    assert_eq!(h.strokes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn latest_wins_discards_stale_responses() {
    let mut h = Harness::new(slow_then_fast());
    h.pipeline = h.pipeline.clone().with_overlap(OverlapPolicy::LatestWins);

    let first = h.pipeline.on_tick(&frame()).unwrap();
    let second = h.pipeline.on_tick(&frame()).unwrap();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(h.texts(), vec!["Detected: person-out (Confidence: 2%)"]);
    assert_eq!(h.strokes().len(), 1);
}

#[tokio::test]
async fn timer_keeps_ticking_through_failures() {
    let h = Harness::new(ScriptedDetector::failing());
    let feed = FrameFeed::spawn(Box::new(PatternSource::new(32, 24, 100, [1, 2, 3]))).unwrap();

    let pipeline = h.pipeline.clone();
    let runner = tokio::spawn(async move { pipeline.run(feed, Duration::from_millis(20)).await });

    let detector = h.detector.clone();
    tokio::time::timeout(Duration::from_secs(10), async move {
        while detector.calls() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timer stopped firing");
    runner.abort();

    let texts = h.texts();
    assert!(texts.len() >= 2);
    assert!(texts.iter().all(|t| t == "Error sending image to server."));
}
