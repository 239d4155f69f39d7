pub mod alert;
pub mod capture;
pub mod detect;
pub mod encode;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod sink;
pub mod surface;
pub mod utils;

use std::path::{Path, PathBuf};

use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pipeline::OverlapPolicy;
use crate::utils::FoundDevice;

pub use capture::{Frame, FrameFeed, FrameSource};
pub use pipeline::Pipeline;

/// Width of the frame the detection server reports boxes in
pub const REFERENCE_WIDTH: f64 = 640.0;
/// Height of the frame the detection server reports boxes in
pub const REFERENCE_HEIGHT: f64 = 480.0;

/// Environment variable prefix, e.g. `FALLWATCH__PIPELINE__CAPTURE_INTERVAL_MS=500`
pub const ENV_PREFIX: &str = "FALLWATCH";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub canvas: CanvasConfig,
    pub pipeline: PipelineConfig,
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    V4l2,
    Pattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    /// Empty path means auto-detect
    pub device: FoundDevice,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub capture_interval_ms: u64,
    pub overlap: OverlapPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub player: String,
    pub sound_path: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::V4l2,
            device: FoundDevice::new("/dev/video0".into(), PixelFormat::Mjpeg),
            width: 640,
            height: 480,
            fps: 30,
            buffer_count: 4,
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: REFERENCE_WIDTH as u32,
            height: REFERENCE_HEIGHT as u32,
            // canvas.toDataURL default quality
            jpeg_quality: 92,
            snapshot_path: None,
            snapshot_interval_ms: 1000,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: 1000,
            overlap: OverlapPolicy::Race,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            player: "aplay".into(),
            sound_path: PathBuf::from("alert.wav"),
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `FALLWATCH__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.capture_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.capture_interval_ms must be positive".into(),
            ));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid("canvas size must be non-zero".into()));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::Invalid("capture size must be non-zero".into()));
        }
        if !(1..=100).contains(&self.canvas.jpeg_quality) {
            return Err(ConfigError::Invalid(
                "canvas.jpeg_quality must be within 1..=100".into(),
            ));
        }
        Ok(())
    }
}
