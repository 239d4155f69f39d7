pub mod decoder;
pub mod feed;
pub mod frame;
pub mod pattern;
pub mod v4l2;

use color_eyre::Result;
use tracing::info;

pub use feed::{FrameFeed, LiveFrame};
pub use frame::Frame;
pub use frame::PixelFormat;
pub use pattern::PatternSource;
pub use v4l2::V4l2Capture;

use crate::{utils, CaptureConfig, SourceKind};

/// Anything that can hand out camera frames. Calls may block.
pub trait FrameSource: Send + 'static {
    fn next_frame(&mut self) -> Result<Frame>;
}

/// Open the configured camera. An error here is the "no camera / access denied" path.
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource>> {
    match config.source {
        SourceKind::V4l2 => {
            let mut config = config.clone();
            if config.device.path.is_empty() {
                config.device = utils::auto_detect_device()?;
            }
            info!("Using capture device: {:?}", config.device);
            Ok(Box::new(V4l2Capture::open(&config)?))
        }
        SourceKind::Pattern => {
            info!("Using synthetic pattern source");
            Ok(Box::new(PatternSource::new(
                config.width,
                config.height,
                config.fps,
                [96, 128, 160],
            )))
        }
    }
}
