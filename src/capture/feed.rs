//! Background capture thread publishing the most recent decodable frame

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::{eyre::eyre, Result};
use image::RgbImage;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::decoder::decode_frame;
use super::FrameSource;

/// Decoded frame plus when it came off the camera
#[derive(Debug)]
pub struct LiveFrame {
    pub image: RgbImage,
    pub sequence: u64,
    pub captured_at: Instant,
}

impl LiveFrame {
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

pub type LatestFrame = Option<Arc<LiveFrame>>;

/// Live view of the camera, the native counterpart of a playing `<video>`
pub struct FrameFeed {
    rx: watch::Receiver<LatestFrame>,
    _worker: thread::JoinHandle<()>,
}

impl FrameFeed {
    pub fn spawn(source: Box<dyn FrameSource>) -> Result<Self> {
        let (tx, rx) = watch::channel(None);
        let worker = thread::Builder::new()
            .name("fallwatch-capture".into())
            .spawn(move || capture_loop(source, tx))?;
        Ok(Self {
            rx,
            _worker: worker,
        })
    }

    /// Resolves once the stream has produced its first decodable frame
    pub async fn ready(&mut self) -> Result<()> {
        self.rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| eyre!("capture thread exited before the first frame"))?;
        Ok(())
    }

    pub fn latest(&self) -> LatestFrame {
        self.rx.borrow().clone()
    }
}

fn capture_loop(mut source: Box<dyn FrameSource>, tx: watch::Sender<LatestFrame>) {
    let mut first = true;
    while !tx.is_closed() {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Capture error: {:#}", e);
                thread::sleep(Duration::from_millis(10));
                continue;
            }
        };
        match decode_frame(&frame) {
            Ok(image) => {
                if first {
                    info!(
                        "First frame decoded ({}x{})",
                        image.width(),
                        image.height()
                    );
                    first = false;
                }
                debug!(
                    sequence = frame.meta.sequence,
                    device_ts = ?frame.meta.device_timestamp,
                    decode_us = frame.timestamp.elapsed().as_micros() as u64,
                    "frame decoded"
                );
                tx.send_replace(Some(Arc::new(LiveFrame {
                    image,
                    sequence: frame.meta.sequence,
                    captured_at: frame.timestamp,
                })));
            }
            Err(e) => warn!(sequence = frame.meta.sequence, "Dropping undecodable frame: {:#}", e),
        }
    }
    info!("Capture thread stopped");
}
