use std::time::{Duration, Instant};

use bytes::Bytes;
use color_eyre::Result;

use super::frame::{Frame, FrameMetadata, PixelFormat};
use super::FrameSource;

/// Synthetic camera producing solid-colour RGB frames at a fixed rate
pub struct PatternSource {
    width: u32,
    height: u32,
    color: [u8; 3],
    period: Duration,
    sequence: u64,
    last: Option<Instant>,
}

impl PatternSource {
    pub fn new(width: u32, height: u32, fps: u32, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            color,
            period: Duration::from_secs(1) / fps.max(1),
            sequence: 0,
            last: None,
        }
    }
}

impl FrameSource for PatternSource {
    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
        }
        self.last = Some(Instant::now());
        self.sequence += 1;

        let pixels = (self.width * self.height) as usize;
        let data: Vec<u8> = self.color.iter().copied().cycle().take(pixels * 3).collect();

        Ok(Frame::new(
            Bytes::from(data),
            FrameMetadata {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
                stride: self.width * 3,
                format: PixelFormat::Rgb24,
                device_timestamp: None,
            },
        ))
    }
}
