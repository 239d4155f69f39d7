//! V4L2 webcam capture over memory-mapped buffers

use std::time::Duration;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info, instrument};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::FrameSource;
use crate::{
    capture::frame::{Frame, FrameMetadata, PixelFormat},
    CaptureConfig,
};

pub struct V4l2Capture {
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    sequence: u64,
    // Keeps the device handle open for the lifetime of the stream
    _device: Device,
}

impl V4l2Capture {
    /// Open the device, negotiate a format and start streaming.
    ///
    /// Any failure here means the camera is absent or access was refused.
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        info!("Initializing V4L2 capture: {:?}", config.device);

        let device = Device::with_path(&config.device.path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("Device doesn't support video capture"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = fourcc(config.device.format);
        let fmt = device.set_format(&fmt)?;

        // Drivers may silently pick another mode
        let format = match &fmt.fourcc.repr {
            b"MJPG" => PixelFormat::Mjpeg,
            b"YUYV" => PixelFormat::Yuyv4,
            b"RGB3" => PixelFormat::Rgb24,
            b"BGR3" => PixelFormat::Bgr24,
            _ => return Err(eyre!("Driver negotiated unsupported format {}", fmt.fourcc)),
        };
        if fmt.width != config.width || fmt.height != config.height {
            info!(
                "Driver adjusted resolution to {}x{}",
                fmt.width, fmt.height
            );
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, config.buffer_count)?;
        info!(
            "Capture stream started with {} buffers",
            config.buffer_count
        );

        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            stride: fmt.stride,
            format,
            sequence: 0,
            _device: device,
        })
    }
}

fn fourcc(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
        PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
        PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        PixelFormat::Bgr24 => FourCC::new(b"BGR3"),
    }
}

impl FrameSource for V4l2Capture {
    #[instrument(skip(self), fields(sequence = self.sequence))]
    fn next_frame(&mut self) -> Result<Frame> {
        let (buf, meta) = self.stream.next()?;

        // MJPEG buffers are padded, bytesused is the real payload
        let used = (meta.bytesused as usize).min(buf.len());
        let used = if used == 0 { buf.len() } else { used };
        let data = Bytes::copy_from_slice(&buf[..used]);

        self.sequence += 1;
        debug!(bytes = used, "dequeued frame");

        Ok(Frame::new(
            data,
            FrameMetadata {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
                stride: self.stride,
                format: self.format,
                device_timestamp: Some(
                    Duration::from_secs(meta.timestamp.sec as u64)
                        + Duration::from_micros(meta.timestamp.usec as u64),
                ),
            },
        ))
    }
}
