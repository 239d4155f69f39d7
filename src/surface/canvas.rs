use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::instrument;

use super::{Rect, StrokeColor, Surface};
use crate::error::EncodeError;

/// In-memory RGB canvas
#[derive(Clone)]
pub struct Canvas {
    image: RgbImage,
    jpeg_quality: u8,
}

impl Canvas {
    pub fn new(width: u32, height: u32, jpeg_quality: u8) -> Self {
        Self {
            image: RgbImage::new(width, height),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Write the canvas to disk, format picked from the extension
    pub fn save(&self, path: &Path) -> Result<(), EncodeError> {
        self.image.save(path)?;
        Ok(())
    }
}

impl Surface for Canvas {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[instrument(skip_all)]
    fn draw_frame(&mut self, frame: &RgbImage) {
        if frame.dimensions() == self.image.dimensions() {
            self.image.copy_from_slice(frame.as_raw());
        } else {
            let (w, h) = self.image.dimensions();
            self.image = imageops::resize(frame, w, h, FilterType::Triangle);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: StrokeColor, line_width: f64) {
        let (w, h) = self.image.dimensions();
        let half = line_width / 2.0;

        // The stroke straddles the path: half inside, half outside
        let outer = (
            rect.x - half,
            rect.y - half,
            rect.x + rect.width + half,
            rect.y + rect.height + half,
        );
        let inner = (
            rect.x + half,
            rect.y + half,
            rect.x + rect.width - half,
            rect.y + rect.height - half,
        );

        let x0 = outer.0.floor().max(0.0) as u32;
        let y0 = outer.1.floor().max(0.0) as u32;
        let x1 = (outer.2.ceil().max(0.0) as u32).min(w);
        let y1 = (outer.3.ceil().max(0.0) as u32).min(h);
        let rgb = color.rgb();

        for y in y0..y1 {
            let cy = y as f64 + 0.5;
            if cy < outer.1 || cy > outer.3 {
                continue;
            }
            for x in x0..x1 {
                let cx = x as f64 + 0.5;
                if cx < outer.0 || cx > outer.2 {
                    continue;
                }
                let inside = cx > inner.0 && cx < inner.2 && cy > inner.1 && cy < inner.3;
                if !inside {
                    self.image.put_pixel(x, y, rgb);
                }
            }
        }
    }

    fn encode_jpeg(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality).encode_image(&self.image)?;
        Ok(buf.into_inner())
    }
}
