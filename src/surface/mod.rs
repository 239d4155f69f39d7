//! Drawing surfaces the pipeline renders onto

pub mod canvas;

pub use canvas::Canvas;

use image::{Rgb, RgbImage};

use crate::error::EncodeError;

/// Rectangle in surface pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Stroke colours used for detection boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeColor {
    Yellow,
    Blue,
    Red,
    Purple,
    Orange,
    Black,
}

impl StrokeColor {
    /// CSS named colour values
    pub fn rgb(self) -> Rgb<u8> {
        match self {
            StrokeColor::Yellow => Rgb([255, 255, 0]),
            StrokeColor::Blue => Rgb([0, 0, 255]),
            StrokeColor::Red => Rgb([255, 0, 0]),
            StrokeColor::Purple => Rgb([128, 0, 128]),
            StrokeColor::Orange => Rgb([255, 165, 0]),
            StrokeColor::Black => Rgb([0, 0, 0]),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StrokeColor::Yellow => "yellow",
            StrokeColor::Blue => "blue",
            StrokeColor::Red => "red",
            StrokeColor::Purple => "purple",
            StrokeColor::Orange => "orange",
            StrokeColor::Black => "black",
        }
    }
}

pub trait Surface: Send {
    /// Actual pixel size of the surface
    fn dimensions(&self) -> (u32, u32);

    /// Paint a video frame over the whole surface, scaling as needed
    fn draw_frame(&mut self, frame: &RgbImage);

    /// Outline a rectangle. Nothing is filled or cleared.
    fn stroke_rect(&mut self, rect: Rect, color: StrokeColor, line_width: f64);

    /// Serialize the current contents as JPEG
    fn encode_jpeg(&self) -> Result<Vec<u8>, EncodeError>;
}
