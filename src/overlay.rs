//! Detection box overlay

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::detect::Detection;
use crate::error::OverlayError;
use crate::surface::{Rect, StrokeColor, Surface};
use crate::{REFERENCE_HEIGHT, REFERENCE_WIDTH};

pub const LINE_WIDTH: f64 = 3.0;

/// Box with every component divided by the reference frame size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub fn bounding_box(detection: &Detection) -> Result<[f64; 4], OverlayError> {
    let Some(Value::Array(values)) = &detection.bounding_box else {
        return Err(OverlayError::MissingBoundingBox);
    };
    if values.len() != 4 {
        return Err(OverlayError::WrongArity(values.len()));
    }
    let mut out = [0.0; 4];
    for (i, v) in values.iter().enumerate() {
        out[i] = v.as_f64().ok_or(OverlayError::NotNumeric(i))?;
    }
    Ok(out)
}

pub fn normalize(bbox: [f64; 4]) -> Result<NormalizedBox, OverlayError> {
    let norm = NormalizedBox {
        x: bbox[0] / REFERENCE_WIDTH,
        y: bbox[1] / REFERENCE_HEIGHT,
        width: bbox[2] / REFERENCE_WIDTH,
        height: bbox[3] / REFERENCE_HEIGHT,
    };
    let in_range = [norm.x, norm.y, norm.width, norm.height]
        .iter()
        .all(|v| (0.0..=1.0).contains(v));
    if !in_range {
        return Err(OverlayError::OutOfRange(bbox));
    }
    Ok(norm)
}

/// Stroke colour for a class label, compared case-insensitively
pub fn color_for(class_name: &str) -> StrokeColor {
    match class_name.to_lowercase().as_str() {
        "person-in-bed" => StrokeColor::Yellow,
        "person-fall" => StrokeColor::Blue,
        "person-near-fall" => StrokeColor::Red,
        "person-moving-out" => StrokeColor::Purple,
        "person-out" => StrokeColor::Orange,
        other => {
            warn!(class = other, "Unknown class, stroking in black");
            StrokeColor::Black
        }
    }
}

pub fn to_surface(norm: NormalizedBox, (width, height): (u32, u32)) -> Rect {
    Rect {
        x: norm.x * width as f64,
        y: norm.y * height as f64,
        width: norm.width * width as f64,
        height: norm.height * height as f64,
    }
}

/// Validate, map and stroke one detection; returns what was drawn
pub fn try_render(
    detection: &Detection,
    surface: &mut dyn Surface,
) -> Result<(Rect, StrokeColor), OverlayError> {
    let norm = normalize(bounding_box(detection)?)?;
    debug!(
        "Drawing normalized rectangle at ({}, {}) size ({}x{})",
        norm.x, norm.y, norm.width, norm.height
    );

    let rect = to_surface(norm, surface.dimensions());
    let color = color_for(&detection.class_name);
    debug!(class = %detection.class_name, color = color.name(), "stroke");

    surface.stroke_rect(rect, color, LINE_WIDTH);
    Ok((rect, color))
}

/// Like `try_render`, but failures are logged and leave the surface untouched
pub fn render(detection: &Detection, surface: &mut dyn Surface) {
    if let Err(e) = try_render(detection, surface) {
        metrics::counter!("fallwatch_overlay_rejected_total").increment(1);
        error!(?detection, "Invalid detection: {}", e);
    }
}
