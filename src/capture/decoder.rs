use color_eyre::{eyre::eyre, Result};
use image::RgbImage;
use jpeg_decoder::Decoder;

use super::frame::{Frame, PixelFormat};

/// Turn a raw capture into an RGB image the canvas can draw
pub fn decode_frame(frame: &Frame) -> Result<RgbImage> {
    let meta = &frame.meta;
    let data = &frame.data[..];

    match meta.format {
        PixelFormat::Mjpeg => decode_mjpeg(data),
        PixelFormat::Rgb24 => {
            let rgb = packed_rows(data, meta.width, meta.height, meta.stride, 3)?;
            into_image(meta.width, meta.height, rgb)
        }
        PixelFormat::Bgr24 => {
            let mut rgb = packed_rows(data, meta.width, meta.height, meta.stride, 3)?;
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            into_image(meta.width, meta.height, rgb)
        }
        PixelFormat::Yuyv4 => {
            let yuyv = packed_rows(data, meta.width, meta.height, meta.stride, 2)?;
            into_image(meta.width, meta.height, yuyv_to_rgb(&yuyv))
        }
    }
}

fn decode_mjpeg(data: &[u8]) -> Result<RgbImage> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| eyre!("JPEG header missing after decode"))?;
    let (width, height) = (info.width as u32, info.height as u32);

    let rgb = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => pixels,
        jpeg_decoder::PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        other => return Err(eyre!("Unsupported JPEG pixel format: {:?}", other)),
    };
    into_image(width, height, rgb)
}

/// Strip row padding so rows are exactly `width * bpp` bytes
fn packed_rows(data: &[u8], width: u32, height: u32, stride: u32, bpp: u32) -> Result<Vec<u8>> {
    let row = (width * bpp) as usize;
    let stride = (stride as usize).max(row);
    let needed = stride * (height as usize).saturating_sub(1) + row;
    if height == 0 || data.len() < needed {
        return Err(eyre!(
            "Frame too short: {} bytes for {}x{} (stride {})",
            data.len(),
            width,
            height,
            stride
        ));
    }
    if stride == row {
        return Ok(data[..row * height as usize].to_vec());
    }
    Ok(data
        .chunks(stride)
        .take(height as usize)
        .flat_map(|line| &line[..row])
        .copied()
        .collect())
}

// BT.601 limited range
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);
    for chunk in yuyv.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_pixel(y0, u, v));
        rgb.extend_from_slice(&yuv_pixel(y1, u, v));
    }
    rgb
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

fn into_image(width: u32, height: u32, rgb: Vec<u8>) -> Result<RgbImage> {
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| eyre!("Decoded buffer does not match {}x{}", width, height))
}
