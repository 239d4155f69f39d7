//! Data URL serialization of captured frames

use base64::{prelude::BASE64_STANDARD, Engine};
use bytes::Bytes;

use crate::error::EncodeError;

pub const JPEG_MIME: &str = "image/jpeg";

/// One captured frame ready for upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub mime: String,
    pub filename: String,
}

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes))
}

/// Split a `data:<mime>;base64,<payload>` URL back into a named file buffer
pub fn data_url_to_file(data_url: &str, filename: &str) -> Result<EncodedImage, EncodeError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| EncodeError::MalformedDataUrl("missing ',' separator".into()))?;

    let mime = header
        .split_once(':')
        .and_then(|(_, rest)| rest.split_once(';'))
        .map(|(mime, _)| mime)
        .ok_or_else(|| EncodeError::MalformedDataUrl(format!("no mime type in '{}'", header)))?;

    let bytes = BASE64_STANDARD.decode(payload)?;

    Ok(EncodedImage {
        bytes: Bytes::from(bytes),
        mime: mime.to_string(),
        filename: filename.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Canvas, Surface};
    use image::{Rgb, RgbImage};

    #[test]
    fn solid_frame_round_trips_as_jpeg() {
        let mut canvas = Canvas::new(64, 48, 92);
        canvas.draw_frame(&RgbImage::from_pixel(64, 48, Rgb([0, 128, 0])));
        let jpeg = canvas.encode_jpeg().unwrap();

        let url = to_data_url(&jpeg, JPEG_MIME);
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let file = data_url_to_file(&url, "captured-image.jpeg").unwrap();
        assert_eq!(file.mime, JPEG_MIME);
        assert_eq!(file.filename, "captured-image.jpeg");
        assert_eq!(&file.bytes[..], &jpeg[..]);
        assert_eq!(
            image::guess_format(&file.bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn url_without_comma_is_rejected() {
        let err = data_url_to_file("data:image/jpeg;base64", "x.jpeg").unwrap_err();
        assert!(matches!(err, EncodeError::MalformedDataUrl(_)));
    }

    #[test]
    fn url_without_mime_is_rejected() {
        let err = data_url_to_file("garbage,AAAA", "x.jpeg").unwrap_err();
        assert!(matches!(err, EncodeError::MalformedDataUrl(_)));
    }

    #[test]
    fn bad_base64_is_rejected() {
        let err = data_url_to_file("data:image/jpeg;base64,@@@", "x.jpeg").unwrap_err();
        assert!(matches!(err, EncodeError::Base64(_)));
    }
}
