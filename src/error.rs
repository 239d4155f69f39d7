use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("malformed data url: {0}")]
    MalformedDataUrl(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum OverlayError {
    #[error("detection has no bounding_box array")]
    MissingBoundingBox,
    #[error("bounding_box has {0} elements, expected 4")]
    WrongArity(usize),
    #[error("bounding_box element {0} is not a number")]
    NotNumeric(usize),
    #[error("bounding box {0:?} normalizes outside [0, 1]")]
    OutOfRange([f64; 4]),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("drawing surface lock poisoned")]
    SurfacePoisoned,
}
