use std::path::PathBuf;

use facechain_core::BoundingBox;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image source not readable: {path}: {source}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid image source '{0}'")]
    InvalidSource(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("request to {url} failed: {message}")]
    Connectivity { url: String, message: String },
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("face bounds {0:?} do not overlap the image")]
    OutOfBounds(BoundingBox),
    #[error("image task failed: {0}")]
    Task(String),
}
