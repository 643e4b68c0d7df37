use facechain_core::EngineError;
use facechain_image::ImageError;
use thiserror::Error;

use crate::session::SessionFailure;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("connectivity error: {0}")]
    Connectivity(String),
    #[error("engine failure: {0}")]
    EngineFailure(#[from] EngineError),
    #[error("could not build recognizable representation of face")]
    ConversionFailure,
    #[error("invalid result envelope: {0}")]
    InvalidEnvelope(String),
    #[error(transparent)]
    EmbeddedFailure(SessionFailure),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Decode(source) => Self::Decode(source),
            ImageError::NotFound { .. }
            | ImageError::InvalidSource(_)
            | ImageError::OutOfBounds(_) => Self::NotFound(err.to_string()),
            ImageError::Connectivity { .. } | ImageError::Client(_) => {
                Self::Connectivity(err.to_string())
            }
            ImageError::Task(message) => {
                Self::EngineFailure(EngineError::new(format!("image task failed: {message}")))
            }
        }
    }
}
