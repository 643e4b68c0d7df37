//! facechain — asynchronous face pipeline in front of a blocking engine.
//!
//! An [`InstanceCache`] maps each [`Configuration`] to one [`Orchestrator`],
//! which builds its engine lazily (once) and exposes detection, recognition,
//! identification and authentication as futures and [`FaceStream`]s.

pub mod cache;
pub mod config;
pub mod configuration;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod stages;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use cache::InstanceCache;
pub use config::Settings;
pub use configuration::{Configuration, ConfigurationBuilder};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::Orchestrator;
pub use session::{
    extract_attachments, parse_result, Attachment, CapturedFace, Envelope, SessionFailure,
    SessionResult, RESULT_KEY,
};
pub use stages::{FaceStream, Identification};
pub use subscription::Subscriptions;

pub use facechain_core::{
    Bearing, Component, EngineError, EngineFactory, EngineOptions, Face, FaceEngine, Image,
    Orientation, RecognizableFace,
};
pub use facechain_image::{ImageLoader, ImageSource};
