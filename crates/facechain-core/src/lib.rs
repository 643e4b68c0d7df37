//! facechain-core — Face data model and the engine capability boundary.
//!
//! The detection/recognition engine itself is a closed, synchronous
//! component. This crate only names what the pipeline needs from it
//! ([`FaceEngine`], [`EngineFactory`]) and the values that flow between
//! pipeline stages.

pub mod engine;
pub mod types;

pub use engine::{Component, EngineError, EngineFactory, EngineOptions, FaceEngine};
pub use types::{
    Bearing, BoundingBox, Embedding, EulerAngle, Face, Image, Orientation, ParseBearingError,
    RecognizableFace,
};
