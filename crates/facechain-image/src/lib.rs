//! facechain-image — Image acquisition for the face pipeline.
//!
//! Resolves local or remote image sources to bytes, decodes them, reads the
//! embedded EXIF orientation and produces upright [`Image`]s.
//!
//! [`Image`]: facechain_core::Image

pub mod error;
pub mod raster;
pub mod source;

#[cfg(test)]
mod testing;

pub use error::ImageError;
pub use raster::{crop_to_face, decode_image, normalize, orientation_from_bytes};
pub use source::{ImageLoader, ImageSource};
