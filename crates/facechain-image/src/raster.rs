//! Decoding, orientation correction and cropping.
//!
//! All pixel work runs on tokio's blocking pool.

use std::io::Cursor;
use std::sync::Arc;

use facechain_core::{Face, Image, Orientation};
use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::error::ImageError;

pub(crate) async fn blocking<T, F>(task: F) -> Result<T, ImageError>
where
    F: FnOnce() -> Result<T, ImageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ImageError::Task(e.to_string()))?
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImageError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(image::ImageError::IoError(e)))
}

/// Decode raw bytes into a raster. The format is sniffed from the content.
pub async fn decode_image(bytes: Arc<[u8]>) -> Result<Arc<DynamicImage>, ImageError> {
    blocking(move || {
        let raster = reader(&bytes)?.decode()?;
        tracing::debug!(
            width = raster.width(),
            height = raster.height(),
            "decoded image"
        );
        Ok(Arc::new(raster))
    })
    .await
}

/// Read the embedded EXIF orientation, `Normal` when none is present.
pub fn orientation_from_bytes(bytes: &[u8]) -> Result<Orientation, ImageError> {
    let mut decoder = reader(bytes)?.into_decoder()?;
    let orientation = match decoder.orientation() {
        Ok(tag) => Orientation::from_exif(tag.to_exif()).unwrap_or_default(),
        Err(err) => {
            tracing::warn!(error = %err, "unreadable orientation metadata; assuming normal");
            Orientation::Normal
        }
    };
    Ok(orientation)
}

pub(crate) async fn read_orientation(bytes: Arc<[u8]>) -> Result<Orientation, ImageError> {
    blocking(move || orientation_from_bytes(&bytes)).await
}

/// Undo `orientation` so the raster is upright.
///
/// `Normal` returns the input raster itself without copying.
pub async fn normalize(
    raster: Arc<DynamicImage>,
    orientation: Orientation,
) -> Result<Image, ImageError> {
    if orientation == Orientation::Normal {
        return Ok(Image::new(raster, orientation));
    }
    blocking(move || {
        let upright = apply_orientation(&raster, orientation);
        tracing::debug!(?orientation, "orientation corrected");
        Ok(Image::new(Arc::new(upright), orientation))
    })
    .await
}

fn apply_orientation(raster: &DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => raster.clone(),
        Orientation::FlipHorizontal => raster.fliph(),
        Orientation::Rotate180 => raster.rotate180(),
        Orientation::FlipVertical => raster.flipv(),
        // Mirror across the main diagonal.
        Orientation::Transpose => raster.rotate90().fliph(),
        Orientation::Rotate90 => raster.rotate90(),
        // Mirror across the anti-diagonal.
        Orientation::Transverse => raster.rotate270().fliph(),
        Orientation::Rotate270 => raster.rotate270(),
    }
}

/// Crop an upright image to a face's bounds, clamped to the image.
pub async fn crop_to_face(image: &Image, face: &Face) -> Result<Arc<DynamicImage>, ImageError> {
    let raster = Arc::clone(image.raster());
    let bounds = face.bounds;
    blocking(move || {
        let (width, height) = (raster.width() as f32, raster.height() as f32);
        let left = bounds.x.round().clamp(0.0, width);
        let top = bounds.y.round().clamp(0.0, height);
        let right = bounds.right().round().clamp(0.0, width);
        let bottom = bounds.bottom().round().clamp(0.0, height);
        if right <= left || bottom <= top {
            return Err(ImageError::OutOfBounds(bounds));
        }
        let cropped = raster.crop_imm(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        Ok(Arc::new(cropped))
    })
    .await
}
