use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Bounding box of a detected face, in pixels of the upright image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Head pose in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngle {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// A detected face region. Carries no identity data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub bounds: BoundingBox,
    #[serde(default)]
    pub angle: EulerAngle,
    /// Detection quality as reported by the engine.
    #[serde(default)]
    pub quality: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl Face {
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            angle: EulerAngle::default(),
            quality: 0.0,
            landmarks: None,
        }
    }
}

/// Opaque feature template produced by the engine's conversion step.
///
/// The pipeline never inspects the values; only the engine compares them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Engine model version that produced this template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// A face augmented with a template usable for comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizableFace {
    #[serde(flatten)]
    pub face: Face,
    pub embedding: Embedding,
}

/// The eight canonical EXIF orientation states.
///
/// Discriminants are the EXIF tag values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90 = 6,
    Transverse = 7,
    Rotate270 = 8,
}

impl Orientation {
    pub fn from_exif(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Normal,
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => return None,
        })
    }

    pub fn exif_value(self) -> u8 {
        self as u8
    }

    /// True when correcting this orientation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }
}

/// An orientation-normalized raster.
///
/// `corrected` records which EXIF orientation was undone to produce the
/// upright raster; the raster itself is always upright.
#[derive(Debug, Clone)]
pub struct Image {
    raster: Arc<DynamicImage>,
    corrected: Orientation,
}

impl Image {
    pub fn new(raster: Arc<DynamicImage>, corrected: Orientation) -> Self {
        Self { raster, corrected }
    }

    /// Wrap a raster that is already upright.
    pub fn upright(raster: DynamicImage) -> Self {
        Self::new(Arc::new(raster), Orientation::Normal)
    }

    pub fn raster(&self) -> &Arc<DynamicImage> {
        &self.raster
    }

    pub fn corrected(&self) -> Orientation {
        self.corrected
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }
}

/// Discrete head-pose label attached to a captured face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bearing {
    #[default]
    Straight,
    Left,
    Right,
    Up,
    Down,
    LeftUp,
    RightUp,
    LeftDown,
    RightDown,
}

impl Bearing {
    pub const ALL: [Bearing; 9] = [
        Self::Straight,
        Self::Left,
        Self::Right,
        Self::Up,
        Self::Down,
        Self::LeftUp,
        Self::RightUp,
        Self::LeftDown,
        Self::RightDown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
            Self::LeftUp => "left_up",
            Self::RightUp => "right_up",
            Self::LeftDown => "left_down",
            Self::RightDown => "right_down",
        }
    }
}

impl fmt::Display for Bearing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown bearing '{0}'")]
pub struct ParseBearingError(String);

impl FromStr for Bearing {
    type Err = ParseBearingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == normalized)
            .ok_or_else(|| ParseBearingError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_exif_values_roundtrip() {
        for value in 1..=8u8 {
            let orientation = Orientation::from_exif(value).unwrap();
            assert_eq!(orientation.exif_value(), value);
        }
        assert_eq!(Orientation::from_exif(0), None);
        assert_eq!(Orientation::from_exif(9), None);
    }

    #[test]
    fn test_orientation_swaps_dimensions() {
        assert!(!Orientation::Normal.swaps_dimensions());
        assert!(!Orientation::Rotate180.swaps_dimensions());
        assert!(Orientation::Rotate90.swaps_dimensions());
        assert!(Orientation::Transverse.swaps_dimensions());
    }

    #[test]
    fn test_bearing_parse() {
        assert_eq!("left_up".parse::<Bearing>().unwrap(), Bearing::LeftUp);
        assert_eq!("Right-Down".parse::<Bearing>().unwrap(), Bearing::RightDown);
        assert!("sideways".parse::<Bearing>().is_err());
    }

    #[test]
    fn test_recognizable_face_json_is_flat() {
        let face = RecognizableFace {
            face: Face::new(BoundingBox { x: 1.0, y: 2.0, width: 3.0, height: 4.0 }),
            embedding: Embedding { values: vec![0.5], model_version: None },
        };
        let json = serde_json::to_value(&face).unwrap();
        assert!(json.get("bounds").is_some());
        assert!(json.get("embedding").is_some());
        let back: RecognizableFace = serde_json::from_value(json).unwrap();
        assert_eq!(back, face);
    }

    #[test]
    fn test_image_upright_dimensions() {
        let image = Image::upright(DynamicImage::new_rgb8(4, 3));
        assert_eq!((image.width(), image.height()), (4, 3));
        assert_eq!(image.corrected(), Orientation::Normal);
    }
}
