//! Encoded image fixtures.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

/// JPEG with an APP1 Exif segment carrying only the Orientation tag.
pub fn jpeg_with_orientation(width: u32, height: u32, exif_orientation: u16) -> Vec<u8> {
    let jpeg = encoded(width, height, ImageFormat::Jpeg);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");
    // Little-endian TIFF header, first IFD at offset 8.
    payload.extend_from_slice(b"II*\0");
    payload.extend_from_slice(&8u32.to_le_bytes());
    // One entry: tag 0x0112 (Orientation), type SHORT, count 1.
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&0x0112u16.to_le_bytes());
    payload.extend_from_slice(&3u16.to_le_bytes());
    payload.extend_from_slice(&1u32.to_le_bytes());
    payload.extend_from_slice(&exif_orientation.to_le_bytes());
    payload.extend_from_slice(&[0, 0]);
    // No next IFD.
    payload.extend_from_slice(&0u32.to_le_bytes());

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
