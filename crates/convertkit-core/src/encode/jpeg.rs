//! JPEG encoding at a caller-chosen quality.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{check_buffer, EncodeError};
use crate::decode::{PixelLayout, RasterImage};

/// Encode an opaque RGB image to JPEG bytes.
///
/// `quality` is clamped to 1-100. JPEG has no alpha channel, so images
/// with [`PixelLayout::Rgba8`] are rejected; callers convert them with
/// [`RasterImage::to_opaque`] first.
///
/// # Errors
///
/// * `EncodeError::UnsupportedLayout` for RGBA input
/// * `EncodeError::InvalidDimensions` / `InvalidPixelData` for a malformed buffer
/// * `EncodeError::EncodingFailed` if the codec itself fails
pub fn encode_jpeg(image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if image.layout != PixelLayout::Rgb8 {
        return Err(EncodeError::UnsupportedLayout {
            format: "JPEG",
            layout: image.layout,
        });
    }
    check_buffer(image)?;

    let quality = quality.clamp(1, 100);
    let mut buffer = Cursor::new(Vec::new());

    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(&image.pixels, image.width, image.height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any well-formed RGB buffer encodes at any quality byte.
        #[test]
        fn prop_valid_buffer_always_encodes(
            width in 1u32..=40,
            height in 1u32..=40,
            quality in any::<u8>(),
            fill in any::<u8>(),
        ) {
            let img = RasterImage::new(
                width,
                height,
                PixelLayout::Rgb8,
                vec![fill; (width * height * 3) as usize],
            ).unwrap();

            let jpeg = encode_jpeg(&img, quality);
            prop_assert!(jpeg.is_ok());
            prop_assert_eq!(&jpeg.unwrap()[0..2], &[0xFF, 0xD8]);
        }

        /// Property: encoding is deterministic for identical input.
        #[test]
        fn prop_deterministic(
            width in 1u32..=24,
            height in 1u32..=24,
            quality in 1u8..=100,
        ) {
            let pixels = (0..(width * height * 3) as usize).map(|i| (i * 31 % 256) as u8).collect();
            let img = RasterImage::new(width, height, PixelLayout::Rgb8, pixels).unwrap();

            prop_assert_eq!(encode_jpeg(&img, quality).unwrap(), encode_jpeg(&img, quality).unwrap());
        }
    }
}
