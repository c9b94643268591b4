//! Upload bytes to [`RasterImage`] decoding.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use super::{DecodeError, RasterImage};

/// Sniff the container format from the leading magic bytes.
///
/// Returns `None` when the bytes match no format the `image` crate knows.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Decode an uploaded image into 8-bit pixels.
///
/// Images whose colour type carries alpha (RGBA, LA, or palettes with a
/// transparency chunk, which the `image` crate expands to RGBA) decode as
/// [`PixelLayout::Rgba8`](super::PixelLayout::Rgba8). Everything else,
/// including grayscale and 16-bit sources, is normalised to 8-bit RGB.
///
/// EXIF orientation is not applied; output dimensions match the stored
/// pixel grid.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the format cannot be sniffed.
/// Returns `DecodeError::CorruptedFile` if the decoder rejects the data.
pub fn decode_image(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    let format = sniff_format(bytes).ok_or(DecodeError::InvalidFormat)?;

    let reader = ImageReader::with_format(Cursor::new(bytes), format);
    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    debug!(
        ?format,
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded upload"
    );

    Ok(into_raster(img))
}

fn into_raster(img: DynamicImage) -> RasterImage {
    if img.color().has_alpha() {
        RasterImage::from_rgba_image(img.into_rgba8())
    } else {
        RasterImage::from_rgb_image(img.into_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{palette_png_with_transparency, PixelLayout};
    use image::{GrayImage, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode_as(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png_rgb() {
        let src = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let bytes = encode_as(DynamicImage::ImageRgb8(src), ImageFormat::Png);

        let img = decode_image(&bytes).unwrap();
        assert_eq!((img.width, img.height), (4, 3));
        assert_eq!(img.layout, PixelLayout::Rgb8);
        assert_eq!(&img.pixels[0..3], &[10, 20, 30]);
    }

    #[test]
    fn test_decode_png_rgba_keeps_alpha() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0]));
        let bytes = encode_as(DynamicImage::ImageRgba8(src), ImageFormat::Png);

        let img = decode_image(&bytes).unwrap();
        assert!(img.has_alpha());
        assert_eq!(img.pixels.len(), 16);
    }

    #[test]
    fn test_decode_palette_with_transparency_is_rgba() {
        let img = decode_image(&palette_png_with_transparency()).unwrap();

        assert_eq!((img.width, img.height), (2, 2));
        assert_eq!(img.layout, PixelLayout::Rgba8);
        assert_eq!(
            img.pixels,
            vec![
                255, 0, 0, 0, //
                0, 255, 0, 255, //
                0, 255, 0, 255, //
                255, 0, 0, 0,
            ]
        );
    }

    #[test]
    fn test_decode_grayscale_expands_to_rgb() {
        let src = GrayImage::from_pixel(3, 3, image::Luma([77]));
        let bytes = encode_as(DynamicImage::ImageLuma8(src), ImageFormat::Png);

        let img = decode_image(&bytes).unwrap();
        assert_eq!(img.layout, PixelLayout::Rgb8);
        assert_eq!(&img.pixels[0..3], &[77, 77, 77]);
    }

    #[test]
    fn test_decode_jpeg() {
        let src = RgbImage::from_pixel(16, 8, Rgb([128, 128, 128]));
        let bytes = encode_as(DynamicImage::ImageRgb8(src), ImageFormat::Jpeg);

        assert_eq!(sniff_format(&bytes), Some(ImageFormat::Jpeg));
        let img = decode_image(&bytes).unwrap();
        assert_eq!((img.width, img.height), (16, 8));
    }

    #[test]
    fn test_decode_unknown_format() {
        let result = decode_image(&[0x00, 0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_decode_empty_bytes() {
        assert!(decode_image(&[]).is_err());
    }

    #[test]
    fn test_decode_truncated_png() {
        let src = RgbImage::from_pixel(32, 32, Rgb([200, 0, 0]));
        let bytes = encode_as(DynamicImage::ImageRgb8(src), ImageFormat::Png);

        // Magic bytes intact, payload cut short
        let result = decode_image(&bytes[..40]);
        assert!(matches!(result, Err(DecodeError::CorruptedFile(_))));
    }
}
