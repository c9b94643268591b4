//! Core types for decoded raster images.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not in any image format we can sniff.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer does not match the dimensions and layout.
    #[error("Pixel buffer mismatch: expected {expected} bytes, got {actual}")]
    PixelBufferMismatch { expected: usize, actual: usize },
}

/// Channel layout of a [`RasterImage`] pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 8-bit red, green, blue.
    #[default]
    Rgb8,
    /// 8-bit red, green, blue, alpha.
    Rgba8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }

    /// Whether the layout carries transparency.
    #[inline]
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::Rgba8)
    }
}

/// A decoded image with 8-bit interleaved pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Channel layout of `pixels`.
    pub layout: PixelLayout,
    /// Pixel data in row-major order.
    /// Length is width * height * layout.channels().
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// Create a new RasterImage, validating dimensions against the buffer.
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        pixels: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        let image = Self {
            width,
            height,
            layout,
            pixels,
        };
        image.validate()?;
        Ok(image)
    }

    /// Check that dimensions are non-zero and the buffer matches them.
    ///
    /// Fields are public, so code that mutates them directly should call
    /// this before handing the image to a codec.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let expected = (self.width as usize) * (self.height as usize) * self.layout.channels();
        if self.pixels.len() != expected {
            return Err(DecodeError::PixelBufferMismatch {
                expected,
                actual: self.pixels.len(),
            });
        }

        Ok(())
    }

    /// Create an opaque RasterImage from an image::RgbImage.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            pixels: img.into_raw(),
        }
    }

    /// Create a RasterImage with alpha from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgba8,
            pixels: img.into_raw(),
        }
    }

    /// Convert into the image crate's dynamic representation.
    pub fn into_dynamic(self) -> Option<image::DynamicImage> {
        match self.layout {
            PixelLayout::Rgb8 => image::RgbImage::from_raw(self.width, self.height, self.pixels)
                .map(image::DynamicImage::ImageRgb8),
            PixelLayout::Rgba8 => image::RgbaImage::from_raw(self.width, self.height, self.pixels)
                .map(image::DynamicImage::ImageRgba8),
        }
    }

    /// Whether this image carries an alpha channel.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.layout.has_alpha()
    }

    /// Opaque 3-channel view of this image.
    ///
    /// Alpha is dropped, not composited against a background, so fully
    /// transparent pixels keep whatever colour they stored.
    pub fn to_opaque(&self) -> Cow<'_, RasterImage> {
        if !self.has_alpha() {
            return Cow::Borrowed(self);
        }

        let pixels = self
            .pixels
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();

        Cow::Owned(RasterImage {
            width: self.width,
            height: self.height,
            layout: PixelLayout::Rgb8,
            pixels,
        })
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Get the size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}
