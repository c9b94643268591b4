//! Image encoding for converted outputs.
//!
//! This module provides:
//! - JPEG encoding with configurable quality (used by the size-bounded re-encoder)
//! - PNG encoding for lossless outputs that may carry alpha
//!
//! # Examples
//!
//! ```ignore
//! use convertkit_core::decode::{PixelLayout, RasterImage};
//! use convertkit_core::encode::encode_jpeg;
//!
//! let image = RasterImage::new(100, 100, PixelLayout::Rgb8, vec![128u8; 100 * 100 * 3])?;
//! let jpeg_bytes = encode_jpeg(&image, 90)?;
//! println!("Encoded {} bytes", jpeg_bytes.len());
//! ```

mod jpeg;
mod png;

use thiserror::Error;

use crate::decode::{PixelLayout, RasterImage};

pub use jpeg::encode_jpeg;
pub use png::encode_png;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The target format cannot represent this pixel layout
    #[error("{format} cannot encode {layout:?} pixels")]
    UnsupportedLayout {
        format: &'static str,
        layout: PixelLayout,
    },

    /// The codec rejected the pixel data
    #[error("codec error: {0}")]
    EncodingFailed(String),
}

/// Validate dimensions and buffer length before handing pixels to a codec.
fn check_buffer(image: &RasterImage) -> Result<(), EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let expected = (image.width as usize) * (image.height as usize) * image.layout.channels();
    if image.pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: image.pixels.len(),
        });
    }

    Ok(())
}
