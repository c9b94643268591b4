//! One-shot "auto enhance" for uploaded photos.
//!
//! ## Pass Order
//! 1. Contrast
//! 2. Saturation
//! 3. Unsharp mask
//!
//! Alpha is carried through untouched.

use image::imageops::unsharpen;
use image::{ImageBuffer, Rgb, Rgba};
use serde::{Deserialize, Serialize};

use crate::decode::{DecodeError, PixelLayout, RasterImage};

/// Strengths for [`enhance_image`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceSettings {
    /// Contrast (-100 to 100)
    pub contrast: f32,
    /// Saturation (-100 to 100)
    pub saturation: f32,
    /// Unsharp mask blur radius; 0 disables sharpening
    pub sharpen_sigma: f32,
    /// Minimum difference before the unsharp mask applies
    pub sharpen_threshold: i32,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            contrast: 15.0,
            saturation: 20.0,
            sharpen_sigma: 1.0,
            sharpen_threshold: 2,
        }
    }
}

impl EnhanceSettings {
    /// Settings that leave the image unchanged.
    pub fn identity() -> Self {
        Self {
            contrast: 0.0,
            saturation: 0.0,
            sharpen_sigma: 0.0,
            sharpen_threshold: 0,
        }
    }
}

/// Apply `settings` to `image`, returning a new image with the same layout.
///
/// # Errors
///
/// Returns the [`RasterImage::validate`] error if the pixel buffer does not
/// match the image's dimensions.
pub fn enhance_image(
    image: &RasterImage,
    settings: &EnhanceSettings,
) -> Result<RasterImage, DecodeError> {
    image.validate()?;

    let mut out = image.clone();
    let channels = out.layout.channels();

    if settings.contrast != 0.0 || settings.saturation != 0.0 {
        for px in out.pixels.chunks_exact_mut(channels) {
            let mut r = px[0] as f32 / 255.0;
            let mut g = px[1] as f32 / 255.0;
            let mut b = px[2] as f32 / 255.0;

            (r, g, b) = apply_contrast(r, g, b, settings.contrast);
            (r, g, b) = apply_saturation(r, g, b, settings.saturation);

            px[0] = to_u8(r);
            px[1] = to_u8(g);
            px[2] = to_u8(b);
        }
    }

    if settings.sharpen_sigma > 0.0 {
        if let Some(sharpened) = sharpen(&out, settings.sharpen_sigma, settings.sharpen_threshold) {
            out = sharpened;
        }
    }

    Ok(out)
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// `output = (input - 0.5) * (1 + contrast/100) + 0.5`
#[inline]
fn apply_contrast(r: f32, g: f32, b: f32, contrast: f32) -> (f32, f32, f32) {
    if contrast == 0.0 {
        return (r, g, b);
    }
    let factor = 1.0 + contrast / 100.0;
    (
        (r - 0.5) * factor + 0.5,
        (g - 0.5) * factor + 0.5,
        (b - 0.5) * factor + 0.5,
    )
}

/// Push each channel away from (or toward) the pixel's luminance.
#[inline]
fn apply_saturation(r: f32, g: f32, b: f32, saturation: f32) -> (f32, f32, f32) {
    if saturation == 0.0 {
        return (r, g, b);
    }
    let gray = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let factor = 1.0 + saturation / 100.0;
    (
        gray + (r - gray) * factor,
        gray + (g - gray) * factor,
        gray + (b - gray) * factor,
    )
}

/// Unsharp mask over the colour channels.
///
/// Returns `None` only for a buffer that fails [`RasterImage::validate`].
fn sharpen(image: &RasterImage, sigma: f32, threshold: i32) -> Option<RasterImage> {
    let (width, height) = (image.width, image.height);
    match image.layout {
        PixelLayout::Rgb8 => {
            let buf = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(width, height, &image.pixels)?;
            Some(RasterImage::from_rgb_image(unsharpen(&buf, sigma, threshold)))
        }
        PixelLayout::Rgba8 => {
            let buf = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(width, height, &image.pixels)?;
            let mut sharpened = unsharpen(&buf, sigma, threshold);
            // unsharpen filters every channel; restore the original coverage
            for (dst, src) in sharpened.pixels_mut().zip(buf.pixels()) {
                dst.0[3] = src.0[3];
            }
            Some(RasterImage::from_rgba_image(sharpened))
        }
    }
}
