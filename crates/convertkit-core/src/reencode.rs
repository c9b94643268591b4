//! Size-bounded JPEG re-encoding.
//!
//! Re-encodes a decoded image at decreasing JPEG quality until the output
//! fits under a byte budget given in kilobytes.
//!
//! ## Quality schedule
//!
//! Qualities tried are `95, 90, 85, ..., 15`: start at [`START_QUALITY`],
//! step down by [`QUALITY_STEP`], stop once the next step would reach
//! [`QUALITY_FLOOR`]. The first attempt whose size is at or under the target
//! wins. If none fits, the quality-15 encoding is returned anyway; an
//! unreachable target is a best-effort result, not an error.
//!
//! The schedule is fixed so output sizes are reproducible across runs.

use std::borrow::Cow;

use thiserror::Error;
use tracing::{debug, warn};

use crate::decode::RasterImage;
use crate::encode::{encode_jpeg, EncodeError};

/// First quality tried.
pub const START_QUALITY: u8 = 95;

/// Quality decrement between attempts.
pub const QUALITY_STEP: u8 = 5;

/// The loop never encodes at or below this quality.
pub const QUALITY_FLOOR: u8 = 10;

/// Upper bound on encode calls per invocation: (95 - 15) / 5 + 1.
pub const MAX_ATTEMPTS: usize = ((START_QUALITY - QUALITY_FLOOR - QUALITY_STEP) / QUALITY_STEP) as usize + 1;

/// Errors from [`reencode`].
#[derive(Debug, Error)]
pub enum ReencodeError {
    /// Target size was zero, negative or NaN.
    #[error("Invalid target size: {0} KB (must be a positive number)")]
    InvalidTarget(f64),

    /// The codec rejected the pixel data. The loop is aborted, not retried.
    #[error("Encoding failed at quality {quality}: {source}")]
    EncodeFailure {
        quality: u8,
        #[source]
        source: EncodeError,
    },
}

/// Encode primitive used by the search loop.
///
/// Implementations receive an opaque RGB image; alpha has already been
/// dropped by the caller.
pub trait QualityEncoder {
    /// Encode `image` at `quality` (1-100).
    fn encode(&mut self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError>;
}

/// Production encoder backed by the `image` crate's JPEG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegQualityEncoder;

impl QualityEncoder for JpegQualityEncoder {
    fn encode(&mut self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        encode_jpeg(image, quality)
    }
}

/// One pass of the search loop.
#[derive(Debug, Clone)]
pub struct EncodingAttempt {
    pub quality: u8,
    pub bytes: Vec<u8>,
    pub size_kb: f64,
}

impl EncodingAttempt {
    fn new(quality: u8, bytes: Vec<u8>) -> Self {
        let size_kb = bytes.len() as f64 / 1024.0;
        Self {
            quality,
            bytes,
            size_kb,
        }
    }
}

/// Final output of [`reencode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReencodeResult {
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
    /// Quality the bytes were encoded at.
    pub quality: u8,
    /// False when the target was unreachable and the floor encoding was returned.
    pub target_met: bool,
}

/// Re-encode `image` as JPEG so that it fits within `target_kb` kilobytes.
///
/// Alpha-bearing images are converted to opaque RGB first (alpha discarded).
/// See the module docs for the quality schedule.
///
/// # Errors
///
/// * `ReencodeError::InvalidTarget` if `target_kb` is not a positive number;
///   no encoding is attempted
/// * `ReencodeError::EncodeFailure` if the codec fails on any attempt
pub fn reencode(image: &RasterImage, target_kb: f64) -> Result<ReencodeResult, ReencodeError> {
    reencode_with(&mut JpegQualityEncoder, image, target_kb)
}

/// [`reencode`] with a caller-supplied encode primitive.
pub fn reencode_with<E: QualityEncoder + ?Sized>(
    encoder: &mut E,
    image: &RasterImage,
    target_kb: f64,
) -> Result<ReencodeResult, ReencodeError> {
    if target_kb.is_nan() || target_kb <= 0.0 {
        return Err(ReencodeError::InvalidTarget(target_kb));
    }

    let opaque: Cow<'_, RasterImage> = image.to_opaque();
    if matches!(opaque, Cow::Owned(_)) {
        debug!("dropping alpha channel before JPEG encoding");
    }

    let mut quality = START_QUALITY;
    loop {
        let bytes = encoder
            .encode(&opaque, quality)
            .map_err(|source| ReencodeError::EncodeFailure { quality, source })?;
        let attempt = EncodingAttempt::new(quality, bytes);

        debug!(
            quality = attempt.quality,
            size_kb = attempt.size_kb,
            target_kb,
            "encode attempt"
        );

        if attempt.size_kb <= target_kb {
            return Ok(ReencodeResult {
                bytes: attempt.bytes,
                quality: attempt.quality,
                target_met: true,
            });
        }

        let next = quality - QUALITY_STEP;
        if next <= QUALITY_FLOOR {
            warn!(
                quality = attempt.quality,
                size_kb = attempt.size_kb,
                target_kb,
                "target unreachable, returning floor-quality encoding"
            );
            return Ok(ReencodeResult {
                bytes: attempt.bytes,
                quality: attempt.quality,
                target_met: false,
            });
        }
        quality = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_image, palette_png_with_transparency, PixelLayout};

    /// Records every quality requested and fabricates a buffer whose length
    /// comes from `size_for`.
    struct RecordingEncoder<F: Fn(u8) -> usize> {
        size_for: F,
        qualities: Vec<u8>,
        channels_seen: Vec<usize>,
        fail_on_call: Option<usize>,
    }

    impl<F: Fn(u8) -> usize> RecordingEncoder<F> {
        fn new(size_for: F) -> Self {
            Self {
                size_for,
                qualities: Vec::new(),
                channels_seen: Vec::new(),
                fail_on_call: None,
            }
        }
    }

    impl<F: Fn(u8) -> usize> QualityEncoder for RecordingEncoder<F> {
        fn encode(&mut self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
            self.qualities.push(quality);
            self.channels_seen.push(image.layout.channels());
            if self.fail_on_call == Some(self.qualities.len()) {
                return Err(EncodeError::EncodingFailed("corrupt pixel buffer".into()));
            }
            Ok(vec![0u8; (self.size_for)(quality)])
        }
    }

    fn full_schedule() -> Vec<u8> {
        (3..=19).rev().map(|step| step * 5).collect()
    }

    fn rgb(width: u32, height: u32) -> RasterImage {
        RasterImage::new(
            width,
            height,
            PixelLayout::Rgb8,
            vec![128u8; (width * height * 3) as usize],
        )
        .unwrap()
    }

    fn gradient(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(((x + y) * 255 / (width + height)) as u8);
            }
        }
        RasterImage::new(width, height, PixelLayout::Rgb8, pixels).unwrap()
    }

    #[test]
    fn test_max_attempts_constant() {
        assert_eq!(MAX_ATTEMPTS, 17);
        assert_eq!(full_schedule().len(), MAX_ATTEMPTS);
    }

    #[test]
    fn test_generous_target_stops_at_first_attempt() {
        let mut encoder = RecordingEncoder::new(|_| 10 * 1024);

        let result = reencode_with(&mut encoder, &rgb(4, 4), 50.0).unwrap();
        assert_eq!(result.quality, 95);
        assert!(result.target_met);
        assert_eq!(encoder.qualities, vec![95]);
    }

    #[test]
    fn test_infinite_target_is_accepted() {
        let mut encoder = RecordingEncoder::new(|_| 1 << 20);

        let result = reencode_with(&mut encoder, &rgb(1, 1), f64::INFINITY).unwrap();
        assert_eq!(result.quality, 95);
        assert_eq!(encoder.qualities.len(), 1);
    }

    #[test]
    fn test_non_positive_target_rejected_without_encoding() {
        for target in [0.0, -0.0, -1.0, -50.0, f64::NEG_INFINITY, f64::NAN] {
            let mut encoder = RecordingEncoder::new(|_| 1);
            let result = reencode_with(&mut encoder, &rgb(2, 2), target);

            assert!(matches!(result, Err(ReencodeError::InvalidTarget(_))));
            assert!(encoder.qualities.is_empty(), "target {target} encoded");
        }
    }

    #[test]
    fn test_unreachable_target_returns_quality_15() {
        // Every attempt is 100 KB
        let mut encoder = RecordingEncoder::new(|q| 100 * 1024 + q as usize);

        let result = reencode_with(&mut encoder, &rgb(2, 2), 1.0).unwrap();
        assert_eq!(result.quality, 15);
        assert!(!result.target_met);
        assert_eq!(result.bytes.len(), 100 * 1024 + 15);
        assert_eq!(encoder.qualities.len(), 17);
    }

    #[test]
    fn test_quality_schedule_is_exact() {
        let mut encoder = RecordingEncoder::new(|_| 1 << 20);
        reencode_with(&mut encoder, &rgb(2, 2), 0.5).unwrap();

        assert_eq!(encoder.qualities, full_schedule());
        assert_eq!(encoder.qualities.first(), Some(&95));
        assert_eq!(encoder.qualities.last(), Some(&15));
    }

    #[test]
    fn test_stops_at_first_fitting_quality() {
        // Size in KB equals the quality value
        let mut encoder = RecordingEncoder::new(|q| q as usize * 1024);

        let result = reencode_with(&mut encoder, &rgb(2, 2), 42.0).unwrap();
        assert_eq!(result.quality, 40);
        assert!(result.target_met);
        assert_eq!(encoder.qualities, vec![95, 90, 85, 80, 75, 70, 65, 60, 55, 50, 45, 40]);
    }

    #[test]
    fn test_size_exactly_at_target_fits() {
        let mut encoder = RecordingEncoder::new(|_| 50 * 1024);

        let result = reencode_with(&mut encoder, &rgb(2, 2), 50.0).unwrap();
        assert_eq!(result.quality, 95);
    }

    #[test]
    fn test_fractional_target() {
        // 1536 bytes is 1.5 KB
        let mut encoder = RecordingEncoder::new(|q| if q <= 60 { 1536 } else { 1537 });

        let result = reencode_with(&mut encoder, &rgb(2, 2), 1.5).unwrap();
        assert_eq!(result.quality, 60);
    }

    #[test]
    fn test_encode_failure_aborts_loop() {
        let mut encoder = RecordingEncoder::new(|_| 1 << 20);
        encoder.fail_on_call = Some(3);

        let result = reencode_with(&mut encoder, &rgb(2, 2), 1.0);
        assert!(matches!(
            result,
            Err(ReencodeError::EncodeFailure { quality: 85, .. })
        ));
        assert_eq!(encoder.qualities, vec![95, 90, 85]);
    }

    #[test]
    fn test_alpha_input_is_flattened_for_encoder() {
        let img = RasterImage::new(2, 2, PixelLayout::Rgba8, vec![200u8; 16]).unwrap();
        let mut encoder = RecordingEncoder::new(|q| q as usize * 1024);

        reencode_with(&mut encoder, &img, 80.0).unwrap();
        assert!(encoder.channels_seen.iter().all(|&c| c == 3));
    }

    #[test]
    fn test_real_codec_alpha_input_succeeds() {
        let pixels: Vec<u8> = (0..32 * 32 * 4).map(|i| (i % 251) as u8).collect();
        let img = RasterImage::new(32, 32, PixelLayout::Rgba8, pixels).unwrap();

        let result = reencode(&img, 50.0).unwrap();
        let decoded = decode_image(&result.bytes).unwrap();
        assert!(!decoded.has_alpha());
        assert_eq!((decoded.width, decoded.height), (32, 32));
    }

    #[test]
    fn test_palette_upload_with_transparency_reencodes() {
        let img = decode_image(&palette_png_with_transparency()).unwrap();
        assert_eq!(img.layout, PixelLayout::Rgba8);

        let mut encoder = RecordingEncoder::new(|_| 1024);
        reencode_with(&mut encoder, &img, 50.0).unwrap();
        assert_eq!(encoder.channels_seen, vec![3]);

        let result = reencode(&img, 50.0).unwrap();
        assert_eq!(result.quality, 95);
        assert!(result.target_met);
        let decoded = decode_image(&result.bytes).unwrap();
        assert_eq!(decoded.layout, PixelLayout::Rgb8);
        assert_eq!((decoded.width, decoded.height), (2, 2));
    }

    #[test]
    fn test_real_codec_large_image_meets_budget() {
        let img = gradient(2000, 2000);

        let result = reencode(&img, 50.0).unwrap();
        if result.quality != 15 {
            assert!(result.bytes.len() <= 50 * 1024);
        }
        assert_eq!(result.target_met, result.bytes.len() <= 50 * 1024);

        let decoded = decode_image(&result.bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (2000, 2000));
    }

    #[test]
    fn test_real_codec_reencoding_output_does_not_grow() {
        let img = rgb(64, 64);

        let first = reencode(&img, 50.0).unwrap();
        let redecoded = decode_image(&first.bytes).unwrap();
        let second = reencode(&redecoded, 50.0).unwrap();

        assert!(second.bytes.len() <= first.bytes.len());
    }

    #[test]
    fn test_real_codec_result_is_decodable_at_floor() {
        // Noise defeats the codec; 0.1 KB is unreachable
        let pixels: Vec<u8> = (0..96 * 96 * 3).map(|i| ((i * 7919) % 256) as u8).collect();
        let img = RasterImage::new(96, 96, PixelLayout::Rgb8, pixels).unwrap();

        let result = reencode(&img, 0.1).unwrap();
        assert_eq!(result.quality, 15);
        assert!(!result.target_met);
        assert!(decode_image(&result.bytes).is_ok());
    }
}
