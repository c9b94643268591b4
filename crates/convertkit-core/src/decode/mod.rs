//! Image decoding for uploaded files.
//!
//! This module provides functionality for:
//! - Sniffing the upload's container format from magic bytes
//! - Decoding it into an 8-bit [`RasterImage`]
//! - Explicit alpha handling via [`RasterImage::has_alpha`] and
//!   [`RasterImage::to_opaque`]
//!
//! All operations are synchronous and operate on in-memory buffers.
//!
//! # Examples
//!
//! ```ignore
//! use convertkit_core::decode::decode_image;
//!
//! let bytes = std::fs::read("photo.png").unwrap();
//! let image = decode_image(&bytes).unwrap();
//! println!("Decoded {}x{} image (alpha: {})", image.width, image.height, image.has_alpha());
//! ```

mod reader;
mod types;

pub use reader::{decode_image, sniff_format};
pub use types::{DecodeError, PixelLayout, RasterImage};

/// 2x2 indexed PNG with palette `[red, green]`, a `tRNS` chunk making
/// index 0 fully transparent, and rows `[0, 1]` and `[1, 0]`.
///
/// The `image` crate cannot write indexed PNGs, so the chunks are laid out
/// by hand with a stored (uncompressed) zlib stream.
#[cfg(test)]
pub(crate) fn palette_png_with_transparency() -> Vec<u8> {
    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = !0u32;
        for &byte in bytes {
            crc ^= u32::from(byte);
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    fn adler32(bytes: &[u8]) -> u32 {
        let (mut a, mut b) = (1u32, 0u32);
        for &byte in bytes {
            a = (a + u32::from(byte)) % 65_521;
            b = (b + a) % 65_521;
        }
        (b << 16) | a
    }

    fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        let crc = crc32(&out[start..]);
        out.extend_from_slice(&crc.to_be_bytes());
    }

    // Each scanline starts with filter type 0
    let scanlines = [0u8, 0, 1, 0, 1, 0];
    let len = scanlines.len() as u16;
    let mut zlib = vec![0x78, 0x01, 0x01];
    zlib.extend_from_slice(&len.to_le_bytes());
    zlib.extend_from_slice(&(!len).to_le_bytes());
    zlib.extend_from_slice(&scanlines);
    zlib.extend_from_slice(&adler32(&scanlines).to_be_bytes());

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&2u32.to_be_bytes());
    ihdr.extend_from_slice(&2u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    chunk(&mut png, b"IHDR", &ihdr);
    chunk(&mut png, b"PLTE", &[255, 0, 0, 0, 255, 0]);
    chunk(&mut png, b"tRNS", &[0, 255]);
    chunk(&mut png, b"IDAT", &zlib);
    chunk(&mut png, b"IEND", &[]);
    png
}
