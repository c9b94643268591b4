//! ConvertKit Core - File conversion library
//!
//! This crate provides the conversion logic behind the ConvertKit server:
//! image decoding, size-bounded JPEG re-encoding, auto enhancement, and
//! PDF conversion, merging and compression. Everything operates on
//! in-memory buffers; no function here touches the filesystem.

pub mod decode;
pub mod encode;
pub mod enhance;
pub mod pdf;
pub mod reencode;

pub use decode::{decode_image, DecodeError, PixelLayout, RasterImage};
pub use encode::{encode_jpeg, encode_png, EncodeError};
pub use enhance::{enhance_image, EnhanceSettings};
pub use pdf::{compress_pdf, images_to_pdf, merge_pdfs, PdfError};
pub use reencode::{
    reencode, reencode_with, EncodingAttempt, JpegQualityEncoder, QualityEncoder, ReencodeError,
    ReencodeResult,
};
