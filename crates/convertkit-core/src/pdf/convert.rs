//! Image to PDF conversion, one page per image.
//!
//! Baseline and progressive JPEGs with one or three components are embedded
//! byte-for-byte behind a `DCTDecode` filter, so conversion is lossless for
//! them. Every other upload is decoded, flattened to RGB (alpha discarded)
//! and stored as Flate-compressed samples.

use image::ImageFormat;
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

use super::{save, PdfError};
use crate::decode::{decode_image, sniff_format, DecodeError};

/// Resolution assumed for every upload when sizing pages.
pub const DEFAULT_DPI: f32 = 96.0;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Pixel data ready to be written as an image XObject.
struct EmbeddedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: Option<&'static str>,
    data: Vec<u8>,
}

/// Convert a list of image files into a single PDF.
///
/// Pages follow input order; each page is exactly the image's pixel size
/// at [`DEFAULT_DPI`].
///
/// # Errors
///
/// * `PdfError::NoImages` for an empty list
/// * `PdfError::Image` naming the first upload that cannot be decoded
pub fn images_to_pdf(images: &[Vec<u8>]) -> Result<Vec<u8>, PdfError> {
    if images.is_empty() {
        return Err(PdfError::NoImages);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for (index, bytes) in images.iter().enumerate() {
        let embedded = embed(bytes).map_err(|source| PdfError::Image { index, source })?;
        debug!(
            index,
            width = embedded.width,
            height = embedded.height,
            passthrough = embedded.filter.is_some(),
            "adding image page"
        );
        let page_id = add_page(&mut doc, pages_id, embedded);
        kids.push(Object::Reference(page_id));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    // Flate-compresses the raw RGB streams; DCT streams opt out
    doc.compress();
    save(&mut doc)
}

fn embed(bytes: &[u8]) -> Result<EmbeddedImage, DecodeError> {
    if sniff_format(bytes) == Some(ImageFormat::Jpeg) {
        if let Some(info) = read_jpeg_frame(bytes) {
            let color_space = match info.components {
                1 => Some("DeviceGray"),
                3 => Some("DeviceRGB"),
                _ => None,
            };
            if let (Some(color_space), 8) = (color_space, info.precision) {
                return Ok(EmbeddedImage {
                    width: info.width as u32,
                    height: info.height as u32,
                    color_space,
                    filter: Some("DCTDecode"),
                    data: bytes.to_vec(),
                });
            }
        }
    }

    let raster = decode_image(bytes)?;
    let opaque = raster.to_opaque().into_owned();
    Ok(EmbeddedImage {
        width: opaque.width,
        height: opaque.height,
        color_space: "DeviceRGB",
        filter: None,
        data: opaque.pixels,
    })
}

fn add_page(doc: &mut Document, pages_id: lopdf::ObjectId, image: EmbeddedImage) -> lopdf::ObjectId {
    let scale = POINTS_PER_INCH / DEFAULT_DPI;
    let page_w = image.width as f32 * scale;
    let page_h = image.height as f32 * scale;

    let mut xobject = Dictionary::new();
    xobject.set("Type", Object::Name(b"XObject".to_vec()));
    xobject.set("Subtype", Object::Name(b"Image".to_vec()));
    xobject.set("Width", Object::Integer(image.width as i64));
    xobject.set("Height", Object::Integer(image.height as i64));
    xobject.set("ColorSpace", Object::Name(image.color_space.as_bytes().to_vec()));
    xobject.set("BitsPerComponent", Object::Integer(8));
    let stream = match image.filter {
        Some(filter) => {
            xobject.set("Filter", Object::Name(filter.as_bytes().to_vec()));
            Stream::new(xobject, image.data).with_compression(false)
        }
        None => Stream::new(xobject, image.data),
    };
    let image_id = doc.add_object(stream);

    let content = format!("q {page_w:.2} 0 0 {page_h:.2} 0 0 cm /Im0 Do Q");
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_w),
            Object::Real(page_h),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    doc.add_object(page)
}

/// Frame header fields of a JPEG start-of-frame segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    precision: u8,
    width: u16,
    height: u16,
    components: u8,
}

/// Walk JPEG marker segments up to the first SOFn and read its header.
fn read_jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if bytes.get(0..2)? != [0xFF, 0xD8] {
        return None;
    }

    let mut pos = 2;
    loop {
        // Skip fill bytes between segments
        while *bytes.get(pos)? == 0xFF && *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        let len = u16::from_be_bytes([*bytes.get(pos + 2)?, *bytes.get(pos + 3)?]) as usize;

        // SOF0..SOF15 except DHT (C4), JPG (C8) and DAC (CC)
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let seg = bytes.get(pos + 4..pos + 2 + len)?;
            return Some(JpegFrame {
                precision: *seg.first()?,
                height: u16::from_be_bytes([*seg.get(1)?, *seg.get(2)?]),
                width: u16::from_be_bytes([*seg.get(3)?, *seg.get(4)?]),
                components: *seg.get(5)?,
            });
        }
        if marker == 0xDA || len < 2 {
            // Scan data reached before any frame header
            return None;
        }
        pos += 2 + len;
    }
}
