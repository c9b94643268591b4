//! PDF tools: image to PDF conversion, merging and compression.
//!
//! All functions take and return complete PDF files as byte buffers and
//! never touch the filesystem. Parsing and writing go through `lopdf`.

mod compress;
mod convert;
mod merge;

use lopdf::Document;
use thiserror::Error;

use crate::decode::DecodeError;

pub use compress::compress_pdf;
pub use convert::{images_to_pdf, DEFAULT_DPI};
pub use merge::merge_pdfs;

/// Errors from the PDF tools.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("No documents to merge")]
    NoDocuments,

    #[error("No images to convert")]
    NoImages,

    #[error("Failed to parse PDF {index}: {message}")]
    Parse { index: usize, message: String },

    #[error("Image {index} could not be embedded: {source}")]
    Image {
        index: usize,
        #[source]
        source: DecodeError,
    },

    #[error("Malformed PDF structure: {0}")]
    Structure(String),

    #[error("Failed to write PDF: {0}")]
    Write(String),
}

fn load(index: usize, bytes: &[u8]) -> Result<Document, PdfError> {
    Document::load_mem(bytes).map_err(|e| PdfError::Parse {
        index,
        message: e.to_string(),
    })
}

fn save(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::Write(e.to_string()))?;
    Ok(buffer)
}

/// Build an uncompressed PDF whose pages each show `label-Page-N` text.
#[cfg(test)]
pub(crate) fn fixture_pdf(num_pages: u32, label: &str) -> Vec<u8> {
    use lopdf::{Dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for n in 1..=num_pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({label}-Page-{n}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        page.set(
            "MediaBox",
            Object::Array(
                [0, 0, 612, 792]
                    .into_iter()
                    .map(Object::Integer)
                    .collect(),
            ),
        );
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(num_pages as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Concatenated, decompressed content streams of every page, in page order.
#[cfg(test)]
pub(crate) fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
        .collect()
}
