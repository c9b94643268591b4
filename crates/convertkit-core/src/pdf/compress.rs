//! Lossless PDF size reduction.
//!
//! Drops unreachable objects and empty streams, Flate-compresses every
//! stream that isn't already compressed, and renumbers what remains.
//! Embedded images are not re-encoded.

use tracing::{debug, info};

use super::{load, save, PdfError};

/// Rewrite `bytes` as a smaller PDF.
///
/// If the rewritten file would not be smaller, the input is returned
/// unchanged so the operation never grows a document.
///
/// # Errors
///
/// * `PdfError::Parse` if `bytes` is not a readable PDF
/// * `PdfError::Write` if serialising the result fails
pub fn compress_pdf(bytes: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut doc = load(0, bytes)?;

    let empty = doc.delete_zero_length_streams();
    let pruned = doc.prune_objects();
    debug!(
        empty_streams = empty.len(),
        pruned = pruned.len(),
        "removed dead objects"
    );

    doc.renumber_objects();
    doc.compress();

    let output = save(&mut doc)?;
    if output.len() >= bytes.len() {
        info!(bytes = bytes.len(), "PDF already compact, keeping original");
        return Ok(bytes.to_vec());
    }

    info!(before = bytes.len(), after = output.len(), "compressed PDF");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{fixture_pdf, page_texts};
    use lopdf::{Dictionary, Document, Object, Stream};

    /// Fixture with a large uncompressed content stream and an orphan object.
    fn bloated_pdf() -> Vec<u8> {
        let mut doc = Document::load_mem(&fixture_pdf(1, "Bloated")).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();

        let mut content = b"BT /F1 12 Tf 50 700 Td (Bloated-Page-1) Tj ET\n".to_vec();
        for _ in 0..400 {
            content.extend_from_slice(b"0 0 m 100 100 l S\n");
        }
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        doc.get_dictionary_mut(page_id)
            .unwrap()
            .set("Contents", Object::Reference(content_id));

        doc.add_object(Object::String(
            vec![b'x'; 2048],
            lopdf::StringFormat::Literal,
        ));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_compress_shrinks_bloated_pdf() {
        let input = bloated_pdf();
        let output = compress_pdf(&input).unwrap();

        assert!(
            output.len() < input.len(),
            "{} should be below {}",
            output.len(),
            input.len()
        );
    }

    #[test]
    fn test_compress_keeps_pages_and_content() {
        let output = compress_pdf(&bloated_pdf()).unwrap();

        let texts = page_texts(&output);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Bloated-Page-1"));
        assert!(texts[0].contains("100 100 l"));
    }

    #[test]
    fn test_compress_drops_orphans() {
        let output = compress_pdf(&bloated_pdf()).unwrap();
        let doc = Document::load_mem(&output).unwrap();

        let orphan = doc
            .objects
            .values()
            .any(|o| matches!(o, Object::String(s, _) if s.len() == 2048));
        assert!(!orphan);
    }

    #[test]
    fn test_compress_never_grows() {
        let input = fixture_pdf(3, "Small");
        let output = compress_pdf(&input).unwrap();

        assert!(output.len() <= input.len());
        assert_eq!(page_texts(&output).len(), 3);
    }

    #[test]
    fn test_compress_rejects_garbage() {
        let result = compress_pdf(b"definitely not a pdf");
        assert!(matches!(result, Err(PdfError::Parse { index: 0, .. })));
    }
}
