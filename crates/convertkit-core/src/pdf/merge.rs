//! Concatenate PDFs page by page.
//!
//! The first upload becomes the destination document. Each following
//! document has its object IDs shifted past the destination's highest ID,
//! its objects copied across, and its pages appended. The destination page
//! tree is then flattened to a single `Pages` node listing every page.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info};

use super::{load, save, PdfError};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Merge PDFs into one document, pages in input order.
///
/// A single document is returned unchanged.
///
/// # Errors
///
/// * `PdfError::NoDocuments` for an empty list
/// * `PdfError::Parse` naming the first document that fails to load
/// * `PdfError::Structure` if the first document has no usable page tree
pub fn merge_pdfs(documents: &[Vec<u8>]) -> Result<Vec<u8>, PdfError> {
    match documents {
        [] => return Err(PdfError::NoDocuments),
        [single] => {
            // Still parse so garbage is rejected the same way as in a batch
            load(0, single)?;
            return Ok(single.clone());
        }
        _ => {}
    }

    let mut loaded = documents
        .iter()
        .enumerate()
        .map(|(index, bytes)| load(index, bytes))
        .collect::<Result<Vec<_>, _>>()?;
    for doc in &mut loaded {
        push_down_inherited(doc);
    }

    let mut sources = loaded.into_iter();
    let Some(mut dest) = sources.next() else {
        return Err(PdfError::NoDocuments);
    };
    let mut page_refs: Vec<ObjectId> = dest.get_pages().into_values().collect();
    let mut max_id = dest.max_id;

    for (i, source) in sources.enumerate() {
        let offset = max_id;
        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        debug!(
            document = i + 1,
            pages = source_pages.len(),
            offset,
            "appending document"
        );

        let shifted = source
            .objects
            .into_iter()
            .map(|(id, object)| Ok((shift_id(id, offset)?, shift_refs(object, offset)?)))
            .collect::<Result<BTreeMap<ObjectId, Object>, PdfError>>()?;
        dest.objects.extend(shifted);

        for id in source_pages {
            page_refs.push(shift_id(id, offset)?);
        }
        let (source_max, _) = shift_id((source.max_id, 0), offset)?;
        max_id = max_id.max(source_max);
    }

    dest.max_id = max_id;
    relink_page_tree(&mut dest, &page_refs)?;

    dest.prune_objects();
    dest.renumber_objects();
    dest.compress();

    let merged = save(&mut dest)?;
    info!(
        documents = documents.len(),
        pages = page_refs.len(),
        bytes = merged.len(),
        "merged PDFs"
    );
    Ok(merged)
}

/// Move an object ID up by `offset`, failing if the number leaves `u32`.
fn shift_id((num, gen): ObjectId, offset: u32) -> Result<ObjectId, PdfError> {
    num.checked_add(offset)
        .map(|num| (num, gen))
        .ok_or_else(|| PdfError::Structure("object numbers overflow".into()))
}

/// Shift every indirect reference inside `obj` by `offset`.
fn shift_refs(obj: Object, offset: u32) -> Result<Object, PdfError> {
    Ok(match obj {
        Object::Reference(id) => Object::Reference(shift_id(id, offset)?),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|o| shift_refs(o, offset))
                .collect::<Result<_, _>>()?,
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = shift_refs(std::mem::replace(value, Object::Null), offset)?;
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = shift_refs(std::mem::replace(value, Object::Null), offset)?;
            }
            Object::Stream(stream)
        }
        other => other,
    })
}

/// Copy inherited attributes onto each page so it no longer depends on
/// intermediate `Pages` nodes, which are discarded when the tree is flattened.
fn push_down_inherited(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let mut inherited: Vec<(&[u8], Object)> = Vec::new();

        if let Ok(page) = doc.get_dictionary(page_id) {
            let mut missing: Vec<&[u8]> = INHERITABLE
                .iter()
                .copied()
                .filter(|key| !page.has(key))
                .collect();
            let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

            for _ in 0..MAX_TREE_DEPTH {
                let Some(node_id) = parent else { break };
                if missing.is_empty() {
                    break;
                }
                let Ok(node) = doc.get_dictionary(node_id) else {
                    break;
                };
                missing.retain(|key| match node.get(key) {
                    Ok(value) => {
                        inherited.push((*key, value.clone()));
                        false
                    }
                    Err(_) => true,
                });
                parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            }
        }

        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
        }
    }
}

/// Point the catalog's root `Pages` node at `page_refs` and reparent them.
fn relink_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfError::Structure("trailer has no Root reference".into()))?;
    let pages_id = doc
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PdfError::Structure("catalog has no Pages reference".into()))?;

    let pages = doc
        .get_dictionary_mut(pages_id)
        .map_err(|_| PdfError::Structure("Pages is not a dictionary".into()))?;
    pages.set(
        "Kids",
        Object::Array(page_refs.iter().map(|&id| Object::Reference(id)).collect()),
    );
    pages.set("Count", Object::Integer(page_refs.len() as i64));

    for &page_id in page_refs {
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}
