//! Grafts the rendered cover page into the source document with lopdf.
//!
//! Only the cover side is renumbered; every object of the source keeps its
//! id and its bytes, so original pages and content streams are written back
//! untouched.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use cover_core::error::{CoverError, Result};

/// Parse the source PDF, refusing encrypted documents.
pub fn load_source(bytes: &[u8]) -> Result<Document> {
    if declares_encryption(bytes) {
        return Err(CoverError::PdfParse(
            "document is encrypted or password-protected".to_string(),
        ));
    }

    let doc = Document::load_mem(bytes)
        .map_err(|e| CoverError::PdfParse(format!("Failed to load PDF: {}", e)))?;

    if doc.is_encrypted() {
        return Err(CoverError::PdfParse(
            "document is encrypted or password-protected".to_string(),
        ));
    }

    page_tree_root(&doc).map_err(|e| CoverError::PdfParse(format!("Missing page tree: {}", e)))?;
    Ok(doc)
}

/// Whether a trailer or xref-stream dictionary references an `/Encrypt`
/// dictionary. These dictionaries are never compressed, so a byte scan is
/// reliable even before the cross-reference table has been parsed.
fn declares_encryption(bytes: &[u8]) -> bool {
    const KEY: &[u8] = b"/Encrypt";
    bytes.windows(KEY.len()).enumerate().any(|(i, w)| {
        if w != KEY {
            return false;
        }
        let rest = &bytes[i + KEY.len()..];
        let value = rest
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .map(|p| &rest[p..]);
        matches!(value, Some([b'0'..=b'9', ..]) | Some([b'<', b'<', ..]))
    })
}

/// Object id of the root `/Pages` node.
fn page_tree_root(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.catalog()?.get(b"Pages")?.as_reference()
}

/// Move the single page of `cover` to the front of `target`.
pub fn prepend_page(target: &mut Document, mut cover: Document) -> Result<()> {
    cover.renumber_objects_with(target.max_id + 1);

    let cover_page_id = cover
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| CoverError::PdfWrite("cover document has no page".to_string()))?;

    // The cover's own catalog and page tree stay behind.
    let mut needed = BTreeSet::new();
    collect_references(&cover, cover_page_id, &mut needed);

    let root_pages_id = page_tree_root(target)
        .map_err(|e| CoverError::PdfParse(format!("Missing page tree: {}", e)))?;

    for id in &needed {
        if let Some(object) = cover.objects.remove(id) {
            target.objects.insert(*id, object);
        }
    }
    target.max_id = target.max_id.max(cover.max_id);

    fix_cover_page(target, cover_page_id, root_pages_id)?;
    insert_first_kid(target, root_pages_id, cover_page_id)?;

    log::debug!(
        "Grafted cover page {:?} ({} objects) under page tree {:?}",
        cover_page_id,
        needed.len(),
        root_pages_id
    );
    Ok(())
}

/// Re-parent the cover page and pin the attributes a page would otherwise
/// inherit from the source's page tree.
fn fix_cover_page(target: &mut Document, page_id: ObjectId, parent_id: ObjectId) -> Result<()> {
    let page = target
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| CoverError::PdfWrite(format!("Cover page object: {}", e)))?;

    let media_box = || {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(crate::cover_page::PAGE_WIDTH_PT as i64),
            Object::Integer(crate::cover_page::PAGE_HEIGHT_PT as i64),
        ])
    };

    page.set("Parent", Object::Reference(parent_id));
    page.set("MediaBox", media_box());
    page.set("CropBox", media_box());
    page.set("Rotate", Object::Integer(0));
    if !page.has(b"Resources") {
        page.set("Resources", Object::Dictionary(Dictionary::new()));
    }
    Ok(())
}

fn insert_first_kid(target: &mut Document, pages_id: ObjectId, page_id: ObjectId) -> Result<()> {
    let pages_err = |e: lopdf::Error| CoverError::PdfParse(format!("Page tree root: {}", e));

    // Kids is almost always inline, but may legally be an indirect array.
    let indirect_kids = match target
        .get_object(pages_id)
        .and_then(Object::as_dict)
        .map_err(pages_err)?
        .get(b"Kids")
    {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    if let Some(kids_id) = indirect_kids {
        target
            .get_object_mut(kids_id)
            .and_then(Object::as_array_mut)
            .map_err(pages_err)?
            .insert(0, Object::Reference(page_id));
    }

    let pages = target
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(pages_err)?;

    if indirect_kids.is_none() {
        match pages.get_mut(b"Kids").and_then(Object::as_array_mut) {
            Ok(kids) => kids.insert(0, Object::Reference(page_id)),
            Err(_) => pages.set("Kids", Object::Array(vec![Object::Reference(page_id)])),
        }
    }

    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", Object::Integer(count + 1));
    Ok(())
}

/// Every object reachable from `id`, not following `/Parent` back up the tree.
fn collect_references(doc: &Document, id: ObjectId, seen: &mut BTreeSet<ObjectId>) {
    if !seen.insert(id) {
        return;
    }
    if let Ok(object) = doc.get_object(id) {
        walk(doc, object, seen);
    }
}

fn walk(doc: &Document, object: &Object, seen: &mut BTreeSet<ObjectId>) {
    match object {
        Object::Reference(id) => collect_references(doc, *id, seen),
        Object::Array(items) => {
            for item in items {
                walk(doc, item, seen);
            }
        }
        Object::Dictionary(dict) => walk_dict(doc, dict, seen),
        Object::Stream(stream) => walk_dict(doc, &stream.dict, seen),
        _ => {}
    }
}

fn walk_dict(doc: &Document, dict: &Dictionary, seen: &mut BTreeSet<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        walk(doc, value, seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_pdf;

    #[test]
    fn test_declares_encryption() {
        assert!(declares_encryption(b"trailer\n<</Root 1 0 R/Encrypt 9 0 R>>"));
        assert!(declares_encryption(b"<< /Encrypt << /Filter /Standard >> >>"));
        assert!(!declares_encryption(b"(the word /Encrypted in text)"));
        assert!(!declares_encryption(b"%PDF-1.4 plain"));
    }

    #[test]
    fn test_load_source_rejects_garbage() {
        let err = load_source(b"%PDF-1.4\nthis is not really a pdf").unwrap_err();
        assert!(matches!(err, CoverError::PdfParse(_)));
    }

    #[test]
    fn test_collect_references_skips_parent() {
        let doc = Document::load_mem(&make_pdf(2)).unwrap();
        let pages = doc.get_pages();
        let first = *pages.get(&1).unwrap();
        let mut seen = BTreeSet::new();
        collect_references(&doc, first, &mut seen);
        let root = page_tree_root(&doc).unwrap();
        assert!(seen.contains(&first));
        assert!(!seen.contains(&root));
        // The sibling page is only reachable through the parent.
        assert!(!seen.contains(pages.get(&2).unwrap()));
    }

    #[test]
    fn test_insert_first_kid_updates_count() {
        let mut doc = Document::load_mem(&make_pdf(1)).unwrap();
        let root = page_tree_root(&doc).unwrap();
        let page = doc.add_object(Dictionary::new());
        insert_first_kid(&mut doc, root, page).unwrap();

        let pages = doc.get_object(root).and_then(Object::as_dict).unwrap();
        assert_eq!(pages.get(b"Count").and_then(Object::as_i64).unwrap(), 2);
        let kids = pages.get(b"Kids").and_then(Object::as_array).unwrap();
        assert_eq!(kids[0].as_reference().unwrap(), page);
    }
}
